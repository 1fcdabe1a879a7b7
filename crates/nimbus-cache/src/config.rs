//! File cache configuration

use nimbus_io::{DEFAULT_BUFFER_SIZE, OpenMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`FileCache`](crate::FileCache).
///
/// The cache keeps at most `max_entries` handles before an eviction pass
/// brings it back down to `min_entries`. A background sweep runs the same
/// pass every `sweep_period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCacheConfig {
    /// Entries kept after an eviction pass
    pub min_entries: usize,
    /// Entry count above which an eviction pass is scheduled
    pub max_entries: usize,
    /// Interval of the background sweep
    pub sweep_period: Duration,
    /// Window size of handles opened by the cache
    pub buffer_size: usize,
    /// Mode used by [`FileCache::acquire`](crate::FileCache::acquire)
    pub open_mode: OpenMode,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            min_entries: 100,
            max_entries: 200,
            sweep_period: Duration::from_secs(15 * 60), // 15 minutes
            buffer_size: DEFAULT_BUFFER_SIZE,
            open_mode: OpenMode::ReadOnly,
        }
    }
}

impl FileCacheConfig {
    /// Create a new file cache configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry bounds
    pub fn with_bounds(mut self, min_entries: usize, max_entries: usize) -> Self {
        self.min_entries = min_entries;
        self.max_entries = max_entries;
        self
    }

    /// Set the background sweep interval
    pub fn with_sweep_period(mut self, period: Duration) -> Self {
        self.sweep_period = period;
        self
    }

    /// Set the window size of opened handles
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the default open mode
    pub fn with_open_mode(mut self, mode: OpenMode) -> Self {
        self.open_mode = mode;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if self.min_entries > self.max_entries {
            return Err(format!(
                "min_entries ({}) must not exceed max_entries ({})",
                self.min_entries, self.max_entries
            ));
        }

        if self.sweep_period.is_zero() {
            return Err("sweep_period must be greater than 0".to_string());
        }

        if self.buffer_size == 0 {
            return Err("buffer_size must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = FileCacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_entries, 100);
        assert_eq!(config.max_entries, 200);
        assert_eq!(config.open_mode, OpenMode::ReadOnly);
    }

    #[test]
    fn test_validation_failures() {
        let zero_max = FileCacheConfig::new().with_bounds(0, 0);
        assert!(zero_max.validate().is_err());

        let inverted = FileCacheConfig::new().with_bounds(5, 4);
        assert_eq!(
            inverted.validate().unwrap_err(),
            "min_entries (5) must not exceed max_entries (4)"
        );

        let no_sweep = FileCacheConfig::new().with_sweep_period(Duration::ZERO);
        assert!(no_sweep.validate().is_err());

        let no_buffer = FileCacheConfig::new().with_buffer_size(0);
        assert!(no_buffer.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = FileCacheConfig::new()
            .with_bounds(2, 4)
            .with_open_mode(OpenMode::ReadWrite);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"open_mode\":\"read_write\""));
        let back: FileCacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
