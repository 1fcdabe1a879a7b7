//! Shared cache of open [`RandomAccessFile`] handles.
//!
//! A location has at most one cache entry. An entry is either locked (handed
//! out by [`FileCache::acquire`]) or unlocked (parked after
//! [`FileCache::release`]). Eviction only touches unlocked entries, oldest
//! release first; the one exception is a forced [`FileCache::clear_cache`],
//! which closes everything.
//!
//! Closing evicted handles may flush data to storage, so it always happens
//! after the map lock is dropped.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use nimbus_io::{OpenMode, RandomAccessFile};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::FileCacheConfig;
use crate::error::{CacheError, CacheResult};

type SharedFile = Arc<Mutex<RandomAccessFile>>;

/// A file handed out by [`FileCache::acquire`].
///
/// Give it back with [`FileCache::release`]. A handle that is not cached
/// (the location was busy, or caching is disabled) is closed on release.
pub struct FileHandle {
    location: String,
    file: SharedFile,
    cached: bool,
}

impl FileHandle {
    fn cached(location: &str, file: SharedFile) -> Self {
        Self {
            location: location.to_string(),
            file,
            cached: true,
        }
    }

    fn untracked(location: &str, file: SharedFile) -> Self {
        Self {
            location: location.to_string(),
            file,
            cached: false,
        }
    }

    /// Location the handle was opened from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// True when the handle belongs to a cache entry.
    pub const fn is_cached(&self) -> bool {
        self.cached
    }

    /// Lock the underlying file for I/O.
    pub fn lock(&self) -> MutexGuard<'_, RandomAccessFile> {
        self.file.lock()
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("location", &self.location)
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

struct CacheEntry {
    file: SharedFile,
    mode: OpenMode,
    locked: bool,
    last_accessed: Instant,
    /// Position in access order; larger is more recent
    sequence: u64,
    access_count: u64,
}

impl CacheEntry {
    fn touch(&mut self, sequence: u64) {
        self.last_accessed = Instant::now();
        self.sequence = sequence;
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Acquires served by an unlocked entry
    pub hits: u64,
    /// Acquires that created a new entry
    pub misses: u64,
    /// Files opened, cached or not
    pub opens: u64,
    /// Entries removed by eviction passes
    pub evictions: u64,
    /// Entries currently cached
    pub entries: usize,
    /// Entries currently locked
    pub locked: usize,
}

impl CacheStats {
    /// Fraction of cached acquires that were hits
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// One entry as reported by [`FileCache::entries`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Cached location
    pub location: String,
    /// Mode the file was opened with
    pub mode: OpenMode,
    /// Whether the entry is handed out
    pub locked: bool,
    /// Time since the last acquire or release
    pub idle: Duration,
    /// Number of acquires served by this entry
    pub access_count: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    opens: AtomicU64,
    evictions: AtomicU64,
}

enum Lookup {
    Hit(SharedFile),
    Busy,
    Miss(Option<SharedFile>),
}

struct Shared {
    config: FileCacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
    enabled: AtomicBool,
    sequence: AtomicU64,
    counters: Counters,
    runtime: Handle,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn open(&self, location: &str, mode: OpenMode) -> CacheResult<SharedFile> {
        let raf = RandomAccessFile::open_with_buffer(location, mode, self.config.buffer_size)?;
        self.counters.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(Mutex::new(raf)))
    }

    /// Evict unlocked entries, least recently used first, until at most
    /// `min_entries` remain. Returns the number of entries evicted.
    fn cleanup(&self) -> usize {
        let (victims, shortfall) = {
            let mut entries = self.entries.lock();
            let excess = entries.len().saturating_sub(self.config.min_entries);
            if excess == 0 {
                return 0;
            }

            let mut unlocked: Vec<(u64, String)> = entries
                .iter()
                .filter(|(_, entry)| !entry.locked)
                .map(|(location, entry)| (entry.sequence, location.clone()))
                .collect();
            unlocked.sort_unstable();
            unlocked.truncate(excess);

            let shortfall = excess - unlocked.len();
            let victims: Vec<(String, SharedFile)> = unlocked
                .into_iter()
                .filter_map(|(_, location)| {
                    entries.remove(&location).map(|entry| (location, entry.file))
                })
                .collect();
            (victims, shortfall)
        };

        for (location, file) in &victims {
            debug!("Evicting {}", location);
            close_file(location, file);
        }
        self.counters
            .evictions
            .fetch_add(victims.len() as u64, Ordering::Relaxed);

        if shortfall > 0 {
            warn!(
                "File cache eviction fell {} entries short: remaining entries are locked",
                shortfall
            );
        }
        victims.len()
    }

    fn stop_sweep(&self) {
        if let Some(handle) = self.sweep.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep.get_mut().take() {
            handle.abort();
        }
    }
}

fn close_file(location: &str, file: &SharedFile) {
    let mut raf = file.lock();
    if raf.is_closed() {
        return;
    }
    if let Err(e) = raf.close() {
        warn!("Failed to close cached {}: {}", location, e);
    }
}

fn spawn_sweep(shared: &Arc<Shared>) -> JoinHandle<()> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let period = shared.config.sweep_period;

    shared.runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            let runtime = shared.runtime.clone();
            if let Err(e) = runtime.spawn_blocking(move || shared.cleanup()).await {
                warn!("File cache sweep failed: {}", e);
            }
        }
    })
}

/// Cache of open files keyed by location.
///
/// Cloning is cheap and every clone refers to the same cache. The background
/// sweep stops when the last clone is dropped; open handles are only closed
/// by [`exit`](Self::exit), [`clear_cache`](Self::clear_cache) or eviction.
///
/// ```no_run
/// use nimbus_cache::{FileCache, FileCacheConfig};
///
/// # async fn run() -> nimbus_cache::CacheResult<()> {
/// let cache = FileCache::init(FileCacheConfig::new().with_bounds(50, 100))?;
/// let handle = cache.acquire("data/obs.nc")?;
/// let magic = handle.lock().read_bytes(4)?;
/// cache.release(handle)?;
/// cache.exit();
/// # let _ = magic;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FileCache {
    shared: Arc<Shared>,
}

impl FileCache {
    /// Enable caching and start the background sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(config: FileCacheConfig) -> CacheResult<Self> {
        config
            .validate()
            .map_err(CacheError::InvalidConfiguration)?;
        let runtime =
            Handle::try_current().map_err(|e| CacheError::Runtime(e.to_string()))?;

        let shared = Arc::new(Shared {
            config,
            entries: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
            sequence: AtomicU64::new(0),
            counters: Counters::default(),
            runtime,
            sweep: Mutex::new(None),
        });
        let sweep = spawn_sweep(&shared);
        *shared.sweep.lock() = Some(sweep);

        info!(
            "File cache enabled: {}..{} entries, sweep every {:?}",
            shared.config.min_entries, shared.config.max_entries, shared.config.sweep_period
        );
        Ok(Self { shared })
    }

    /// Configuration the cache was created with
    pub fn config(&self) -> &FileCacheConfig {
        &self.shared.config
    }

    /// True until [`disable`](Self::disable) or [`exit`](Self::exit).
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Number of cached entries, locked or not.
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.lock().is_empty()
    }

    /// Acquire `location` with the configured open mode.
    pub fn acquire(&self, location: &str) -> CacheResult<FileHandle> {
        self.acquire_with(location, self.shared.config.open_mode)
    }

    /// Acquire `location` opened with `mode`.
    ///
    /// An unlocked entry with the same mode is locked, synced with storage
    /// and returned. An unlocked entry with another mode is replaced. If the
    /// entry is locked by someone else, an untracked handle is opened.
    pub fn acquire_with(&self, location: &str, mode: OpenMode) -> CacheResult<FileHandle> {
        if !self.is_enabled() {
            let file = self.shared.open(location, mode)?;
            return Ok(FileHandle::untracked(location, file));
        }

        let lookup = {
            let mut entries = self.shared.entries.lock();
            let sequence = self.shared.next_sequence();
            match entries.entry(location.to_string()) {
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    if entry.locked {
                        Lookup::Busy
                    } else if entry.mode == mode {
                        entry.locked = true;
                        entry.access_count += 1;
                        entry.touch(sequence);
                        Lookup::Hit(Arc::clone(&entry.file))
                    } else {
                        Lookup::Miss(Some(slot.remove().file))
                    }
                }
                Entry::Vacant(_) => Lookup::Miss(None),
            }
        };

        match lookup {
            Lookup::Hit(file) => {
                self.shared.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("File cache hit for {}", location);
                let synced = file.lock().sync();
                if let Err(e) = synced {
                    self.discard(location, &file);
                    return Err(e.into());
                }
                Ok(FileHandle::cached(location, file))
            }
            Lookup::Busy => {
                debug!("{} is in use, opening an untracked handle", location);
                let file = self.shared.open(location, mode)?;
                Ok(FileHandle::untracked(location, file))
            }
            Lookup::Miss(replaced) => {
                if let Some(old) = replaced {
                    debug!("Reopening {} as {:?}", location, mode);
                    close_file(location, &old);
                }
                self.insert(location, mode)
            }
        }
    }

    fn insert(&self, location: &str, mode: OpenMode) -> CacheResult<FileHandle> {
        let file = self.shared.open(location, mode)?;

        let size = {
            let mut entries = self.shared.entries.lock();
            let sequence = self.shared.next_sequence();
            match entries.entry(location.to_string()) {
                Entry::Occupied(_) => None,
                Entry::Vacant(slot) => {
                    slot.insert(CacheEntry {
                        file: Arc::clone(&file),
                        mode,
                        locked: true,
                        last_accessed: Instant::now(),
                        sequence,
                        access_count: 1,
                    });
                    Some(entries.len())
                }
            }
        };

        let Some(size) = size else {
            debug!("{} was cached concurrently, handle is untracked", location);
            return Ok(FileHandle::untracked(location, file));
        };

        self.shared.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!("File cache miss for {} ({} entries)", location, size);
        if size > self.shared.config.max_entries {
            self.schedule_cleanup();
        }
        Ok(FileHandle::cached(location, file))
    }

    /// Drop the entry for `location` if it still holds `file`, then close it.
    fn discard(&self, location: &str, file: &SharedFile) {
        {
            let mut entries = self.shared.entries.lock();
            if entries
                .get(location)
                .is_some_and(|entry| Arc::ptr_eq(&entry.file, file))
            {
                entries.remove(location);
            }
        }
        close_file(location, file);
    }

    fn schedule_cleanup(&self) {
        debug!("File cache over capacity, scheduling cleanup");
        let shared = Arc::clone(&self.shared);
        self.shared.runtime.spawn_blocking(move || shared.cleanup());
    }

    /// Return a handle obtained from [`acquire`](Self::acquire).
    ///
    /// Untracked handles are closed. Cached handles are unlocked, or closed
    /// and removed if caching has been disabled since.
    pub fn release(&self, handle: FileHandle) -> CacheResult<()> {
        if !handle.cached {
            let mut raf = handle.file.lock();
            if !raf.is_closed() {
                raf.close()?;
            }
            return Ok(());
        }

        let mut entries = self.shared.entries.lock();
        match entries.get(&handle.location) {
            None => {
                return Err(CacheError::UntrackedRelease {
                    location: handle.location,
                });
            }
            Some(entry) if !Arc::ptr_eq(&entry.file, &handle.file) => {
                return Err(CacheError::HandleMismatch {
                    location: handle.location,
                });
            }
            Some(entry) if !entry.locked => {
                return Err(CacheError::NotLocked {
                    location: handle.location,
                });
            }
            Some(_) => {}
        }

        if !self.is_enabled() {
            entries.remove(&handle.location);
            drop(entries);
            close_file(&handle.location, &handle.file);
            return Ok(());
        }

        let sequence = self.shared.next_sequence();
        if let Some(entry) = entries.get_mut(&handle.location) {
            entry.locked = false;
            entry.touch(sequence);
        }
        Ok(())
    }

    /// Evict unlocked entries, least recently used first, down to
    /// `min_entries`. Returns the number evicted.
    ///
    /// Blocks while evicted handles are closed.
    pub fn cleanup(&self) -> usize {
        self.shared.cleanup()
    }

    /// Close and remove cached entries.
    ///
    /// Without `force` only unlocked entries are closed. With `force` locked
    /// entries are closed too; their holders see
    /// [`IoError::Closed`](nimbus_io::IoError::Closed) on the next use.
    pub fn clear_cache(&self, force: bool) {
        let victims: Vec<(String, CacheEntry)> = self
            .shared
            .entries
            .lock()
            .extract_if(|_, entry| force || !entry.locked)
            .collect();

        for (location, entry) in &victims {
            if entry.locked {
                warn!("Force closing locked handle for {}", location);
            }
            close_file(location, &entry.file);
        }
        debug!("Cleared {} cached handles", victims.len());
    }

    /// Stop caching: the sweep stops and unlocked entries are closed.
    ///
    /// Later acquires return untracked handles.
    pub fn disable(&self) {
        self.shared.enabled.store(false, Ordering::Release);
        self.shared.stop_sweep();
        self.clear_cache(false);
        info!("File cache disabled");
    }

    /// Shut the cache down, closing every entry including locked ones.
    pub fn exit(&self) {
        self.shared.enabled.store(false, Ordering::Release);
        self.shared.stop_sweep();
        self.clear_cache(true);
        info!("File cache shut down");
    }

    /// Current counters and entry counts
    pub fn stats(&self) -> CacheStats {
        let (entries, locked) = {
            let map = self.shared.entries.lock();
            (map.len(), map.values().filter(|e| e.locked).count())
        };
        let counters = &self.shared.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            opens: counters.opens.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            entries,
            locked,
        }
    }

    /// Snapshot of every entry, least recently used first
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        let mut snapshot: Vec<(u64, EntrySnapshot)> = self
            .shared
            .entries
            .lock()
            .iter()
            .map(|(location, entry)| {
                (
                    entry.sequence,
                    EntrySnapshot {
                        location: location.clone(),
                        mode: entry.mode,
                        locked: entry.locked,
                        idle: entry.last_accessed.elapsed(),
                        access_count: entry.access_count,
                    },
                )
            })
            .collect();
        snapshot.sort_unstable_by_key(|(sequence, _)| *sequence);
        snapshot.into_iter().map(|(_, entry)| entry).collect()
    }
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("config", &self.shared.config)
            .field("enabled", &self.is_enabled())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}
