//! In-memory window over a contiguous range of the file.

/// Fixed-capacity buffer mirroring `[buffer_start, buffer_start + data_size)`.
pub(super) struct Window {
    pub(super) buffer: Box<[u8]>,
    /// File offset of `buffer[0]`
    pub(super) buffer_start: u64,
    /// Number of valid bytes in `buffer`
    pub(super) data_size: usize,
    /// Buffer holds bytes not yet written back
    pub(super) dirty: bool,
    /// Last refill returned no bytes
    pub(super) end_of_file: bool,
}

impl Window {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            buffer_start: 0,
            data_size: 0,
            dirty: false,
            end_of_file: false,
        }
    }

    pub(super) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// One past the last valid file offset held in the window.
    pub(super) fn data_end(&self) -> u64 {
        self.buffer_start + self.data_size as u64
    }

    /// `pos` addresses a valid byte in the window.
    pub(super) fn contains(&self, pos: u64) -> bool {
        pos >= self.buffer_start && pos < self.data_end()
    }

    /// `pos` is inside the window or directly after its last byte.
    pub(super) fn touches(&self, pos: u64) -> bool {
        pos >= self.buffer_start && pos <= self.data_end()
    }

    /// Buffer index of `pos`. Caller must have checked [`Self::touches`].
    pub(super) fn offset(&self, pos: u64) -> usize {
        (pos - self.buffer_start) as usize
    }

    pub(super) fn byte_at(&self, pos: u64) -> Option<u8> {
        if self.contains(pos) {
            Some(self.buffer[self.offset(pos)])
        } else {
            None
        }
    }

    pub(super) fn valid(&self) -> &[u8] {
        &self.buffer[..self.data_size]
    }

    /// Empty window positioned at `pos`. Must not be dirty.
    pub(super) fn reset(&mut self, pos: u64) {
        debug_assert!(!self.dirty);
        self.buffer_start = pos;
        self.data_size = 0;
        self.end_of_file = false;
    }
}
