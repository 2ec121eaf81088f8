use std::time::Duration;

use bytesize::ByteSize;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 6000;
pub const DEFAULT_MAX_BATCH_BYTES: u64 = 32 * 1024 * 1024;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_PARALLEL_FLUSHES: usize = 6;

const MIN_MAX_BATCH_BYTES: u64 = 1024;
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Options controlling when the indexer flushes and how many flushes run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerOptions {
    /// Number of buffered items at which the buffer is flushed.
    pub max_batch_size: usize,
    /// Buffered volume at which the buffer is flushed.
    pub max_batch_bytes: ByteSize,
    /// Maximum time an item waits in a buffer that never reaches a threshold.
    pub flush_interval: Duration,
    /// Maximum number of bulk writes in flight at the same time.
    pub max_parallel_flushes: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_batch_bytes: ByteSize::b(DEFAULT_MAX_BATCH_BYTES),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_parallel_flushes: DEFAULT_MAX_PARALLEL_FLUSHES,
        }
    }
}

impl IndexerOptions {
    /// Change the batch size threshold.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Change the batch volume threshold.
    pub fn with_max_batch_bytes(mut self, max_batch_bytes: ByteSize) -> Self {
        self.max_batch_bytes = max_batch_bytes;
        self
    }

    /// Change the flush interval.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Change the number of concurrent flushes.
    pub fn with_max_parallel_flushes(mut self, max_parallel_flushes: usize) -> Self {
        self.max_parallel_flushes = max_parallel_flushes;
        self
    }

    /// Raises every option to its minimum value.
    ///
    /// Batches hold at least one item and 1 KiB, the flush interval is at least 100ms and
    /// at least one flush may run.
    pub fn normalized(self) -> Self {
        Self {
            max_batch_size: self.max_batch_size.max(1),
            max_batch_bytes: self.max_batch_bytes.max(ByteSize::b(MIN_MAX_BATCH_BYTES)),
            flush_interval: self.flush_interval.max(MIN_FLUSH_INTERVAL),
            max_parallel_flushes: self.max_parallel_flushes.max(1),
        }
    }
}
