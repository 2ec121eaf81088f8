//! Buffering and bulk flushing of records into a document store.
//!
//! Records are handed to a [`BulkIndexerClient`], which never blocks. A background
//! [`BulkIndexer`] task collects them in a buffer and flushes the buffer as one bulk
//! write when it reaches a size or byte threshold, or when the flush interval elapses.
//! At most `max_parallel_flushes` bulk writes run at the same time; work that piles up
//! while all of them are busy is flushed as soon as one completes.
//!
//! Write failures are logged and the affected batch is dropped. When the indexer is
//! cancelled, or every client is dropped, it flushes everything still buffered and
//! waits for in-flight writes before returning.

pub mod batch;
pub mod buffer;
pub mod client;
mod drain;
pub mod error;
pub mod executor;
pub mod indexer;
pub mod item;
pub mod metrics;
pub mod options;
pub mod scheduler;
pub mod timer;

pub use batch::FlushBatch;
pub use buffer::Buffer;
pub use client::BulkIndexerClient;
pub use error::{IndexerError, Result};
pub use executor::{FlushExecutor, FlushOutcome};
pub use indexer::{BulkIndexer, run_background_indexer};
pub use item::BufferedItem;
pub use options::IndexerOptions;
pub use scheduler::{AdmissionState, FlushScheduler};
pub use timer::FlushTimer;
