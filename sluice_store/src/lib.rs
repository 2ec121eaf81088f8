//! Bulk-write collaborators for the sluice indexer.
//!
//! The indexer only ever talks to a document store through the [`BulkStore`] trait: one
//! call carrying an ordered list of write descriptors, answered with an overall result and
//! optional per-item outcomes. Implementations must be safe to call concurrently since the
//! indexer keeps several bulk calls in flight on the same store.
//!
//! Two implementations are provided:
//!
//!  - [`ElasticsearchStore`] sends NDJSON to an Elasticsearch-compatible `_bulk` endpoint.
//!  - [`InMemoryStore`] keeps documents in memory and is meant for development and tests.

pub mod elasticsearch;
pub mod error;
pub mod memory;
pub mod types;

pub use elasticsearch::{ElasticsearchOptions, ElasticsearchStore};
pub use error::{Result, StoreError};
pub use memory::{BulkCall, InMemoryStore};
pub use types::{BulkOperation, BulkResponse, ItemFailure, ItemOutcome, WriteDescriptor};

/// A document store that accepts bulk writes.
#[async_trait::async_trait]
pub trait BulkStore: Send + Sync {
    /// Writes all descriptors with a single bulk call.
    ///
    /// An `Err` means the call as a whole failed and nothing can be assumed about the
    /// individual items. An `Ok` may still contain per-item failures.
    async fn bulk(&self, operations: Vec<WriteDescriptor>) -> Result<BulkResponse>;
}
