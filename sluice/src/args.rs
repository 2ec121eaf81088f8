use std::{sync::Arc, time::Duration};

use bytesize::ByteSize;
use clap::{Args, ValueEnum};
use sluice_indexer_core::{
    IndexerOptions,
    options::{
        DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BATCH_BYTES, DEFAULT_MAX_BATCH_SIZE,
        DEFAULT_MAX_PARALLEL_FLUSHES,
    },
};
use sluice_store::{
    BulkOperation, BulkStore, ElasticsearchOptions, ElasticsearchStore, InMemoryStore,
};
use snafu::ResultExt;
use tracing::info;

use crate::error::{Result, StoreSnafu};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Arguments controlling when the indexer flushes.
#[derive(Debug, Clone, Args)]
pub struct IndexerArgs {
    /// Number of buffered records that triggers a flush.
    #[arg(long, env = "BULK_BATCH_SIZE", default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub batch_size: usize,
    /// Buffered volume, in MiB, that triggers a flush.
    #[arg(long, env = "BULK_BATCH_BYTES_MB", default_value_t = DEFAULT_MAX_BATCH_BYTES / BYTES_PER_MB)]
    pub batch_bytes_mb: u64,
    /// Maximum time a record waits in the buffer, in milliseconds.
    #[arg(long, env = "BULK_FLUSH_INTERVAL_MS", default_value_t = DEFAULT_FLUSH_INTERVAL.as_millis() as u64)]
    pub flush_interval_ms: u64,
    /// Maximum number of bulk requests in flight.
    #[arg(long, env = "BULK_MAX_PARALLEL_FLUSHES", default_value_t = DEFAULT_MAX_PARALLEL_FLUSHES)]
    pub max_parallel_flushes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Send bulk requests to an Elasticsearch node.
    Elasticsearch,
    /// Keep documents in memory. Useful to test the indexer without a cluster.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BulkOperationArg {
    /// Append-only writes, required by data streams.
    Create,
    /// Create-or-replace writes.
    Index,
}

/// Arguments selecting and configuring the store.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// The store records are written to.
    #[arg(long, value_enum, default_value_t = StoreKind::Elasticsearch)]
    pub store: StoreKind,
    /// The Elasticsearch node receiving bulk requests.
    #[arg(long, env = "ELASTICSEARCH_NODE", default_value = "http://localhost:9200")]
    pub elasticsearch_node: String,
    /// The bulk action used for every document.
    #[arg(long, value_enum, default_value_t = BulkOperationArg::Create)]
    pub bulk_operation: BulkOperationArg,
    /// Timeout of each bulk request, in milliseconds. No timeout if unset.
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,
    /// Simulated latency of each bulk call to the in-memory store, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub memory_latency_ms: u64,
}

/// The store selected on the command line.
pub enum ConfiguredStore {
    Elasticsearch(Arc<ElasticsearchStore>),
    Memory(Arc<InMemoryStore>),
}

impl IndexerArgs {
    pub fn options(&self) -> IndexerOptions {
        IndexerOptions::default()
            .with_max_batch_size(self.batch_size)
            .with_max_batch_bytes(ByteSize::b(self.batch_bytes_mb.saturating_mul(BYTES_PER_MB)))
            .with_flush_interval(Duration::from_millis(self.flush_interval_ms))
            .with_max_parallel_flushes(self.max_parallel_flushes)
    }
}

impl StoreArgs {
    pub fn build(&self) -> Result<ConfiguredStore> {
        match self.store {
            StoreKind::Elasticsearch => {
                let operation = match self.bulk_operation {
                    BulkOperationArg::Create => BulkOperation::Create,
                    BulkOperationArg::Index => BulkOperation::Index,
                };
                let options = ElasticsearchOptions::default()
                    .with_operation(operation)
                    .with_request_timeout(self.request_timeout_ms.map(Duration::from_millis));
                let store = ElasticsearchStore::new(&self.elasticsearch_node, options)
                    .context(StoreSnafu {})?;

                info!(
                    bulk_url = store.bulk_url(),
                    operation = operation.as_str(),
                    "using Elasticsearch store"
                );
                Ok(ConfiguredStore::Elasticsearch(Arc::new(store)))
            }
            StoreKind::Memory => {
                let store = InMemoryStore::new()
                    .with_latency(Duration::from_millis(self.memory_latency_ms));

                info!(latency_ms = self.memory_latency_ms, "using in-memory store");
                Ok(ConfiguredStore::Memory(Arc::new(store)))
            }
        }
    }
}

impl ConfiguredStore {
    pub fn bulk_store(&self) -> Arc<dyn BulkStore> {
        match self {
            ConfiguredStore::Elasticsearch(store) => store.clone(),
            ConfiguredStore::Memory(store) => store.clone(),
        }
    }

    /// Logs what the in-memory store received. Does nothing for Elasticsearch.
    pub async fn report(&self) {
        let ConfiguredStore::Memory(store) = self else {
            return;
        };

        let calls = store.calls().await;
        let rejected_items = calls.iter().map(|call| call.failed_items).sum::<usize>();

        info!(
            documents = store.document_count().await,
            bulk_calls = calls.len(),
            rejected_items,
            "in-memory store contents"
        );
    }
}
