use std::{sync::Arc, time::Duration};

use sluice_indexer_core::{BulkIndexer, BulkIndexerClient, IndexerOptions, run_background_indexer};
use sluice_store::{BulkCall, InMemoryStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DESTINATION: &str = "logs-app";

pub fn create_bulk_indexer(
    store: Arc<InMemoryStore>,
    options: IndexerOptions,
) -> (JoinHandle<()>, BulkIndexerClient, CancellationToken) {
    let indexer = BulkIndexer::new(store, options);

    let client = indexer.client();
    let ct = CancellationToken::new();
    let task = tokio::spawn({
        let ct = ct.clone();
        async move {
            run_background_indexer(indexer, ct)
                .await
                .expect("indexer run");
        }
    });

    (task, client, ct)
}

/// Lets the indexer task process everything queued so far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn call_sizes(calls: &[BulkCall]) -> Vec<usize> {
    calls.iter().map(|call| call.num_items).collect()
}

/// Largest number of bulk calls that were running at the same time.
#[allow(dead_code)]
pub fn max_overlap(calls: &[BulkCall]) -> usize {
    calls
        .iter()
        .map(|call| {
            calls
                .iter()
                .filter(|other| {
                    other.started_at <= call.started_at && call.started_at < other.completed_at
                })
                .count()
        })
        .max()
        .unwrap_or_default()
}
