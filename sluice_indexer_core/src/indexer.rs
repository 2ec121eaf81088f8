use std::sync::Arc;

use sluice_store::BulkStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    client::BulkIndexerClient,
    drain::drain_until_idle,
    error::Result,
    executor::{FlushExecutor, InFlightFlushes},
    item::BufferedItem,
    metrics::IndexerMetrics,
    options::IndexerOptions,
    scheduler::FlushScheduler,
};

/// Background task that buffers records and flushes them to a [`BulkStore`].
///
/// All buffer, trigger and admission bookkeeping happens on this task. Bulk writes run
/// concurrently with it, up to `max_parallel_flushes` at a time.
pub struct BulkIndexer {
    tx: mpsc::UnboundedSender<BufferedItem>,
    rx: mpsc::UnboundedReceiver<BufferedItem>,
    scheduler: FlushScheduler,
    executor: FlushExecutor,
    metrics: Arc<IndexerMetrics>,
}

/// Runs `indexer` to completion. See [`BulkIndexer::run`].
pub async fn run_background_indexer(indexer: BulkIndexer, ct: CancellationToken) -> Result<()> {
    indexer.run(ct).await
}

impl BulkIndexer {
    pub fn new(store: Arc<dyn BulkStore>, options: IndexerOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(IndexerMetrics::default());
        let executor = FlushExecutor::new(store, metrics.clone());

        Self {
            tx,
            rx,
            scheduler: FlushScheduler::new(options),
            executor,
            metrics,
        }
    }

    pub fn client(&self) -> BulkIndexerClient {
        BulkIndexerClient::new(self.tx.clone(), self.metrics.clone())
    }

    pub fn options(&self) -> &IndexerOptions {
        self.scheduler.options()
    }

    /// Runs until `ct` is cancelled or every client is dropped, then flushes everything
    /// still buffered and waits for in-flight flushes.
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let Self {
            tx,
            mut rx,
            mut scheduler,
            executor,
            ..
        } = self;

        // Only clients keep the channel open from now on.
        drop(tx);

        let mut flushes = InFlightFlushes::new(executor);

        info!(options = ?scheduler.options(), "indexer started");

        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    debug!("indexer cancelled");
                    break;
                }
                _ = scheduler.flush_timer_expiration(), if scheduler.is_timer_armed() => {
                    if let Some(batch) = scheduler.flush_timer_expired() {
                        flushes.dispatch(batch);
                    }
                }
                item = rx.recv() => {
                    let Some(item) = item else {
                        debug!("all indexer clients dropped");
                        break;
                    };

                    if let Some(batch) = scheduler.enqueue(item) {
                        flushes.dispatch(batch);
                    }
                }
                outcome = flushes.next(), if !flushes.is_empty() => {
                    let Some(outcome) = outcome else {
                        continue;
                    };

                    debug!(
                        batch_id = outcome.batch_id(),
                        items = outcome.items(),
                        "flush completed"
                    );
                    if let Some(batch) = scheduler.complete_flush() {
                        flushes.dispatch(batch);
                    }
                }
            }
        }

        drain_until_idle(&mut rx, &mut scheduler, &mut flushes).await;

        Ok(())
    }
}
