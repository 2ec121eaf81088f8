use std::sync::Arc;

use futures_util::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use sluice_observability::KeyValue;
use sluice_store::BulkStore;
use tracing::{debug, warn};

use crate::{batch::FlushBatch, metrics::IndexerMetrics};

/// How a flush ended.
///
/// Every outcome releases the batch's credit. None of them puts items back in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The store accepted every item.
    Flushed { batch_id: u64, items: usize },
    /// The store accepted the call but rejected `failed` items.
    PartiallyFailed {
        batch_id: u64,
        items: usize,
        failed: usize,
    },
    /// The bulk call failed and the whole batch was discarded.
    Dropped { batch_id: u64, items: usize },
}

impl FlushOutcome {
    pub fn batch_id(&self) -> u64 {
        match self {
            FlushOutcome::Flushed { batch_id, .. }
            | FlushOutcome::PartiallyFailed { batch_id, .. }
            | FlushOutcome::Dropped { batch_id, .. } => *batch_id,
        }
    }

    pub fn items(&self) -> usize {
        match self {
            FlushOutcome::Flushed { items, .. }
            | FlushOutcome::PartiallyFailed { items, .. }
            | FlushOutcome::Dropped { items, .. } => *items,
        }
    }

    /// Number of items the store kept.
    pub fn stored_items(&self) -> usize {
        match self {
            FlushOutcome::Flushed { items, .. } => *items,
            FlushOutcome::PartiallyFailed { items, failed, .. } => items.saturating_sub(*failed),
            FlushOutcome::Dropped { .. } => 0,
        }
    }
}

/// Writes batches to the store.
///
/// Write failures are logged and never returned.
#[derive(Clone)]
pub struct FlushExecutor {
    store: Arc<dyn BulkStore>,
    metrics: Arc<IndexerMetrics>,
}

impl FlushExecutor {
    pub fn new(store: Arc<dyn BulkStore>, metrics: Arc<IndexerMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Writes `batch` with a single bulk call.
    pub async fn execute(self, batch: FlushBatch) -> FlushOutcome {
        let batch_id = batch.id();
        let items = batch.len();
        let size_bytes = batch.size_bytes();

        self.metrics.in_flight_flushes.add(1, &[]);
        let result = self.store.bulk(batch.into_descriptors()).await;
        self.metrics.in_flight_flushes.add(-1, &[]);

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    batch_id,
                    items,
                    %error,
                    "bulk write failed, dropping batch"
                );
                self.metrics.failed_batches.add(1, &[]);
                self.metrics.failed_items.add(items as u64, &[]);
                return FlushOutcome::Dropped { batch_id, items };
            }
        };

        self.metrics.flushed_bytes.add(size_bytes, &[]);

        if !response.has_errors() {
            debug!(
                batch_id,
                items,
                size_bytes,
                took_ms = response.took.map(|took| took.as_millis() as u64),
                "bulk write completed"
            );
            self.metrics.flushed_items.add(items as u64, &[]);
            return FlushOutcome::Flushed { batch_id, items };
        }

        let failed = response.failed_count();
        match response.first_failure() {
            Some(failure) => {
                warn!(
                    batch_id,
                    items,
                    failed,
                    error_type = %failure.error_type,
                    reason = %failure.reason,
                    "bulk write had item failures"
                );
                self.metrics.failed_items.add(
                    failed as u64,
                    &[KeyValue::new("error_type", failure.error_type.clone())],
                );
            }
            None => {
                warn!(
                    batch_id,
                    items,
                    "bulk write reported errors without failure details"
                );
            }
        }

        let outcome = FlushOutcome::PartiallyFailed {
            batch_id,
            items,
            failed,
        };
        self.metrics
            .flushed_items
            .add(outcome.stored_items() as u64, &[]);
        outcome
    }
}

impl std::fmt::Debug for FlushExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushExecutor").finish_non_exhaustive()
    }
}

/// Flushes dispatched by the indexer and not completed yet.
pub(crate) struct InFlightFlushes {
    executor: FlushExecutor,
    tasks: FuturesUnordered<BoxFuture<'static, FlushOutcome>>,
}

impl InFlightFlushes {
    pub fn new(executor: FlushExecutor) -> Self {
        Self {
            executor,
            tasks: FuturesUnordered::new(),
        }
    }

    /// Starts writing `batch` without waiting for it.
    pub fn dispatch(&mut self, batch: FlushBatch) {
        debug!(
            batch_id = batch.id(),
            items = batch.len(),
            size_bytes = batch.size_bytes(),
            "dispatching flush"
        );
        self.tasks.push(self.executor.clone().execute(batch).boxed());
    }

    /// Waits for the next flush to complete. Returns `None` if nothing is in flight.
    pub async fn next(&mut self) -> Option<FlushOutcome> {
        self.tasks.next().await
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
