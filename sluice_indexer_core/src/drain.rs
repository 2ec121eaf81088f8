use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{executor::InFlightFlushes, item::BufferedItem, scheduler::FlushScheduler};

/// Flushes everything still buffered and waits for every in-flight flush.
///
/// The receiver is closed first, so records sent after this point are rejected and
/// records already queued are flushed.
pub(crate) async fn drain_until_idle(
    rx: &mut mpsc::UnboundedReceiver<BufferedItem>,
    scheduler: &mut FlushScheduler,
    flushes: &mut InFlightFlushes,
) {
    rx.close();
    while let Ok(item) = rx.try_recv() {
        if let Some(batch) = scheduler.enqueue(item) {
            flushes.dispatch(batch);
        }
    }

    info!(
        buffered_items = scheduler.buffered_items(),
        in_flight = scheduler.in_flight(),
        "draining indexer"
    );

    loop {
        if let Some(batch) = scheduler.try_admit() {
            flushes.dispatch(batch);
        }

        if scheduler.is_idle() {
            break;
        }

        let Some(outcome) = flushes.next().await else {
            // Only reachable if credits and in-flight flushes disagree.
            debug!("no flush in flight while draining");
            break;
        };

        debug!(batch_id = outcome.batch_id(), "flush completed while draining");
        if let Some(batch) = scheduler.complete_flush() {
            flushes.dispatch(batch);
        }
    }

    info!("indexer drained");
}
