//! Flush triggering and admission.
//!
//! The [`FlushScheduler`] owns the buffer, the flush timer and the admission state. All
//! of its methods are synchronous and run inside the indexer task, so a threshold
//! crossed by an enqueue is acted upon before the next record is looked at.
//!
//! Admission hands out up to `max_parallel_flushes` credits. When a flush is triggered
//! while every credit is held, the buffer is left untouched and a single pending flag
//! is raised; the next completing flush drains everything accumulated in the meantime.
use tracing::trace;

use crate::{
    batch::FlushBatch, buffer::Buffer, item::BufferedItem, options::IndexerOptions,
    timer::FlushTimer,
};

/// Bookkeeping of the concurrency gate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionState {
    in_flight: usize,
    pending_flush: bool,
}

impl AdmissionState {
    /// Number of dispatched batches whose completion has not been reported yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Whether a flush was triggered while every credit was held.
    pub fn is_flush_pending(&self) -> bool {
        self.pending_flush
    }
}

#[derive(Debug)]
pub struct FlushScheduler {
    options: IndexerOptions,
    buffer: Buffer,
    timer: FlushTimer,
    admission: AdmissionState,
    next_batch_id: u64,
}

impl FlushScheduler {
    /// Creates a scheduler with the given options, raised to their minimum values.
    pub fn new(options: IndexerOptions) -> Self {
        let options = options.normalized();
        let timer = FlushTimer::new(options.flush_interval);

        Self {
            options,
            buffer: Buffer::default(),
            timer,
            admission: AdmissionState::default(),
            next_batch_id: 0,
        }
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    /// Buffers `item`.
    ///
    /// Returns a batch to dispatch if the item made the buffer cross a threshold and a
    /// credit is available. Otherwise makes sure the flush timer is armed.
    pub fn enqueue(&mut self, item: BufferedItem) -> Option<FlushBatch> {
        self.buffer.push(item);

        if self.is_threshold_crossed() {
            trace!(
                items = self.buffer.len(),
                bytes = self.buffer.total_bytes(),
                "flush threshold crossed"
            );
            self.timer.cancel();
            return self.try_admit();
        }

        self.timer.arm();
        None
    }

    /// Waits for the flush timer. Never resolves while the timer is not armed.
    pub async fn flush_timer_expiration(&mut self) {
        self.timer.expired().await
    }

    /// Handles the flush timer firing.
    pub fn flush_timer_expired(&mut self) -> Option<FlushBatch> {
        trace!(items = self.buffer.len(), "flush timer expired");
        self.try_admit()
    }

    /// Drains the buffer into a new batch if a credit is available.
    ///
    /// Does nothing if the buffer is empty. If every credit is held, marks a flush as
    /// pending and leaves the buffer untouched.
    pub fn try_admit(&mut self) -> Option<FlushBatch> {
        if self.buffer.is_empty() {
            return None;
        }

        if self.admission.in_flight >= self.options.max_parallel_flushes {
            self.admission.pending_flush = true;
            return None;
        }

        self.timer.cancel();

        let batch = self.buffer.drain(self.next_batch_id);
        self.next_batch_id += 1;
        self.admission.in_flight += 1;

        Some(batch)
    }

    /// Releases the credit held by a completed flush, whatever its outcome.
    ///
    /// Returns the next batch to dispatch if a flush was pending or the buffer crossed a
    /// threshold in the meantime.
    pub fn complete_flush(&mut self) -> Option<FlushBatch> {
        self.admission.in_flight = self.admission.in_flight.saturating_sub(1);

        if self.admission.pending_flush {
            self.admission.pending_flush = false;
            return self.try_admit();
        }

        if self.is_threshold_crossed() {
            return self.try_admit();
        }

        if !self.buffer.is_empty() {
            self.timer.arm();
        }

        None
    }

    pub fn admission(&self) -> AdmissionState {
        self.admission
    }

    pub fn in_flight(&self) -> usize {
        self.admission.in_flight
    }

    pub fn is_flush_pending(&self) -> bool {
        self.admission.pending_flush
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn buffered_items(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.buffer.total_bytes()
    }

    /// True once nothing is buffered and no flush is in flight.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.admission.in_flight == 0
    }

    fn is_threshold_crossed(&self) -> bool {
        self.buffer.is_full(
            self.options.max_batch_size,
            self.options.max_batch_bytes.as_u64(),
        )
    }
}
