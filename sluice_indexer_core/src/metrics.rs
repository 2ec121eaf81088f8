use sluice_observability::{Counter, UpDownCounter};

pub struct IndexerMetrics {
    pub enqueued_items: Counter<u64>,
    pub dropped_items: Counter<u64>,
    pub flushed_items: Counter<u64>,
    pub flushed_bytes: Counter<u64>,
    pub failed_items: Counter<u64>,
    pub failed_batches: Counter<u64>,
    pub in_flight_flushes: UpDownCounter<i64>,
}

impl Default for IndexerMetrics {
    fn default() -> Self {
        let meter = sluice_observability::meter("indexer");
        Self {
            enqueued_items: meter
                .u64_counter("indexer.enqueued.items")
                .with_unit("{item}")
                .with_description("records accepted into the buffer")
                .build(),
            dropped_items: meter
                .u64_counter("indexer.dropped.items")
                .with_unit("{item}")
                .with_description("records rejected before reaching the buffer")
                .build(),
            flushed_items: meter
                .u64_counter("indexer.flushed.items")
                .with_unit("{item}")
                .with_description("records the store accepted")
                .build(),
            flushed_bytes: meter
                .u64_counter("indexer.flushed.bytes")
                .with_unit("By")
                .with_description("bytes sent to the store in bulk writes")
                .build(),
            failed_items: meter
                .u64_counter("indexer.failed.items")
                .with_unit("{item}")
                .with_description("records the store rejected or never received")
                .build(),
            failed_batches: meter
                .u64_counter("indexer.failed.batches")
                .with_unit("{batch}")
                .with_description("bulk writes that failed as a whole")
                .build(),
            in_flight_flushes: meter
                .i64_up_down_counter("indexer.in_flight.flushes")
                .with_unit("{flush}")
                .with_description("bulk writes currently in flight")
                .build(),
        }
    }
}

impl std::fmt::Debug for IndexerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerMetrics").finish_non_exhaustive()
    }
}
