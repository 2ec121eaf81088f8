use std::{sync::Arc, time::Duration};

use clap::Args;
use rand::{SeedableRng, rngs::StdRng};
use sluice_indexer_core::{BulkIndexer, run_background_indexer};
use snafu::ResultExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    args::{IndexerArgs, StoreArgs},
    error::{IndexerSnafu, IndexerTaskSnafu, InvalidArgumentSnafu, InvalidRangeSnafu, Result},
    generators::LogRecordGenerator,
    helpers::parse_range,
};

const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Args)]
pub struct StressArgs {
    /// The data stream records are written into.
    #[arg(long, env = "ELASTICSEARCH_DATA_STREAM", default_value = "logs-app")]
    data_stream: String,
    /// How many records to generate per second.
    #[arg(long, default_value_t = 10_000)]
    rate: u64,
    /// How long to generate records for, in seconds.
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,
    /// The length of each message.
    ///
    /// Either provide a number (e.g. 100) or a range (e.g. 20-200).
    #[arg(long, default_value = "20-200")]
    message_size: String,
    #[clap(flatten)]
    store: StoreArgs,
    #[clap(flatten)]
    indexer: IndexerArgs,
}

impl StressArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let message_size = parse_range(&self.message_size).context(InvalidRangeSnafu {})?;
        if self.rate == 0 {
            return InvalidArgumentSnafu {
                name: "rate",
                message: "must be greater than zero",
            }
            .fail();
        }

        let store = self.store.build()?;
        let indexer = BulkIndexer::new(store.bulk_store(), self.indexer.options());
        let client = indexer.client();

        info!(
            data_stream = %self.data_stream,
            rate = self.rate,
            duration_secs = self.duration_secs,
            message_size = ?message_size,
            options = ?indexer.options(),
            "running stress test"
        );

        let indexer_task = tokio::spawn(run_background_indexer(indexer, ct.clone()));

        let destination: Arc<str> = self.data_stream.into();
        let mut generator = LogRecordGenerator::new(message_size, StdRng::from_os_rng());
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        let deadline = tokio::time::sleep(Duration::from_secs(self.duration_secs));
        tokio::pin!(deadline);

        let start = Instant::now();
        let mut generated = 0u64;

        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    break;
                }
                _ = &mut deadline => {
                    break;
                }
                _ = ticker.tick() => {
                    let due = records_due(self.rate, start.elapsed());
                    while generated < due {
                        client.enqueue(destination.clone(), &generator.next_record());
                        generated += 1;
                    }
                }
            }
        }

        let generation_time = start.elapsed();
        info!(generated, elapsed = ?generation_time, "generation finished, draining indexer");

        drop(client);
        indexer_task
            .await
            .context(IndexerTaskSnafu {})?
            .context(IndexerSnafu {})?;

        let total_time = start.elapsed();
        let records_per_sec = generated as f64 / total_time.as_secs_f64().max(f64::EPSILON);
        info!(
            generated,
            elapsed = ?total_time,
            records_per_sec = records_per_sec as u64,
            "stress test finished"
        );
        store.report().await;

        Ok(())
    }
}

/// Number of records that should have been generated after `elapsed` at `rate` per second.
fn records_due(rate: u64, elapsed: Duration) -> u64 {
    (rate as u128 * elapsed.as_millis() / 1000) as u64
}
