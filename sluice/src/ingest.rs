use std::sync::Arc;

use bytes::Bytes;
use clap::Args;
use serde::de::IgnoredAny;
use sluice_indexer_core::{BulkIndexer, BulkIndexerClient, run_background_indexer};
use snafu::ResultExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    args::{IndexerArgs, StoreArgs},
    error::{IndexerSnafu, IndexerTaskSnafu, IoSnafu, Result},
};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// The data stream records are written into.
    #[arg(long, env = "ELASTICSEARCH_DATA_STREAM", default_value = "logs-app")]
    data_stream: String,
    #[clap(flatten)]
    store: StoreArgs,
    #[clap(flatten)]
    indexer: IndexerArgs,
}

/// Counters for one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub enqueued: u64,
    pub skipped: u64,
}

impl IngestArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let store = self.store.build()?;
        let indexer = BulkIndexer::new(store.bulk_store(), self.indexer.options());
        let client = indexer.client();

        info!(
            data_stream = %self.data_stream,
            options = ?indexer.options(),
            "ingesting records from stdin"
        );

        let indexer_task = tokio::spawn(run_background_indexer(indexer, ct.clone()));

        let stdin = BufReader::new(tokio::io::stdin());
        let stats = ingest_lines(stdin, &client, self.data_stream.into(), &ct).await;

        // Stops the indexer once everything is flushed, unless it was cancelled already.
        drop(client);
        indexer_task
            .await
            .context(IndexerTaskSnafu {})?
            .context(IndexerSnafu {})?;

        let stats = stats?;
        info!(
            lines = stats.lines,
            enqueued = stats.enqueued,
            skipped = stats.skipped,
            "ingestion finished"
        );
        store.report().await;

        Ok(())
    }
}

/// Enqueues every JSON line of `reader` until end of input or cancellation.
///
/// Blank lines are ignored. Lines that are not valid JSON are logged and skipped.
pub async fn ingest_lines<R>(
    reader: R,
    client: &BulkIndexerClient,
    destination: Arc<str>,
    ct: &CancellationToken,
) -> Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = IngestStats::default();

    loop {
        let line = tokio::select! {
            _ = ct.cancelled() => break,
            line = lines.next_line() => line.context(IoSnafu {})?,
        };

        let Some(line) = line else {
            break;
        };

        stats.lines += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Err(error) = serde_json::from_str::<IgnoredAny>(line) {
            warn!(line = stats.lines, %error, "skipping invalid JSON line");
            stats.skipped += 1;
            continue;
        }

        let payload = Bytes::copy_from_slice(line.as_bytes());
        match client.try_enqueue_raw(destination.clone(), payload) {
            Ok(()) => stats.enqueued += 1,
            Err(error) => {
                warn!(line = stats.lines, %error, "skipping record");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sluice_indexer_core::IndexerOptions;
    use sluice_store::InMemoryStore;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ingest_lines() {
        let store = Arc::new(InMemoryStore::new());
        let indexer = BulkIndexer::new(store.clone(), IndexerOptions::default());
        let client = indexer.client();
        let ct = CancellationToken::new();
        let task = tokio::spawn(run_background_indexer(indexer, ct.clone()));

        let input = concat!(
            "{\"message\":\"first\"}\n",
            "\n",
            "   \n",
            "not json\n",
            "  {\"message\":\"second\"}  \n",
            "[1,2]\n",
        );

        let stats = ingest_lines(input.as_bytes(), &client, "logs-app".into(), &ct)
            .await
            .expect("ingest");
        assert_eq!(
            stats,
            IngestStats {
                lines: 6,
                enqueued: 3,
                skipped: 1,
            }
        );

        drop(client);
        task.await.expect("task").expect("indexer");

        // The store rejects the array, the other records are stored trimmed.
        assert_eq!(
            store.documents("logs-app").await,
            vec![
                Bytes::from_static(br#"{"message":"first"}"#),
                Bytes::from_static(br#"{"message":"second"}"#),
            ]
        );
        assert_eq!(store.calls().await[0].failed_items, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_stops_when_cancelled() {
        let store = Arc::new(InMemoryStore::new());
        let indexer = BulkIndexer::new(store.clone(), IndexerOptions::default());
        let client = indexer.client();
        let ct = CancellationToken::new();
        let task = tokio::spawn(run_background_indexer(indexer, ct.clone()));

        // A reader that never yields a line.
        let (reader, _writer) = tokio::io::duplex(64);
        let reader = BufReader::new(reader);

        tokio::spawn({
            let ct = ct.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                ct.cancel();
            }
        });

        let stats = ingest_lines(reader, &client, "logs-app".into(), &ct)
            .await
            .expect("ingest");
        assert_eq!(stats, IngestStats::default());

        task.await.expect("task").expect("indexer");
    }
}
