use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{
    error::{IndexerClosedSnafu, Result},
    item::BufferedItem,
    metrics::IndexerMetrics,
};

/// Hands records to a running [`BulkIndexer`](crate::BulkIndexer).
///
/// None of the methods block or wait for the store: records are sized and validated on
/// the caller's task, then queued for the indexer.
#[derive(Clone)]
pub struct BulkIndexerClient {
    tx: mpsc::UnboundedSender<BufferedItem>,
    metrics: Arc<IndexerMetrics>,
}

impl BulkIndexerClient {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<BufferedItem>,
        metrics: Arc<IndexerMetrics>,
    ) -> Self {
        Self { tx, metrics }
    }

    /// Buffers `record` for `destination`.
    ///
    /// Records that cannot be buffered are logged and dropped.
    pub fn enqueue<T>(&self, destination: impl Into<Arc<str>>, record: &T)
    where
        T: Serialize + ?Sized,
    {
        if let Err(error) = self.try_enqueue(destination, record) {
            warn!(%error, "dropping record");
        }
    }

    /// Buffers `record` for `destination`, returning why it was rejected if it was.
    pub fn try_enqueue<T>(&self, destination: impl Into<Arc<str>>, record: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let item = BufferedItem::from_record(destination, record);
        self.send(item)
    }

    /// Buffers an already serialized record.
    ///
    /// Records that cannot be buffered are logged and dropped.
    pub fn enqueue_raw(&self, destination: impl Into<Arc<str>>, payload: Bytes) {
        if let Err(error) = self.try_enqueue_raw(destination, payload) {
            warn!(%error, "dropping record");
        }
    }

    /// Buffers an already serialized record, returning why it was rejected if it was.
    pub fn try_enqueue_raw(&self, destination: impl Into<Arc<str>>, payload: Bytes) -> Result<()> {
        let item = BufferedItem::new(destination, payload);
        self.send(item)
    }

    /// Returns true once the indexer stopped accepting records.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, item: Result<BufferedItem>) -> Result<()> {
        let item = match item {
            Ok(item) => item,
            Err(error) => {
                self.metrics.dropped_items.add(1, &[]);
                return Err(error);
            }
        };

        if self.tx.send(item).is_err() {
            self.metrics.dropped_items.add(1, &[]);
            return IndexerClosedSnafu {}.fail();
        }

        self.metrics.enqueued_items.add(1, &[]);
        Ok(())
    }
}

impl std::fmt::Debug for BulkIndexerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkIndexerClient")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::IndexerError;

    fn client() -> (BulkIndexerClient, mpsc::UnboundedReceiver<BufferedItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = BulkIndexerClient::new(tx, Arc::new(IndexerMetrics::default()));
        (client, rx)
    }

    #[test]
    fn test_enqueue_sends_sized_item() {
        let (client, mut rx) = client();

        client
            .try_enqueue("logs-app", &json!({"message": "hello"}))
            .expect("enqueue");

        let item = rx.try_recv().expect("item");
        assert_eq!(&*item.destination, "logs-app");
        assert_eq!(item.payload, Bytes::from_static(br#"{"message":"hello"}"#));
    }

    #[test]
    fn test_invalid_record_is_not_sent() {
        let (client, mut rx) = client();

        let err = client
            .try_enqueue_raw("logs-app", Bytes::from_static(b"{\n}"))
            .unwrap_err();
        assert!(matches!(err, IndexerError::Validation { .. }));

        // The infallible variant swallows the error.
        client.enqueue("", &json!({"message": "hello"}));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_indexer() {
        let (client, rx) = client();
        drop(rx);

        assert!(client.is_closed());
        let err = client
            .try_enqueue("logs-app", &json!({"message": "late"}))
            .unwrap_err();
        assert!(matches!(err, IndexerError::IndexerClosed));
    }
}
