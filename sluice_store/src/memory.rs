//! In-memory implementation of the [`BulkStore`] trait.
//!
//! Documents are kept per destination and lost when the store is dropped. The store
//! behaves like a document store that only accepts JSON objects: any other payload is
//! rejected with a per-item `mapper_parsing_exception`. It can simulate slow responses
//! and total outages, and records every bulk call it receives.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::{sync::RwLock, time::Instant};
use tracing::debug;

use crate::{
    BulkStore,
    error::{Result, UnavailableSnafu},
    types::{BulkResponse, ItemFailure, ItemOutcome, WriteDescriptor},
};

/// A bulk call received by the [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkCall {
    /// When the call reached the store.
    pub started_at: Instant,
    /// When the store answered.
    pub completed_at: Instant,
    /// Number of documents in the call.
    pub num_items: usize,
    /// Number of documents the store rejected.
    pub failed_items: usize,
    /// Whether the whole call was rejected because the store was unavailable.
    pub rejected: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<String, Vec<Bytes>>,
    calls: Vec<BulkCall>,
}

#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    latency: Duration,
    available: AtomicBool,
}

impl InMemoryStore {
    /// Create a new, empty and available store that answers immediately.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            latency: Duration::ZERO,
            available: AtomicBool::new(true),
        }
    }

    /// Delay every bulk call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// While unavailable, every bulk call fails as a whole.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Documents stored in `destination`, in write order.
    pub async fn documents(&self, destination: &str) -> Vec<Bytes> {
        let state = self.state.read().await;
        state.documents.get(destination).cloned().unwrap_or_default()
    }

    /// Total number of stored documents across all destinations.
    pub async fn document_count(&self) -> usize {
        let state = self.state.read().await;
        state.documents.values().map(Vec::len).sum()
    }

    /// All bulk calls received so far, in completion order.
    pub async fn calls(&self) -> Vec<BulkCall> {
        self.state.read().await.calls.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BulkStore for InMemoryStore {
    async fn bulk(&self, operations: Vec<WriteDescriptor>) -> Result<BulkResponse> {
        let started_at = Instant::now();
        let num_items = operations.len();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.write().await;

        if !self.available.load(Ordering::SeqCst) {
            state.calls.push(BulkCall {
                started_at,
                completed_at: Instant::now(),
                num_items,
                failed_items: num_items,
                rejected: true,
            });
            return UnavailableSnafu {}.fail();
        }

        let mut items = Vec::with_capacity(num_items);
        let mut failed_items = 0;
        for op in operations {
            if serde_json::from_slice::<Map<String, Value>>(&op.payload).is_err() {
                failed_items += 1;
                items.push(ItemOutcome::Failed(ItemFailure {
                    error_type: "mapper_parsing_exception".to_string(),
                    reason: "failed to parse, document is not a JSON object".to_string(),
                    status: Some(400),
                }));
                continue;
            }

            state
                .documents
                .entry(op.destination.to_string())
                .or_default()
                .push(op.payload);
            items.push(ItemOutcome::Succeeded { status: Some(201) });
        }

        let completed_at = Instant::now();
        state.calls.push(BulkCall {
            started_at,
            completed_at,
            num_items,
            failed_items,
            rejected: false,
        });

        debug!(num_items, failed_items, "in-memory bulk write");

        Ok(BulkResponse {
            took: Some(completed_at - started_at),
            errors: failed_items > 0,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    fn descriptor(destination: &str, payload: &'static str) -> WriteDescriptor {
        WriteDescriptor::new(destination.into(), Bytes::from_static(payload.as_bytes()))
    }

    #[tokio::test]
    async fn test_stores_documents_per_destination() {
        let store = InMemoryStore::new();

        let response = store
            .bulk(vec![
                descriptor("logs", r#"{"n":1}"#),
                descriptor("traces", r#"{"n":2}"#),
                descriptor("logs", r#"{"n":3}"#),
            ])
            .await
            .expect("bulk");

        assert!(!response.has_errors());
        assert_eq!(
            store.documents("logs").await,
            vec![Bytes::from_static(br#"{"n":1}"#), Bytes::from_static(br#"{"n":3}"#)]
        );
        assert_eq!(store.documents("traces").await.len(), 1);
        assert_eq!(store.document_count().await, 3);
    }

    #[tokio::test]
    async fn test_rejects_non_object_documents() {
        let store = InMemoryStore::new();

        let response = store
            .bulk(vec![
                descriptor("logs", r#"{"n":1}"#),
                descriptor("logs", "not json"),
                descriptor("logs", "[1, 2]"),
            ])
            .await
            .expect("bulk");

        assert!(response.errors);
        assert_eq!(response.failed_count(), 2);
        assert_eq!(
            response.first_failure().map(|f| f.error_type.as_str()),
            Some("mapper_parsing_exception")
        );
        assert_eq!(store.document_count().await, 1);

        let calls = store.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].failed_items, 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_rejects_whole_call() {
        let store = InMemoryStore::new();
        store.set_available(false);

        let err = store
            .bulk(vec![descriptor("logs", r#"{"n":1}"#)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable));
        assert_eq!(store.document_count().await, 0);
        assert!(store.calls().await[0].rejected);

        store.set_available(true);
        store
            .bulk(vec![descriptor("logs", r#"{"n":2}"#)])
            .await
            .expect("bulk");
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let store = InMemoryStore::new().with_latency(Duration::from_millis(250));

        store
            .bulk(vec![descriptor("logs", r#"{"n":1}"#)])
            .await
            .expect("bulk");

        let calls = store.calls().await;
        assert_eq!(
            calls[0].completed_at - calls[0].started_at,
            Duration::from_millis(250)
        );
    }
}
