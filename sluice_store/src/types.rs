use std::{sync::Arc, time::Duration};

use bytes::Bytes;

/// Length of an action line with empty operation and index names: `{"":{"_index":""}}`.
const ACTION_LINE_FRAME_LEN: usize = 18;

/// One document to write into a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteDescriptor {
    /// The data stream or index the document is written into.
    pub destination: Arc<str>,
    /// The serialized document, a single line of JSON.
    pub payload: Bytes,
}

/// The bulk action used for every document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BulkOperation {
    /// Append-only write. Required by data streams, which reject overwrites.
    #[default]
    Create,
    /// Create-or-replace write.
    Index,
}

/// Result of a bulk call that reached the store.
#[derive(Debug, Clone, Default)]
pub struct BulkResponse {
    /// Time the store reports spending on the request.
    pub took: Option<Duration>,
    /// Whether the store flagged at least one item as failed.
    pub errors: bool,
    /// Per-item outcomes, in request order.
    pub items: Vec<ItemOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded { status: Option<u16> },
    Failed(ItemFailure),
}

/// Why the store rejected a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub error_type: String,
    pub reason: String,
    pub status: Option<u16>,
}

impl WriteDescriptor {
    pub fn new(destination: Arc<str>, payload: Bytes) -> Self {
        Self {
            destination,
            payload,
        }
    }

    /// Bytes the bulk envelope adds around a document for `destination`: the action line
    /// and the two line separators.
    ///
    /// Computed for [`BulkOperation::Create`], which has the longest action name.
    pub fn envelope_size(destination: &str) -> u64 {
        (BulkOperation::Create.as_str().len() + ACTION_LINE_FRAME_LEN + destination.len() + 2)
            as u64
    }
}

impl BulkOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperation::Create => "create",
            BulkOperation::Index => "index",
        }
    }
}

impl BulkResponse {
    /// Returns true if the store flagged errors or any item failed.
    pub fn has_errors(&self) -> bool {
        self.errors || self.items.iter().any(ItemOutcome::is_failed)
    }

    /// The first item failure, in request order.
    pub fn first_failure(&self) -> Option<&ItemFailure> {
        self.items.iter().find_map(|item| match item {
            ItemOutcome::Failed(failure) => Some(failure),
            ItemOutcome::Succeeded { .. } => None,
        })
    }

    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_failed()).count()
    }
}

impl ItemOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_size_matches_action_line() {
        let action_line = r#"{"create":{"_index":"logs-app"}}"#;
        assert_eq!(
            WriteDescriptor::envelope_size("logs-app"),
            (action_line.len() + 2) as u64
        );
    }

    #[test]
    fn test_first_failure_in_request_order() {
        let first = ItemFailure {
            error_type: "mapper_parsing_exception".to_string(),
            reason: "failed to parse".to_string(),
            status: Some(400),
        };
        let second = ItemFailure {
            error_type: "version_conflict_engine_exception".to_string(),
            reason: "document already exists".to_string(),
            status: Some(409),
        };
        let response = BulkResponse {
            took: None,
            errors: true,
            items: vec![
                ItemOutcome::Succeeded { status: Some(201) },
                ItemOutcome::Failed(first.clone()),
                ItemOutcome::Failed(second),
            ],
        };

        assert!(response.has_errors());
        assert_eq!(response.failed_count(), 2);
        assert_eq!(response.first_failure(), Some(&first));
    }

    #[test]
    fn test_errors_flag_without_item_details() {
        let response = BulkResponse {
            took: None,
            errors: true,
            items: Vec::new(),
        };

        assert!(response.has_errors());
        assert!(response.first_failure().is_none());
    }
}
