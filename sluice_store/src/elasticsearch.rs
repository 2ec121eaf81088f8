//! Bulk writes against an Elasticsearch-compatible `_bulk` endpoint.

use std::{collections::HashMap, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    BulkStore,
    error::{ClientSnafu, DecodeSnafu, EncodeSnafu, RequestSnafu, Result, StoreError},
    types::{BulkOperation, BulkResponse, ItemFailure, ItemOutcome, WriteDescriptor},
};

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Options for the Elasticsearch store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElasticsearchOptions {
    /// The bulk action used for every document.
    pub operation: BulkOperation,
    /// Timeout applied to each bulk request. No timeout if `None`.
    pub request_timeout: Option<Duration>,
}

/// Writes documents to Elasticsearch with the `_bulk` API.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: reqwest::Client,
    bulk_url: String,
    operation: BulkOperation,
}

#[derive(Serialize)]
struct ActionTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
}

#[derive(Serialize)]
enum Action<'a> {
    #[serde(rename = "create")]
    Create(ActionTarget<'a>),
    #[serde(rename = "index")]
    Index(ActionTarget<'a>),
}

#[derive(Debug, Deserialize)]
struct RawBulkResponse {
    took: Option<u64>,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, RawBulkItem>>,
}

#[derive(Debug, Deserialize)]
struct RawBulkItem {
    status: Option<u16>,
    error: Option<RawItemError>,
}

#[derive(Debug, Deserialize)]
struct RawItemError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    reason: Option<String>,
}

impl ElasticsearchOptions {
    /// Change the bulk action.
    pub fn with_operation(mut self, operation: BulkOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Change the request timeout.
    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl ElasticsearchStore {
    /// Create a new store for the node at `node_url`, e.g. `http://localhost:9200`.
    pub fn new(node_url: impl AsRef<str>, options: ElasticsearchOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context(ClientSnafu {})?;

        let bulk_url = format!("{}/_bulk", node_url.as_ref().trim_end_matches('/'));

        Ok(Self {
            client,
            bulk_url,
            operation: options.operation,
        })
    }

    pub fn bulk_url(&self) -> &str {
        &self.bulk_url
    }
}

#[async_trait::async_trait]
impl BulkStore for ElasticsearchStore {
    async fn bulk(&self, operations: Vec<WriteDescriptor>) -> Result<BulkResponse> {
        let body = encode_bulk_body(self.operation, &operations)?;

        let response = self
            .client
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .context(RequestSnafu {})?;

        let status = response.status();
        let body = response.bytes().await.context(RequestSnafu {})?;

        if !status.is_success() {
            return Err(StoreError::Response {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        decode_bulk_response(&body)
    }
}

/// Encodes the descriptors as NDJSON: one action line followed by one source line per
/// document, each terminated by a newline.
pub fn encode_bulk_body(
    operation: BulkOperation,
    operations: &[WriteDescriptor],
) -> Result<Bytes> {
    let estimated_size = operations.iter().fold(0, |acc, op| {
        acc + op.payload.len() + WriteDescriptor::envelope_size(&op.destination) as usize
    });

    let mut writer = BytesMut::with_capacity(estimated_size).writer();
    for op in operations {
        let target = ActionTarget {
            index: &op.destination,
        };
        let action = match operation {
            BulkOperation::Create => Action::Create(target),
            BulkOperation::Index => Action::Index(target),
        };

        serde_json::to_writer(&mut writer, &action).context(EncodeSnafu {})?;

        let buffer = writer.get_mut();
        buffer.put_u8(b'\n');
        buffer.extend_from_slice(&op.payload);
        buffer.put_u8(b'\n');
    }

    Ok(writer.into_inner().freeze())
}

/// Decodes a `_bulk` response body.
pub fn decode_bulk_response(body: &[u8]) -> Result<BulkResponse> {
    let raw: RawBulkResponse = serde_json::from_slice(body).context(DecodeSnafu {})?;

    let items = raw
        .items
        .into_iter()
        .map(|item| {
            // Each item is keyed by its action name and has a single entry.
            let Some(result) = item.into_values().next() else {
                return ItemOutcome::Succeeded { status: None };
            };

            match result.error {
                Some(error) => ItemOutcome::Failed(ItemFailure {
                    error_type: error.error_type.unwrap_or_else(|| "unknown".to_string()),
                    reason: error.reason.unwrap_or_default(),
                    status: result.status,
                }),
                None => ItemOutcome::Succeeded {
                    status: result.status,
                },
            }
        })
        .collect();

    Ok(BulkResponse {
        took: raw.took.map(Duration::from_millis),
        errors: raw.errors,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(destination: &str, payload: &'static str) -> WriteDescriptor {
        WriteDescriptor::new(destination.into(), Bytes::from_static(payload.as_bytes()))
    }

    #[test]
    fn test_encode_create_body() {
        let body = encode_bulk_body(
            BulkOperation::Create,
            &[
                descriptor("logs-app", r#"{"message":"first"}"#),
                descriptor("traces-app", r#"{"message":"second"}"#),
            ],
        )
        .expect("encode");

        let expected = concat!(
            r#"{"create":{"_index":"logs-app"}}"#,
            "\n",
            r#"{"message":"first"}"#,
            "\n",
            r#"{"create":{"_index":"traces-app"}}"#,
            "\n",
            r#"{"message":"second"}"#,
            "\n",
        );
        assert_eq!(body, Bytes::from_static(expected.as_bytes()));
    }

    #[test]
    fn test_encode_index_body() {
        let body = encode_bulk_body(
            BulkOperation::Index,
            &[descriptor("metrics", r#"{"value":1}"#)],
        )
        .expect("encode");

        assert_eq!(
            body,
            Bytes::from_static(b"{\"index\":{\"_index\":\"metrics\"}}\n{\"value\":1}\n")
        );
    }

    #[test]
    fn test_envelope_size_matches_encoded_body() {
        let payload = r#"{"message":"hello"}"#;
        let body = encode_bulk_body(BulkOperation::Create, &[descriptor("logs-app", payload)])
            .expect("encode");

        assert_eq!(
            body.len() as u64,
            payload.len() as u64 + WriteDescriptor::envelope_size("logs-app")
        );
    }

    #[test]
    fn test_decode_successful_response() {
        let body = br#"{
            "took": 30,
            "errors": false,
            "items": [
                {"create": {"_index": "logs-app", "status": 201}},
                {"create": {"_index": "logs-app", "status": 201}}
            ]
        }"#;

        let response = decode_bulk_response(body).expect("decode");
        assert_eq!(response.took, Some(Duration::from_millis(30)));
        assert!(!response.has_errors());
        assert_eq!(
            response.items,
            vec![
                ItemOutcome::Succeeded { status: Some(201) },
                ItemOutcome::Succeeded { status: Some(201) },
            ]
        );
    }

    #[test]
    fn test_decode_partial_failure() {
        let body = br#"{
            "took": 12,
            "errors": true,
            "items": [
                {"create": {"_index": "logs-app", "status": 201}},
                {"create": {
                    "_index": "logs-app",
                    "status": 400,
                    "error": {
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse field [level]"
                    }
                }}
            ]
        }"#;

        let response = decode_bulk_response(body).expect("decode");
        assert!(response.has_errors());
        assert_eq!(response.failed_count(), 1);

        let failure = response.first_failure().expect("failure");
        assert_eq!(failure.error_type, "mapper_parsing_exception");
        assert_eq!(failure.reason, "failed to parse field [level]");
        assert_eq!(failure.status, Some(400));
    }

    #[test]
    fn test_decode_malformed_response() {
        let err = decode_bulk_response(b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn test_bulk_url_strips_trailing_slash() {
        let store = ElasticsearchStore::new("http://localhost:9200/", Default::default())
            .expect("store");
        assert_eq!(store.bulk_url(), "http://localhost:9200/_bulk");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_a_request_error() {
        let store = ElasticsearchStore::new(
            "http://127.0.0.1:9",
            ElasticsearchOptions::default().with_request_timeout(Some(Duration::from_secs(2))),
        )
        .expect("store");

        let err = store
            .bulk(vec![descriptor("logs-app", r#"{"message":"lost"}"#)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Request { .. }));
    }
}
