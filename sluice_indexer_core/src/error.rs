use snafu::Snafu;

/// Indexer error types.
///
/// These are only returned by the fallible enqueue methods of the client. Errors that
/// happen while flushing are logged and never reach the caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IndexerError {
    /// Validation error.
    ///
    /// The record cannot be buffered as provided.
    #[snafu(display("validation error: {message}"))]
    Validation { message: String },
    /// The record could not be serialized.
    #[snafu(display("failed to serialize record for {destination}"))]
    Serialization {
        destination: String,
        source: serde_json::Error,
    },
    /// The background indexer is no longer accepting records.
    #[snafu(display("indexer closed"))]
    IndexerClosed,
}

pub type Result<T, E = IndexerError> = std::result::Result<T, E>;
