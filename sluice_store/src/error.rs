use snafu::Snafu;

/// Errors returned when a bulk call fails as a whole.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Failed to build store client"))]
    Client { source: reqwest::Error },
    #[snafu(display("Bulk request error"))]
    Request { source: reqwest::Error },
    #[snafu(display("Bulk response error: status={status}, message={message}"))]
    Response { status: u16, message: String },
    #[snafu(display("Failed to decode bulk response"))]
    Decode { source: serde_json::Error },
    #[snafu(display("Failed to encode bulk request"))]
    Encode { source: serde_json::Error },
    #[snafu(display("Store unavailable"))]
    Unavailable,
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
