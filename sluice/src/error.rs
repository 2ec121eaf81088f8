use sluice_indexer_core::IndexerError;
use sluice_observability::ObservabilityError;
use sluice_store::StoreError;
use snafu::Snafu;

use crate::helpers::RangeParserError;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
    #[snafu(display("Failed to create store"))]
    Store { source: StoreError },
    #[snafu(display("Indexer error"))]
    Indexer { source: IndexerError },
    #[snafu(display("Indexer task failed"))]
    IndexerTask { source: tokio::task::JoinError },
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("Invalid range format"))]
    InvalidRange { source: RangeParserError },
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
