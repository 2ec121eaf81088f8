use clap::{Parser, Subcommand};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    error::{ObservabilitySnafu, Result},
    ingest::IngestArgs,
    stress::StressArgs,
};

mod args;
mod error;
mod generators;
mod helpers;
mod ingest;
mod stress;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Bulk indexing of newline-delimited JSON records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index newline-delimited JSON records read from stdin
    Ingest {
        #[clap(flatten)]
        inner: IngestArgs,
    },
    /// Index synthetic log records at a fixed rate
    Stress {
        #[clap(flatten)]
        inner: StressArgs,
    },
}

#[tokio::main]
#[snafu::report]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let observability = sluice_observability::init_observability(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
    .context(ObservabilitySnafu {})?;

    let ct = CancellationToken::new();

    tokio::spawn({
        let ct = ct.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received interrupt, shutting down");
            ct.cancel();
        }
    });

    let result = match cli.command {
        Commands::Ingest { inner } => inner.run(ct).await,
        Commands::Stress { inner } => inner.run(ct).await,
    };

    observability.shutdown().context(ObservabilitySnafu {})?;

    result
}
