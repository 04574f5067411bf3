mod cli;
mod content;
mod engine;
mod error;
mod event_log;
mod model;
mod orchestrator;
mod records;
mod storage;
#[cfg(test)]
mod testing;
mod text_summary;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let default_filter = if args.verbose {
        "stockbot_monitor=debug"
    } else {
        "stockbot_monitor=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run(args).await
}
