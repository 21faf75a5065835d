//! SignalWatch CLI: drug and device news signals for a tracked watchlist.
//!
//! Scans search feeds and watchlist pages for new items, collects news into
//! a long-lived dataset, and maintains weekly digests and item cards.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
