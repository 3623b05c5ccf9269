//! SheetSync CLI — incremental spreadsheet → JSON record sync.
//!
//! Pulls the published CSV export, appends records for rows not yet in the
//! local store, and downloads their audio and image assets.

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
