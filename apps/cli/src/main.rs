//! Lead magnet generator CLI.
//!
//! Turns a topic into a researched, multi-chapter Markdown document using a
//! language model and web search.

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
