//! ansa-news CLI
//!
//! Latest ANSA headlines, extracted from the rendered front page.

use ansa_news::fetch::{run_fetch, FetchArgs};
use ansa_news::server::{run_serve, ServeArgs};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ansa-news")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "ANSA front-page headlines via headless Chrome")]
#[command(long_about = "Renders https://www.ansa.it in headless Chrome and extracts the latest headlines.\n\nCommands:\n  serve   JSON API with /health and /news\n  fetch   Print the latest headlines once")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON API
    Serve(ServeArgs),
    /// Fetch the latest headlines once and print them
    Fetch(FetchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Fetch(args) => run_fetch(args).await,
    }
}
