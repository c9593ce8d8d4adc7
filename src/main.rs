mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use memoria::config::MemoriaConfig;

#[derive(Parser)]
#[command(name = "memoria", version, about = "Retrieval-augmented chat backend with long-term memory")]
struct Cli {
    /// Config file (defaults to ~/.memoria/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Chunk files line by line and add them to the knowledge store
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Maximum characters per chunk
        #[arg(long, default_value_t = 1000)]
        max_chars: usize,
    },
    /// Run retrieval for a query
    Search { query: String },
    /// Show a user's summary and recent messages
    History { user_id: String },
    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => MemoriaConfig::load_from(path)?,
        None => MemoriaConfig::load()?,
    };

    // Logs go to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => memoria::server::serve(config).await?,
        Command::Ingest { files, max_chars } => {
            cli::ingest::ingest(&config, &files, max_chars).await?
        }
        Command::Search { query } => cli::search::search(&config, &query).await?,
        Command::History { user_id } => cli::history::history(&config, &user_id)?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}
