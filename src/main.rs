//! # Benefit Scout CLI (`bscout`)
//!
//! The `bscout` binary drives the crawl-and-retrieval pipeline. It provides
//! commands for index creation, crawling, batch indexing, querying, and
//! grounded recommendations.
//!
//! ## Usage
//!
//! ```bash
//! bscout --config ./config/bscout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bscout init` | Create the vector index if it does not exist |
//! | `bscout crawl <url>` | Run the bounded crawl and report what it finds |
//! | `bscout index [<url>...]` | Crawl, embed, and upsert into the index |
//! | `bscout query "<text>"` | Print the top-k matching passages |
//! | `bscout recommend "<profile>"` | Print a grounded recommendation |

mod completion;
mod config;
mod crawl;
mod embedding;
mod extract;
mod fetch;
mod index;
mod links;
mod models;
mod normalize;
mod pipeline;
mod recommend;
mod retrieve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Benefit Scout — a crawl, embedding, and retrieval pipeline for grounding
/// benefit recommendations in government website content.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bscout.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bscout",
    about = "Benefit Scout — crawl government sites and retrieve grounded benefit passages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bscout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the vector index if it does not exist.
    ///
    /// Idempotent — running it multiple times is safe. The index name,
    /// dimension, and metric come from the config and never change after
    /// creation.
    Init,

    /// Run the bounded crawl from a start URL and report what it finds.
    ///
    /// Writes nothing; useful for checking depth and visited-cap settings
    /// against a site before indexing it.
    Crawl {
        /// The URL to start from.
        url: String,
    },

    /// Crawl seed URLs, embed the collected text, and upsert it.
    ///
    /// Seeds given on the command line override `crawl.seeds` from the
    /// config. The visited cap and deduplication span all seeds of one run.
    Index {
        /// Seed URLs to crawl. Falls back to `crawl.seeds` when empty.
        urls: Vec<String>,
    },

    /// Print the passages closest to a free-text query.
    Query {
        /// The query text.
        query: String,

        /// Maximum number of passages to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print a grounded benefit recommendation for a user profile.
    Recommend {
        /// Free-text description of the user.
        profile: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bscout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => pipeline::run_init(&config).await,
        Commands::Crawl { url } => pipeline::run_crawl(&config, &url).await,
        Commands::Index { urls } => pipeline::run_index(&config, &urls).await,
        Commands::Query { query, top_k } => retrieve::run_query(&config, &query, top_k).await,
        Commands::Recommend { profile } => recommend::run_recommend(&config, &profile).await,
    }
}
