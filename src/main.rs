//! # Counsel RAG CLI (`counsel-rag`)
//!
//! Operator interface for the counseling knowledge retriever: build the
//! vector index, try queries, inspect the context block a prompt would
//! receive, and check which retrieval mode is live.
//!
//! ## Usage
//!
//! ```bash
//! counsel-rag --config ./config/counsel-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `counsel-rag init` | Load the model, create and populate the vector index |
//! | `counsel-rag search "<query>"` | Retrieve topics for a message |
//! | `counsel-rag context "<query>"` | Print the prompt context block |
//! | `counsel-rag add --topic T --content C` | Add a topic and search it in-process |
//! | `counsel-rag reindex` | Rebuild the vector collection from the corpus file |
//! | `counsel-rag stats` | Corpus, index, and mode summary |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use counsel_rag::config::{self, Config};
use counsel_rag::rag::RagSystem;
use counsel_rag::{search, stats};

/// Counsel RAG: knowledge retrieval for an emotional-counseling chat
/// service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/counsel-rag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "counsel-rag",
    about = "Counsel RAG — knowledge retrieval for an emotional-counseling chat service",
    version,
    long_about = "Counsel RAG retrieves knowledge-base topics relevant to a user message, \
    using a local multilingual embedding model and a persisted vector index, and falls back \
    to keyword matching whenever vector search is unavailable."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/counsel-rag.toml`. When the file does not
    /// exist the built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/counsel-rag.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Load the embedding model and build the vector index.
    ///
    /// The index is populated only when its collection does not exist yet;
    /// use `reindex` to rebuild an existing one. Idempotent.
    Init,

    /// Retrieve the topics most relevant to a message.
    Search {
        /// The user message.
        query: String,

        /// Number of topics to return (default: `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Bypass the retrieval cache.
        #[arg(long)]
        no_cache: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the context block that would be prepended to the prompt.
    Context {
        /// The user message.
        query: String,

        /// Number of topics to include (default: `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Add a topic to the in-memory corpus and show it is retrievable.
    ///
    /// The corpus file is not modified. In vector mode the topic's content
    /// is indexed persistently; its examples are not.
    Add {
        /// Topic id.
        #[arg(long)]
        topic: String,

        /// Topic content.
        #[arg(long)]
        content: String,

        /// Keyword for fallback matching (repeatable).
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Example message (repeatable).
        #[arg(long = "example")]
        examples: Vec<String>,
    },

    /// Drop the vector collection and re-ingest the corpus file.
    Reindex,

    /// Show corpus, index, and retrieval-mode statistics.
    Stats,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "counsel_rag=debug,counsel_rag_core=debug"
    } else {
        "counsel_rag=info,counsel_rag_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = read_config(&cli.config)?;
    let rag = RagSystem::new(&cfg).await;

    match cli.command {
        Commands::Init => {
            println!("Knowledge index ready.");
            stats::run_stats(&cfg, &rag).await?;
        }
        Commands::Search {
            query,
            top_k,
            no_cache,
            json,
        } => {
            search::run_search(&rag, &query, top_k, !no_cache, json).await?;
        }
        Commands::Context { query, top_k } => {
            search::run_context(&rag, &query, top_k).await?;
        }
        Commands::Add {
            topic,
            content,
            keywords,
            examples,
        } => {
            let probe = keywords.first().cloned().unwrap_or_else(|| content.clone());
            rag.add_document(&topic, &content, keywords, examples)
                .await
                .with_context(|| format!("Failed to add topic '{}'", topic))?;
            println!("Added topic '{}'.", topic);
            println!();
            search::run_search(&rag, &probe, None, false, false).await?;
        }
        Commands::Reindex => {
            let written = rag.reindex().await.context("Reindex failed")?;
            println!("Reindexed {} documents.", written);
            stats::run_stats(&cfg, &rag).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg, &rag).await?;
        }
    }

    Ok(())
}
