//! # Lorehouse CLI (`lore`)
//!
//! The `lore` binary drives the chunking and enrichment pipeline: database
//! initialization, knowledge-base ingestion, semantic search, and index
//! maintenance.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore init` | Create the SQLite index and run schema migrations |
//! | `lore ingest` | Scan, chunk, enrich, embed, and index the knowledge base |
//! | `lore search "<query>"` | Rank indexed chunks against a query |
//! | `lore clean` | Drop records whose source document no longer exists |
//! | `lore delete <path>` | Drop every record for one source path |
//! | `lore keys` | List stored fingerprints |

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lorehouse::model::OllamaClient;
use lorehouse::store::sqlite::SqliteStore;
use lorehouse::store::VectorStore;
use lorehouse::{config, ingest, maintenance, retrieve};

/// Lorehouse — context-aware chunking and enrichment for personal
/// knowledge bases.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lore.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Context-aware chunking and enrichment for personal knowledge bases",
    version,
    long_about = "Lorehouse ingests a markdown knowledge base, splits documents into \
    heading-aware chunks, enriches each chunk with model-generated context, embeds the result, \
    and serves semantic search over the index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database.
    ///
    /// Creates the SQLite file and the collection table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Ingest the knowledge base.
    ///
    /// Scans the configured root, chunks every matching document, enriches
    /// and embeds chunks not yet in the index, and removes records for
    /// chunks that no longer exist. Unchanged content is skipped without
    /// any model calls.
    Ingest {
        /// Show document and chunk counts without calling models or writing.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of documents to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Search the index.
    ///
    /// Embeds the query and prints the most similar chunks, nearest first.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Remove records whose source document no longer exists on disk.
    Clean,

    /// Remove every record indexed under one source path.
    Delete {
        /// Source path relative to the knowledge-base root.
        path: String,
    },

    /// List stored chunk fingerprints.
    Keys,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let store = SqliteStore::connect(&cfg.store).await?;

    match cli.command {
        Commands::Init => {
            // Connecting already runs migrations.
            println!("Index initialized at {}", cfg.store.path.display());
        }
        Commands::Ingest { dry_run, limit } => {
            if dry_run {
                let plan = ingest::plan_ingest(&cfg, limit)?;
                println!(
                    "Would process {} documents ({} chunks).",
                    plan.documents, plan.chunks
                );
            } else {
                let store: Arc<dyn VectorStore> = Arc::new(store);
                let model = Arc::new(OllamaClient::new(&cfg.models)?);
                let report = ingest::run_ingest(&cfg, store, model, limit).await?;

                println!(
                    "Documents: {} processed, {} skipped, {} failed",
                    report.documents_processed, report.documents_skipped, report.documents_failed
                );
                println!(
                    "Chunks: {} written, {} up to date, {} failed",
                    report.chunks_written, report.chunks_skipped, report.chunks_failed
                );
                if report.stale_records_deleted > 0 {
                    println!("Removed {} stale records.", report.stale_records_deleted);
                }
                if report.documents_failed > 0 || report.chunks_failed > 0 {
                    std::process::exit(1);
                }
            }
        }
        Commands::Search { query, k } => {
            let model = Arc::new(OllamaClient::new(&cfg.models)?);
            let k = k.unwrap_or(cfg.retrieval.top_k);
            let results = retrieve::search(&store, model, &query, k).await?;

            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                let heading = if result.record.heading_path.is_empty() {
                    "(preamble)".to_string()
                } else {
                    result.record.heading_path.join(" > ")
                };
                println!(
                    "{}. [{:.4}] {} — {}",
                    i + 1,
                    result.score,
                    result.record.source_path,
                    heading
                );
                println!("{}\n", result.record.enriched_text);
            }
        }
        Commands::Clean => {
            let report = maintenance::clean(&store, &cfg.ingest.root).await?;
            println!(
                "Removed {} records across {} missing documents.",
                report.records_deleted, report.paths_removed
            );
        }
        Commands::Delete { path } => {
            let deleted = maintenance::delete_path(&store, &path).await?;
            println!("Removed {} records for {}.", deleted, path);
        }
        Commands::Keys => {
            for key in store.list_keys().await? {
                println!("{}", key);
            }
        }
    }

    Ok(())
}
