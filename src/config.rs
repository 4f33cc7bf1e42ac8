//! TOML configuration parsing and validation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::identity::AuthorIdentity;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub models: ModelsConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Optional author identity for first-person disambiguation.
    #[serde(default)]
    pub author: Option<AuthorIdentity>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "lore_chunks".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub completion_model: String,
    pub embedding_model: String,
    /// Dimensionality the embedding model produces.
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Root of the knowledge-base directory tree.
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Documents processed concurrently.
    #[serde(default = "default_max_concurrent_documents")]
    pub max_concurrent_documents: usize,
    /// Outbound model calls in flight at once, across all documents.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}
fn default_max_concurrent_documents() -> usize {
    4
}
fn default_max_concurrent_requests() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.models.dims == 0 {
        anyhow::bail!("models.dims must be > 0");
    }
    if config.models.completion_model.is_empty() || config.models.embedding_model.is_empty() {
        anyhow::bail!("models.completion_model and models.embedding_model must be set");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.ingest.max_concurrent_documents == 0 || config.ingest.max_concurrent_requests == 0 {
        anyhow::bail!("ingest concurrency limits must be > 0");
    }

    if !is_valid_collection_name(&config.store.collection) {
        anyhow::bail!(
            "store.collection must be a plain identifier, got '{}'",
            config.store.collection
        );
    }

    // An incomplete identity is a configuration error, not a silent no-op.
    if let Some(ref author) = config.author {
        if author.name.is_empty()
            || author.full_name.is_empty()
            || author.pronoun_subject.is_empty()
            || author.pronoun_object.is_empty()
            || author.path_prefix.is_empty()
        {
            anyhow::bail!(
                "author identity requires name, full_name, both pronoun forms, and path_prefix"
            );
        }
    }

    Ok(config)
}

/// Collection names are spliced into SQL, so restrict them to identifiers.
fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
