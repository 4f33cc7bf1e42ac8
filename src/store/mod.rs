//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only interface the pipeline has to
//! persisted state — the store is the single source of truth for what has
//! already been ingested; there is no local ledger. Records are keyed by
//! chunk fingerprint, which makes the upsert idempotent and re-ingestion of
//! an unchanged knowledge base a cheap no-op.
//!
//! Implementations must be `Send + Sync`. Concurrent upserts to distinct
//! fingerprints need no coordination; a concurrent upsert to the *same*
//! fingerprint resolves last-write-wins.
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB encoding

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;

/// The persisted unit: one enriched chunk with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// Content fingerprint — the primary key.
    pub fingerprint: String,
    pub source_path: String,
    pub heading_path: Vec<String>,
    pub enriched_text: String,
    pub document_summary: String,
    /// Disambiguation mode applied: `none` or `author-first-person-rewrite`.
    pub mode: String,
    pub vector: Vec<f32>,
    /// Unix timestamp of the write; used for recency tie-breaking.
    pub written_at: i64,
}

/// A record with its similarity score, as returned by a query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: IndexRecord,
    pub score: f32,
}

/// Storage capability consumed by the index writer and retriever.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the record for its fingerprint (last-write-wins).
    async fn upsert(&self, record: IndexRecord) -> Result<(), StoreError>;

    /// Whether a record with this fingerprint already exists.
    async fn contains(&self, fingerprint: &str) -> Result<bool, StoreError>;

    /// Top-`k` records by cosine similarity to `vector`, ties broken by most
    /// recent `written_at` first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Delete the record with this fingerprint, if present.
    async fn delete_by_key(&self, fingerprint: &str) -> Result<(), StoreError>;

    /// All stored fingerprints.
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Fingerprints of records belonging to one source path.
    async fn keys_for_path(&self, source_path: &str) -> Result<Vec<String>, StoreError>;

    /// Distinct source paths with at least one record.
    async fn list_paths(&self) -> Result<Vec<String>, StoreError>;

    /// Dimensionality of stored vectors, or `None` when the store is empty.
    async fn stored_dims(&self) -> Result<Option<usize>, StoreError>;
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Rank records by similarity to `query`, most similar first, ties broken by
/// most recent write. Shared by the in-memory and SQLite backends.
pub(crate) fn rank_by_similarity(
    records: impl IntoIterator<Item = IndexRecord>,
    query: &[f32],
    k: usize,
) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .into_iter()
        .map(|record| ScoredRecord {
            score: cosine_similarity(query, &record.vector),
            record,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.record.written_at.cmp(&a.record.written_at))
    });
    scored.truncate(k);
    scored
}
