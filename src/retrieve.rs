//! Query-time retrieval.
//!
//! Embeds the query with the same embedding model used at ingestion and
//! ranks stored records by cosine similarity.

use std::sync::Arc;

use anyhow::Result;

use crate::model::LanguageModel;
use crate::store::{ScoredRecord, VectorStore};

/// Return the `k` most similar records to `query`, nearest first.
pub async fn search(
    store: &dyn VectorStore,
    model: Arc<dyn LanguageModel>,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredRecord>> {
    let vector = model.embed(query).await?;
    let results = store.query(&vector, k).await?;
    Ok(results)
}
