//! In-memory [`VectorStore`] implementation for tests.
//!
//! A `HashMap` behind `std::sync::RwLock`; query is brute-force cosine
//! similarity. Counts upserts so tests can assert the idempotency guarantee
//! (re-ingesting an unchanged knowledge base performs zero writes).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;

use super::{rank_by_similarity, IndexRecord, ScoredRecord, VectorStore};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, IndexRecord>>,
    upsert_count: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of upsert calls served, for idempotency assertions.
    pub fn upserts(&self) -> u64 {
        self.upsert_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, record: IndexRecord) -> Result<(), StoreError> {
        self.upsert_count.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .unwrap()
            .insert(record.fingerprint.clone(), record);
        Ok(())
    }

    async fn contains(&self, fingerprint: &str) -> Result<bool, StoreError> {
        Ok(self.records.read().unwrap().contains_key(fingerprint))
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>, StoreError> {
        let records: Vec<IndexRecord> = self.records.read().unwrap().values().cloned().collect();
        Ok(rank_by_similarity(records, vector, k))
    }

    async fn delete_by_key(&self, fingerprint: &str) -> Result<(), StoreError> {
        self.records.write().unwrap().remove(fingerprint);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.records.read().unwrap().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn keys_for_path(&self, source_path: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.source_path == source_path)
            .map(|r| r.fingerprint.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_paths(&self) -> Result<Vec<String>, StoreError> {
        let mut paths: Vec<String> = self
            .records
            .read()
            .unwrap()
            .values()
            .map(|r| r.source_path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    async fn stored_dims(&self) -> Result<Option<usize>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .values()
            .next()
            .map(|r| r.vector.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fp: &str, path: &str, vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            fingerprint: fp.to_string(),
            source_path: path.to_string(),
            heading_path: vec!["H".to_string()],
            enriched_text: format!("text for {}", fp),
            document_summary: String::new(),
            mode: "none".to_string(),
            vector,
            written_at: 0,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let store = MemoryStore::new();
        store.upsert(record("a", "x.md", vec![1.0])).await.unwrap();

        assert!(store.contains("a").await.unwrap());
        assert!(!store.contains("b").await.unwrap());
        assert_eq!(store.upserts(), 1);
    }

    #[tokio::test]
    async fn test_same_key_replaces() {
        let store = MemoryStore::new();
        store.upsert(record("a", "x.md", vec![1.0])).await.unwrap();
        store.upsert(record("a", "x.md", vec![2.0])).await.unwrap();

        assert_eq!(store.list_keys().await.unwrap(), vec!["a"]);
        assert_eq!(store.stored_dims().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_keys_for_path_and_delete() {
        let store = MemoryStore::new();
        store.upsert(record("a", "x.md", vec![1.0])).await.unwrap();
        store.upsert(record("b", "x.md", vec![1.0])).await.unwrap();
        store.upsert(record("c", "y.md", vec![1.0])).await.unwrap();

        assert_eq!(store.keys_for_path("x.md").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_paths().await.unwrap(), vec!["x.md", "y.md"]);

        store.delete_by_key("a").await.unwrap();
        assert_eq!(store.keys_for_path("x.md").await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_query_ranks_nearest_first() {
        let store = MemoryStore::new();
        store
            .upsert(record("near", "x.md", vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(record("far", "x.md", vec![0.0, 1.0]))
            .await
            .unwrap();

        let results = store.query(&[0.9, 0.1], 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.fingerprint, "near");
    }

    #[tokio::test]
    async fn test_empty_store_has_no_dims() {
        let store = MemoryStore::new();
        assert_eq!(store.stored_dims().await.unwrap(), None);
    }
}
