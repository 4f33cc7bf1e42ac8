//! SQLite-backed [`VectorStore`].
//!
//! One table per collection, keyed by fingerprint, with vectors stored as
//! little-endian f32 BLOBs. Queries are brute-force cosine similarity over
//! the collection — adequate for knowledge bases in the tens of thousands
//! of chunks. WAL mode keeps concurrent upserts from distinct ingestion
//! tasks safe; same-key races resolve via `ON CONFLICT ... DO UPDATE`
//! (last-write-wins).

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::config::StoreConfig;
use crate::error::StoreError;

use super::{blob_to_vec, rank_by_similarity, vec_to_blob, IndexRecord, ScoredRecord, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteStore {
    /// Open (creating if missing) the database and run migrations.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path.display()))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            table: config.collection.clone(),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                fingerprint TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                heading_path TEXT NOT NULL,
                enriched_text TEXT NOT NULL,
                document_summary TEXT NOT NULL DEFAULT '',
                mode TEXT NOT NULL,
                vector BLOB NOT NULL,
                written_at INTEGER NOT NULL
            )
            "#,
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_source_path ON {table}(source_path)",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> IndexRecord {
        let heading_path: Vec<String> =
            serde_json::from_str(row.get::<String, _>("heading_path").as_str())
                .unwrap_or_default();
        let blob: Vec<u8> = row.get("vector");

        IndexRecord {
            fingerprint: row.get("fingerprint"),
            source_path: row.get("source_path"),
            heading_path,
            enriched_text: row.get("enriched_text"),
            document_summary: row.get("document_summary"),
            mode: row.get("mode"),
            vector: blob_to_vec(&blob),
            written_at: row.get("written_at"),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, record: IndexRecord) -> Result<(), StoreError> {
        let heading_path = serde_json::to_string(&record.heading_path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let blob = vec_to_blob(&record.vector);

        sqlx::query(&format!(
            r#"
            INSERT INTO {table}
                (fingerprint, source_path, heading_path, enriched_text,
                 document_summary, mode, vector, written_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fingerprint) DO UPDATE SET
                source_path = excluded.source_path,
                heading_path = excluded.heading_path,
                enriched_text = excluded.enriched_text,
                document_summary = excluded.document_summary,
                mode = excluded.mode,
                vector = excluded.vector,
                written_at = excluded.written_at
            "#,
            table = self.table
        ))
        .bind(&record.fingerprint)
        .bind(&record.source_path)
        .bind(&heading_path)
        .bind(&record.enriched_text)
        .bind(&record.document_summary)
        .bind(&record.mode)
        .bind(&blob)
        .bind(record.written_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn contains(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE fingerprint = ?",
            table = self.table
        ))
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>, StoreError> {
        let rows = sqlx::query(&format!("SELECT * FROM {table}", table = self.table))
            .fetch_all(&self.pool)
            .await?;

        let records = rows.iter().map(Self::row_to_record);
        Ok(rank_by_similarity(records, vector, k))
    }

    async fn delete_by_key(&self, fingerprint: &str) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "DELETE FROM {table} WHERE fingerprint = ?",
            table = self.table
        ))
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let keys = sqlx::query_scalar(&format!(
            "SELECT fingerprint FROM {table} ORDER BY fingerprint",
            table = self.table
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn keys_for_path(&self, source_path: &str) -> Result<Vec<String>, StoreError> {
        let keys = sqlx::query_scalar(&format!(
            "SELECT fingerprint FROM {table} WHERE source_path = ? ORDER BY fingerprint",
            table = self.table
        ))
        .bind(source_path)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn list_paths(&self) -> Result<Vec<String>, StoreError> {
        let paths = sqlx::query_scalar(&format!(
            "SELECT DISTINCT source_path FROM {table} ORDER BY source_path",
            table = self.table
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(paths)
    }

    async fn stored_dims(&self) -> Result<Option<usize>, StoreError> {
        let len: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT length(vector) FROM {table} LIMIT 1",
            table = self.table
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(len.map(|l| (l / 4) as usize))
    }
}
