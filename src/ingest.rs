//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow per document: read → parse → chunk → identity
//! resolution → enrichment → embedding → idempotent index write. Documents
//! are independent units of work and run concurrently up to a configured
//! limit; within a document, each chunk's enrich/embed/write pipeline runs
//! concurrently too, bounded by a shared outbound-call limiter.
//!
//! Failure isolation: a chunk whose model calls exhaust their retries is
//! skipped and reported, never fatal to siblings; an unreadable document is
//! skipped; a persistent store failure fails only its document. The single
//! fatal condition is an embedding dimensionality mismatch against existing
//! store contents, surfaced before any write.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::chunker::{self, Chunk};
use crate::config::Config;
use crate::enrich::Enricher;
use crate::error::StoreError;
use crate::identity::{self, DisambiguationMode};
use crate::model::LanguageModel;
use crate::parser;
use crate::scan;
use crate::store::{IndexRecord, VectorStore};

/// Transient store failures are retried at the upsert granularity.
const UPSERT_ATTEMPTS: u32 = 3;

/// Outcome counts for one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents_processed: u64,
    pub documents_skipped: u64,
    pub documents_failed: u64,
    pub chunks_written: u64,
    pub chunks_skipped: u64,
    pub chunks_failed: u64,
    pub stale_records_deleted: u64,
}

/// What a dry run would do, without touching models or the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPlan {
    pub documents: usize,
    pub chunks: usize,
}

enum DocStatus {
    Processed,
    Skipped,
    Failed,
}

struct DocOutcome {
    status: DocStatus,
    chunks_written: u64,
    chunks_skipped: u64,
    chunks_failed: u64,
    stale_deleted: u64,
}

impl DocOutcome {
    fn skipped() -> Self {
        Self {
            status: DocStatus::Skipped,
            chunks_written: 0,
            chunks_skipped: 0,
            chunks_failed: 0,
            stale_deleted: 0,
        }
    }

    fn failed() -> Self {
        Self {
            status: DocStatus::Failed,
            ..Self::skipped()
        }
    }
}

enum ChunkOutcome {
    Written,
    ModelFailed,
    StoreFailed,
}

/// Count documents and chunks without any model or store calls.
///
/// Applies the same skip rules as a real run (unreadable, near-empty, and
/// chunkless documents are excluded), so the counts match what ingestion
/// would actually process.
pub fn plan_ingest(config: &Config, limit: Option<usize>) -> Result<IngestPlan> {
    let mut paths = scan::scan_knowledge_base(&config.ingest)?;
    if let Some(lim) = limit {
        paths.truncate(lim);
    }

    let mut documents = 0;
    let mut chunks = 0;
    for source_path in &paths {
        let content = match scan::read_document(&config.ingest.root, source_path) {
            Some(content) => content,
            None => continue,
        };
        if content.trim().len() <= 5 {
            continue;
        }
        let root = parser::parse(&content);
        let count = chunker::chunk_document(source_path, &root, config.chunking.max_chars).len();
        if count == 0 {
            continue;
        }
        documents += 1;
        chunks += count;
    }

    Ok(IngestPlan { documents, chunks })
}

/// Ingest the whole knowledge base.
pub async fn run_ingest(
    config: &Config,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn LanguageModel>,
    limit: Option<usize>,
) -> Result<IngestReport> {
    let mut paths = scan::scan_knowledge_base(&config.ingest)?;
    if let Some(lim) = limit {
        paths.truncate(lim);
    }
    run_ingest_paths(config, store, model, paths).await
}

/// Ingest a specific list of documents (paths relative to the root).
pub async fn run_ingest_paths(
    config: &Config,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn LanguageModel>,
    paths: Vec<String>,
) -> Result<IngestReport> {
    // Dimensionality preflight: fatal before any write.
    if let Some(stored) = store.stored_dims().await? {
        if stored != model.embedding_dims() {
            return Err(StoreError::SchemaMismatch {
                stored,
                configured: model.embedding_dims(),
            }
            .into());
        }
    }

    let config = Arc::new(config.clone());
    let enricher = Enricher::new(model.clone(), config.author.clone());
    let doc_limit = Arc::new(Semaphore::new(config.ingest.max_concurrent_documents));
    let call_limit = Arc::new(Semaphore::new(config.ingest.max_concurrent_requests));

    let mut tasks = JoinSet::new();
    for source_path in paths {
        let config = config.clone();
        let store = store.clone();
        let model = model.clone();
        let enricher = enricher.clone();
        let doc_limit = doc_limit.clone();
        let call_limit = call_limit.clone();

        tasks.spawn(async move {
            let _permit = match doc_limit.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return DocOutcome::failed(),
            };
            ingest_document(&config, store, model, enricher, call_limit, &source_path).await
        });
    }

    let mut report = IngestReport::default();
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("document task panicked: {}", e);
                report.documents_failed += 1;
                continue;
            }
        };
        match outcome.status {
            DocStatus::Processed => report.documents_processed += 1,
            DocStatus::Skipped => report.documents_skipped += 1,
            DocStatus::Failed => report.documents_failed += 1,
        }
        report.chunks_written += outcome.chunks_written;
        report.chunks_skipped += outcome.chunks_skipped;
        report.chunks_failed += outcome.chunks_failed;
        report.stale_records_deleted += outcome.stale_deleted;
    }

    Ok(report)
}

async fn ingest_document(
    config: &Config,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn LanguageModel>,
    enricher: Enricher,
    call_limit: Arc<Semaphore>,
    source_path: &str,
) -> DocOutcome {
    let content = match scan::read_document(&config.ingest.root, source_path) {
        Some(content) => content,
        None => return DocOutcome::skipped(),
    };
    // Nothing retrievable in a near-empty file.
    if content.trim().len() <= 5 {
        return DocOutcome::skipped();
    }

    let root = parser::parse(&content);
    let chunks = chunker::chunk_document(source_path, &root, config.chunking.max_chars);
    if chunks.is_empty() {
        return DocOutcome::skipped();
    }

    let mode = identity::resolve(config.author.as_ref(), source_path);

    // Reconcile: drop records for chunks that no longer exist in this
    // document, then skip chunks whose fingerprints are already stored.
    let fresh: HashSet<&str> = chunks.iter().map(|c| c.fingerprint.as_str()).collect();
    let existing = match store.keys_for_path(source_path).await {
        Ok(keys) => keys,
        Err(e) => {
            error!("{}: could not list existing records: {}", source_path, e);
            return DocOutcome::failed();
        }
    };

    let mut stale_deleted = 0;
    for key in &existing {
        if !fresh.contains(key.as_str()) {
            if let Err(e) = store.delete_by_key(key).await {
                error!("{}: could not delete stale record: {}", source_path, e);
                return DocOutcome::failed();
            }
            stale_deleted += 1;
        }
    }

    let mut to_process: Vec<Chunk> = Vec::new();
    let mut chunks_skipped = 0u64;
    for chunk in &chunks {
        match store.contains(&chunk.fingerprint).await {
            Ok(true) => chunks_skipped += 1,
            Ok(false) => to_process.push(chunk.clone()),
            Err(e) => {
                error!("{}: could not check index for chunk: {}", source_path, e);
                return DocOutcome {
                    status: DocStatus::Failed,
                    chunks_written: 0,
                    chunks_skipped: 0,
                    chunks_failed: 0,
                    stale_deleted,
                };
            }
        }
    }

    if to_process.is_empty() {
        debug!("{}: all {} chunks up to date", source_path, chunks.len());
        return DocOutcome {
            status: DocStatus::Processed,
            chunks_written: 0,
            chunks_skipped,
            chunks_failed: 0,
            stale_deleted,
        };
    }

    // One document-level summary grounds every chunk of this pass.
    let document_summary = {
        let _permit = call_limit.acquire().await;
        match enricher.document_summary(&chunks, mode).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("{}: document summary failed: {}", source_path, e);
                return DocOutcome::failed();
            }
        }
    };

    let mut tasks = JoinSet::new();
    for chunk in to_process {
        let store = store.clone();
        let model = model.clone();
        let enricher = enricher.clone();
        let call_limit = call_limit.clone();
        let document_summary = document_summary.clone();

        tasks.spawn(async move {
            process_chunk(store, model, enricher, call_limit, chunk, document_summary, mode).await
        });
    }

    let mut outcome = DocOutcome {
        status: DocStatus::Processed,
        chunks_written: 0,
        chunks_skipped,
        chunks_failed: 0,
        stale_deleted,
    };
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(ChunkOutcome::Written) => outcome.chunks_written += 1,
            Ok(ChunkOutcome::ModelFailed) => outcome.chunks_failed += 1,
            Ok(ChunkOutcome::StoreFailed) => {
                outcome.chunks_failed += 1;
                outcome.status = DocStatus::Failed;
            }
            Err(e) => {
                error!("{}: chunk task panicked: {}", source_path, e);
                outcome.chunks_failed += 1;
            }
        }
    }

    outcome
}

async fn process_chunk(
    store: Arc<dyn VectorStore>,
    model: Arc<dyn LanguageModel>,
    enricher: Enricher,
    call_limit: Arc<Semaphore>,
    chunk: Chunk,
    document_summary: Option<String>,
    mode: DisambiguationMode,
) -> ChunkOutcome {
    let enriched = {
        let _permit = call_limit.acquire().await;
        match enricher.enrich(&chunk, document_summary.as_deref(), mode).await {
            Ok(enriched) => enriched,
            Err(e) => {
                warn!("{}: enrichment skipped: {}", chunk.source_path, e);
                return ChunkOutcome::ModelFailed;
            }
        }
    };

    let vector = {
        let _permit = call_limit.acquire().await;
        match model.embed(&enriched.enriched_text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("{}: embedding skipped: {}", chunk.source_path, e);
                return ChunkOutcome::ModelFailed;
            }
        }
    };

    let record = IndexRecord {
        fingerprint: chunk.fingerprint.clone(),
        source_path: chunk.source_path.clone(),
        heading_path: chunk.heading_path.clone(),
        enriched_text: enriched.enriched_text,
        document_summary: document_summary.unwrap_or_default(),
        mode: mode.as_str().to_string(),
        vector,
        written_at: chrono::Utc::now().timestamp(),
    };

    match upsert_with_retry(store.as_ref(), record).await {
        Ok(()) => ChunkOutcome::Written,
        Err(e) => {
            error!("{}: index write failed: {}", chunk.source_path, e);
            ChunkOutcome::StoreFailed
        }
    }
}

async fn upsert_with_retry(store: &dyn VectorStore, record: IndexRecord) -> Result<(), StoreError> {
    let mut last_err = None;
    for attempt in 0..UPSERT_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(250 << attempt)).await;
        }
        match store.upsert(record.clone()).await {
            Ok(()) => return Ok(()),
            Err(e @ StoreError::SchemaMismatch { .. }) => return Err(e),
            Err(e) => {
                warn!("upsert attempt {} failed: {}", attempt + 1, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| StoreError::Unavailable("upsert failed".into())))
}
