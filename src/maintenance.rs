//! Index maintenance against the live knowledge base.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::store::VectorStore;

/// Outcome of a [`clean`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub paths_removed: u64,
    pub records_deleted: u64,
}

/// Remove records whose source document no longer exists on disk.
///
/// The index tracks documents by path relative to the knowledge-base root;
/// anything indexed under a path that has since been deleted or moved is
/// dead weight in every query and gets dropped here.
pub async fn clean(store: &dyn VectorStore, root: &Path) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    for source_path in store.list_paths().await? {
        if root.join(&source_path).exists() {
            continue;
        }
        let deleted = delete_path(store, &source_path).await?;
        info!("removed {} records for missing {}", deleted, source_path);
        report.paths_removed += 1;
        report.records_deleted += deleted;
    }

    Ok(report)
}

/// Delete every record indexed under `source_path`. Returns the count.
pub async fn delete_path(store: &dyn VectorStore, source_path: &str) -> Result<u64> {
    let keys = store.keys_for_path(source_path).await?;
    let mut deleted = 0;
    for key in &keys {
        store.delete_by_key(key).await?;
        deleted += 1;
    }
    Ok(deleted)
}
