//! Knowledge-base directory scanning.
//!
//! Walks the configured root, applies include/exclude globs, and returns
//! source paths relative to the root in sorted (deterministic) order. File
//! reading tolerates non-UTF-8 content by falling back to Latin-1, matching
//! how note archives accumulated over years tend to be encoded.

use std::path::Path;

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{error, warn};
use walkdir::WalkDir;

use crate::config::IngestConfig;

/// List matching documents under the knowledge-base root.
pub fn scan_knowledge_base(config: &IngestConfig) -> Result<Vec<String>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Knowledge-base root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.obsidian/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        paths.push(rel_str);
    }

    // Sort for deterministic ordering
    paths.sort();
    Ok(paths)
}

/// Read a document's text, or `None` if it cannot be read at all.
///
/// UTF-8 first; on invalid UTF-8 the bytes are decoded as Latin-1 with a
/// logged warning. I/O failures are logged and skipped, never fatal to the
/// surrounding run.
pub fn read_document(root: &Path, source_path: &str) -> Option<String> {
    let path = root.join(source_path);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("could not read {}: {}", path.display(), e);
            return None;
        }
    };

    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(
                "{} is not valid UTF-8, decoding as Latin-1",
                path.display()
            );
            Some(e.into_bytes().iter().map(|&b| b as char).collect())
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
