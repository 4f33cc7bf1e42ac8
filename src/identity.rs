//! Author identity resolution.
//!
//! A knowledge base can designate one directory subtree as "documents about
//! the author". First-person references in those documents are ambiguous to
//! a retrieval consumer, so chunks from that subtree are enriched with a
//! rewrite instruction that resolves "I"/"me"/"my" to the configured
//! identity. Resolution is a pure path check against an immutable
//! configuration value — no ambient state.

use std::path::{Component, Path};

use serde::Deserialize;

/// A configured author identity.
///
/// `path_prefix` designates the subtree of author-scoped documents; the
/// remaining fields parameterize the first-person rewrite instruction.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorIdentity {
    pub name: String,
    pub full_name: String,
    /// Subject pronoun form, e.g. `he`, `she`, `they`.
    pub pronoun_subject: String,
    /// Object pronoun form, e.g. `him`, `her`, `them`.
    pub pronoun_object: String,
    /// Path prefix (relative to the knowledge-base root) of documents about
    /// the author.
    pub path_prefix: String,
}

/// How first-person ambiguity was handled for a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisambiguationMode {
    None,
    AuthorFirstPersonRewrite,
}

impl DisambiguationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisambiguationMode::None => "none",
            DisambiguationMode::AuthorFirstPersonRewrite => "author-first-person-rewrite",
        }
    }
}

/// Decide the disambiguation mode for a document at `source_path`.
///
/// A document is author-scoped when its path lies under the configured
/// prefix, at any depth. Without a configured identity every document
/// resolves to [`DisambiguationMode::None`].
pub fn resolve(identity: Option<&AuthorIdentity>, source_path: &str) -> DisambiguationMode {
    match identity {
        Some(id) if is_under_prefix(source_path, &id.path_prefix) => {
            DisambiguationMode::AuthorFirstPersonRewrite
        }
        _ => DisambiguationMode::None,
    }
}

fn is_under_prefix(source_path: &str, prefix: &str) -> bool {
    let prefix_parts: Vec<&str> = Path::new(prefix)
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => p.to_str(),
            _ => None,
        })
        .collect();
    if prefix_parts.is_empty() {
        return false;
    }

    let path_parts: Vec<&str> = Path::new(source_path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => p.to_str(),
            _ => None,
        })
        .collect();

    // The final path component is the file itself, so a scoped document has
    // strictly more components than the prefix.
    path_parts.len() > prefix_parts.len() && path_parts.starts_with(&prefix_parts)
}
