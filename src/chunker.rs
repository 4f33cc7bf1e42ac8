//! Structure-aligned chunker.
//!
//! Walks a [`Section`] tree depth-first and emits an ordered sequence of
//! [`Chunk`]s, each carrying the heading-path of its section and a
//! deterministic content fingerprint. A section body that fits the character
//! budget becomes one chunk; larger bodies are split at block boundaries
//! (paragraphs, fenced code, quote runs). A single block that alone exceeds
//! the budget is emitted whole — semantic integrity beats the size limit.
//!
//! Fingerprints are SHA-256 over the source path, heading-path, and body
//! text, each whitespace-normalized so formatting-only edits do not
//! invalidate existing index records.

use sha2::{Digest, Sha256};

use crate::parser::Section;

/// A retrieval-sized span of document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Path of the source document, relative to the knowledge-base root.
    pub source_path: String,
    /// Ancestor heading texts from the document root down to this chunk.
    pub heading_path: Vec<String>,
    /// Raw text span.
    pub text: String,
    /// Stable content hash; the idempotency key for this chunk.
    pub fingerprint: String,
}

/// Emit the chunk sequence for a parsed document.
///
/// Sections with empty bodies contribute no chunk but still extend the
/// heading-path of their descendants. Given identical input and budget, the
/// output sequence and fingerprints are identical across runs.
pub fn chunk_document(source_path: &str, root: &Section, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut heading_path = Vec::new();
    walk(source_path, root, max_chars, &mut heading_path, &mut chunks);
    chunks
}

fn walk(
    source_path: &str,
    section: &Section,
    max_chars: usize,
    heading_path: &mut Vec<String>,
    out: &mut Vec<Chunk>,
) {
    if section.level > 0 {
        heading_path.push(section.heading.clone());
    }

    if !section.body.trim().is_empty() {
        for text in split_body(&section.body, max_chars) {
            let fingerprint = fingerprint(source_path, heading_path, &text);
            out.push(Chunk {
                source_path: source_path.to_string(),
                heading_path: heading_path.clone(),
                text,
                fingerprint,
            });
        }
    }

    for child in &section.children {
        walk(source_path, child, max_chars, heading_path, out);
    }

    if section.level > 0 {
        heading_path.pop();
    }
}

/// Split a section body into chunk texts within the budget.
///
/// Blocks are accumulated greedily; a flush happens only at block
/// boundaries, so no chunk ever cuts a sentence, code fence, or quote run.
fn split_body(body: &str, max_chars: usize) -> Vec<String> {
    let blocks = split_blocks(body);
    let mut pieces = Vec::new();
    let mut buf = String::new();

    for block in blocks {
        if !buf.is_empty() && buf.len() + 2 + block.len() > max_chars {
            pieces.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(&block);
    }
    if !buf.is_empty() {
        pieces.push(buf);
    }
    pieces
}

/// Split body text into atomic blocks: fenced code blocks and quote runs
/// stay whole, everything else groups into blank-line-separated paragraphs.
fn split_blocks(body: &str) -> Vec<String> {
    let lines: Vec<&str> = body.lines().collect();
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.trim().is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            i += 1;
            continue;
        }

        if line.trim_start().starts_with("```") {
            flush_paragraph(&mut paragraph, &mut blocks);
            let start = i;
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with("```") {
                i += 1;
            }
            let end = (i + 1).min(lines.len());
            blocks.push(lines[start..end].join("\n"));
            i = end;
            continue;
        }

        if line.trim_start().starts_with('>') {
            flush_paragraph(&mut paragraph, &mut blocks);
            let start = i;
            while i < lines.len() && lines[i].trim_start().starts_with('>') {
                i += 1;
            }
            blocks.push(lines[start..i].join("\n"));
            continue;
        }

        paragraph.push(line);
        i += 1;
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_paragraph(paragraph: &mut Vec<&str>, blocks: &mut Vec<String>) {
    if !paragraph.is_empty() {
        blocks.push(paragraph.join("\n"));
        paragraph.clear();
    }
}

/// Compute the stable fingerprint for a chunk.
///
/// Each component is whitespace-collapsed before hashing so that
/// formatting-only edits keep the fingerprint stable; components are
/// separated by a unit separator byte to prevent boundary ambiguity.
pub fn fingerprint(source_path: &str, heading_path: &[String], text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_whitespace(source_path));
    hasher.update([0x1f]);
    for heading in heading_path {
        hasher.update(normalize_whitespace(heading));
        hasher.update([0x1f]);
    }
    hasher.update(normalize_whitespace(text));
    format!("{:x}", hasher.finalize())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
