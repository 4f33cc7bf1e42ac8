//! # Lorehouse
//!
//! A context-aware chunking and enrichment pipeline for personal knowledge
//! bases.
//!
//! Lorehouse ingests a directory tree of markdown documents, splits each one
//! into heading-aware chunks, asks a local model to restate every chunk so it
//! stands alone, embeds the result, and upserts it into a vector index keyed
//! by content fingerprint. Re-running ingestion over an unchanged knowledge
//! base performs no model calls and no writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Scanner  │──▶│ Parse + Chunk │──▶│ Enrich+Embed │──▶│  SQLite   │
//! │ (globs)   │   │ heading-aware │   │   (Ollama)   │   │  vectors  │
//! └──────────┘   └───────────────┘   └─────────────┘   └────┬─────┘
//!                                                           │
//!                                                           ▼
//!                                                     ┌──────────┐
//!                                                     │   CLI    │
//!                                                     │  (lore)  │
//!                                                     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lore init                     # create the index database
//! lore ingest                   # chunk, enrich, embed, and index
//! lore search "pottery kiln temperatures"
//! lore clean                    # drop records for deleted documents
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`scan`] | Knowledge-base directory scanning |
//! | [`parser`] | Markdown section-tree parsing |
//! | [`chunker`] | Section-tree chunking and fingerprints |
//! | [`identity`] | Author-identity disambiguation |
//! | [`model`] | Language-model capability (Ollama client) |
//! | [`enrich`] | Chunk enrichment prompting |
//! | [`ingest`] | Ingestion orchestration |
//! | [`retrieve`] | Query-time retrieval |
//! | [`maintenance`] | Index cleanup against the live tree |
//! | [`store`] | Vector store trait and backends |
//! | [`error`] | Capability error types |

pub mod chunker;
pub mod config;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod maintenance;
pub mod model;
pub mod parser;
pub mod retrieve;
pub mod scan;
pub mod store;
