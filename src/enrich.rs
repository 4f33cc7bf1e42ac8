//! Chunk enrichment.
//!
//! Each chunk is restated by the completion capability so it can stand alone
//! at retrieval time: the model receives the chunk with its heading-path, a
//! document-level summary for grounding, and — for author-scoped documents —
//! an instruction to rewrite first-person references to the configured
//! identity. The stored enrichment wraps the summary and the original text
//! together, so nothing from the source span is lost.

use std::sync::Arc;

use crate::chunker::Chunk;
use crate::identity::{AuthorIdentity, DisambiguationMode};
use crate::model::LanguageModel;

use crate::error::ModelError;

const SUMMARIZE_CHUNK_PROMPT: &str = "You are an AI that extracts summaries from document \
chunks.\nWrite a concise restatement of the main points in this chunk so that it is \
understandable without any surrounding context. Keep it short but informative.";

const SUMMARIZE_DOCUMENT_PROMPT: &str = "You are an AI that extracts summaries from document \
chunks.\nThe following is the beginning and the end of a document. Write a concise summary of \
what this document is about, no longer than two short sentences.";

const DOCUMENT_SUMMARY_CONTEXT: &str = "Document summary (for background only):\n\
<file_summary>\n{summary}\n</file_summary>\n\
Now summarize the chunk below, focusing ONLY on the chunk's own content and using the document \
summary purely for additional context.";

const AUTHOR_REWRITE_PROMPT: &str = "IMPORTANT: This content was written by {full_name}. Any \
mention of 'I', 'me', or 'my' refers directly to {pronoun_object}self. ALWAYS replace \
first-person references with {full_name}'s name so the result is unambiguous. DO NOT fall back \
to generic terms like 'the author'. The summary must make it clear the content is about \
{full_name} ({pronoun_subject}/{pronoun_object}).";

/// How many chunks contribute to the document-level summary.
const CHUNKS_FOR_DOCUMENT_SUMMARY: usize = 4;

/// A chunk plus its model-produced contextual text.
///
/// Immutable once created; a changed source chunk produces a new fingerprint
/// and therefore a new enrichment, never a mutation of this one.
#[derive(Debug, Clone)]
pub struct EnrichedChunk {
    pub chunk: Chunk,
    /// Context-bearing text persisted to the index and embedded.
    pub enriched_text: String,
    pub mode: DisambiguationMode,
}

/// Drives completion calls for document summaries and chunk enrichment.
#[derive(Clone)]
pub struct Enricher {
    model: Arc<dyn LanguageModel>,
    identity: Option<AuthorIdentity>,
}

impl Enricher {
    pub fn new(model: Arc<dyn LanguageModel>, identity: Option<AuthorIdentity>) -> Self {
        Self { model, identity }
    }

    /// Produce a document-level summary from the first and last chunks.
    ///
    /// Single-chunk documents get no summary — the chunk already spans the
    /// document. One completion call per document.
    pub async fn document_summary(
        &self,
        chunks: &[Chunk],
        mode: DisambiguationMode,
    ) -> Result<Option<String>, ModelError> {
        let take = CHUNKS_FOR_DOCUMENT_SUMMARY.min(chunks.len());
        if take <= 1 {
            return Ok(None);
        }

        let head = take.div_ceil(2);
        let tail = take - head;

        let mut parts: Vec<&str> = chunks[..head].iter().map(|c| c.text.as_str()).collect();
        parts.push("...");
        parts.extend(chunks[chunks.len() - tail..].iter().map(|c| c.text.as_str()));
        let excerpt = parts.join("\n\n");

        let mut prompt = SUMMARIZE_DOCUMENT_PROMPT.to_string();
        if let Some(clause) = self.author_clause(mode) {
            prompt.push(' ');
            prompt.push_str(&clause);
        }

        let summary = self.model.complete(&prompt, &excerpt).await?;
        Ok(Some(summary))
    }

    /// Enrich one chunk: one completion call, then assemble the stored text.
    pub async fn enrich(
        &self,
        chunk: &Chunk,
        document_summary: Option<&str>,
        mode: DisambiguationMode,
    ) -> Result<EnrichedChunk, ModelError> {
        let mut prompt = SUMMARIZE_CHUNK_PROMPT.to_string();
        if let Some(clause) = self.author_clause(mode) {
            prompt.push(' ');
            prompt.push_str(&clause);
        }
        if let Some(summary) = document_summary {
            prompt.push('\n');
            prompt.push_str(&DOCUMENT_SUMMARY_CONTEXT.replace("{summary}", summary));
        }

        let framed = frame_chunk(chunk);
        let chunk_summary = self.model.complete(&prompt, &framed).await?;

        let mut enriched_text = String::new();
        if let Some(summary) = document_summary {
            enriched_text.push_str(&format!("<file_summary>\n{}\n</file_summary>\n\n", summary));
        }
        enriched_text.push_str(&format!(
            "<chunk_summary>\n{}\n</chunk_summary>\n\n{}",
            chunk_summary, framed
        ));

        Ok(EnrichedChunk {
            chunk: chunk.clone(),
            enriched_text,
            mode,
        })
    }

    fn author_clause(&self, mode: DisambiguationMode) -> Option<String> {
        if mode != DisambiguationMode::AuthorFirstPersonRewrite {
            return None;
        }
        let id = self.identity.as_ref()?;
        Some(
            AUTHOR_REWRITE_PROMPT
                .replace("{full_name}", &id.full_name)
                .replace("{pronoun_subject}", &id.pronoun_subject)
                .replace("{pronoun_object}", &id.pronoun_object),
        )
    }
}

/// Wrap a chunk's text with its heading-path so both the model and the
/// retrieval consumer see where the span sits in the document.
fn frame_chunk(chunk: &Chunk) -> String {
    if chunk.heading_path.is_empty() {
        return chunk.text.clone();
    }

    let headers = chunk
        .heading_path
        .iter()
        .enumerate()
        .map(|(depth, heading)| format!("{} {}", "#".repeat(depth + 1), heading))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "<chunk_headers>\n{}\n</chunk_headers>\n\n<chunk_content>\n{}\n</chunk_content>",
        headers, chunk.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt it receives and answers with a canned summary.
    struct RecordingModel {
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl RecordingModel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn system_prompts(&self) -> Vec<String> {
            self.prompts
                .lock()
                .unwrap()
                .iter()
                .map(|(s, _)| s.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, system_prompt: &str, message: &str) -> Result<String, ModelError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), message.to_string()));
            Ok("canned summary".to_string())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ModelError> {
            Ok(vec![0.0; 4])
        }

        fn embedding_dims(&self) -> usize {
            4
        }
    }

    fn john() -> AuthorIdentity {
        AuthorIdentity {
            name: "John".to_string(),
            full_name: "John Doe".to_string(),
            pronoun_subject: "he".to_string(),
            pronoun_object: "him".to_string(),
            path_prefix: "John".to_string(),
        }
    }

    fn chunk(text: &str, heading_path: &[&str]) -> Chunk {
        let heading_path: Vec<String> = heading_path.iter().map(|s| s.to_string()).collect();
        Chunk {
            source_path: "John/notes.md".to_string(),
            fingerprint: crate::chunker::fingerprint("John/notes.md", &heading_path, text),
            heading_path,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_author_scoped_prompt_names_author() {
        let model = RecordingModel::new();
        let enricher = Enricher::new(model.clone(), Some(john()));

        let c = chunk("I like trains.", &["Notes"]);
        let enriched = enricher
            .enrich(&c, None, DisambiguationMode::AuthorFirstPersonRewrite)
            .await
            .unwrap();

        assert_eq!(enriched.mode, DisambiguationMode::AuthorFirstPersonRewrite);
        let prompts = model.system_prompts();
        assert!(prompts[0].contains("John Doe"));
        assert!(prompts[0].contains("himself"));
    }

    #[tokio::test]
    async fn test_unscoped_prompt_omits_author() {
        let model = RecordingModel::new();
        let enricher = Enricher::new(model.clone(), Some(john()));

        let c = chunk("Plain facts.", &["Notes"]);
        enricher
            .enrich(&c, None, DisambiguationMode::None)
            .await
            .unwrap();

        assert!(!model.system_prompts()[0].contains("John Doe"));
    }

    #[tokio::test]
    async fn test_document_summary_grounds_prompt() {
        let model = RecordingModel::new();
        let enricher = Enricher::new(model.clone(), None);

        let c = chunk("Some body.", &["Notes"]);
        let enriched = enricher
            .enrich(&c, Some("the doc summary"), DisambiguationMode::None)
            .await
            .unwrap();

        assert!(model.system_prompts()[0].contains("the doc summary"));
        assert!(enriched
            .enriched_text
            .starts_with("<file_summary>\nthe doc summary\n</file_summary>"));
        assert!(enriched.enriched_text.contains("<chunk_summary>"));
        assert!(enriched.enriched_text.contains("Some body."));
    }

    #[tokio::test]
    async fn test_heading_path_framed_into_message() {
        let model = RecordingModel::new();
        let enricher = Enricher::new(model.clone(), None);

        let c = chunk("body", &["Top", "Nested"]);
        enricher
            .enrich(&c, None, DisambiguationMode::None)
            .await
            .unwrap();

        let (_, message) = model.prompts.lock().unwrap()[0].clone();
        assert!(message.contains("# Top, ## Nested"));
        assert!(message.contains("<chunk_content>\nbody\n</chunk_content>"));
    }

    #[tokio::test]
    async fn test_single_chunk_document_has_no_summary() {
        let model = RecordingModel::new();
        let enricher = Enricher::new(model.clone(), None);

        let chunks = vec![chunk("only one", &[])];
        let summary = enricher
            .document_summary(&chunks, DisambiguationMode::None)
            .await
            .unwrap();
        assert!(summary.is_none());
        assert!(model.system_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_document_summary_uses_head_and_tail() {
        let model = RecordingModel::new();
        let enricher = Enricher::new(model.clone(), None);

        let chunks: Vec<Chunk> = (0..6).map(|i| chunk(&format!("part {}", i), &[])).collect();
        let summary = enricher
            .document_summary(&chunks, DisambiguationMode::None)
            .await
            .unwrap();
        assert_eq!(summary.as_deref(), Some("canned summary"));

        let (_, message) = model.prompts.lock().unwrap()[0].clone();
        assert!(message.contains("part 0"));
        assert!(message.contains("part 1"));
        assert!(message.contains("..."));
        assert!(message.contains("part 4"));
        assert!(message.contains("part 5"));
        assert!(!message.contains("part 2"));
    }
}
