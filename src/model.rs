//! Model capability abstraction and the Ollama client.
//!
//! The [`LanguageModel`] trait is the seam between deterministic pipeline
//! logic and non-deterministic model I/O: the enricher and retriever only
//! ever see this trait, so tests substitute in-process fakes.
//!
//! [`OllamaClient`] talks to an Ollama instance over HTTP (`/api/chat` for
//! completion, `/api/embed` for embeddings).
//!
//! # Retry Strategy
//!
//! Transient failures are retried with exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::ModelsConfig;
use crate::error::ModelError;

/// Text-completion and embedding capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce a completion for `message` under `system_prompt`.
    async fn complete(&self, system_prompt: &str, message: &str) -> Result<String, ModelError>;

    /// Embed `text` into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// Dimensionality of the vectors [`embed`](LanguageModel::embed) returns.
    fn embedding_dims(&self) -> usize;
}

/// HTTP client for a local or remote Ollama instance.
pub struct OllamaClient {
    base_url: String,
    completion_model: String,
    embedding_model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &ModelsConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            completion_model: config.completion_model.clone(),
            embedding_model: config.embedding_model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
            client,
        })
    }

    /// POST a JSON body, retrying transient failures with backoff.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ModelError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(url, attempt, "retrying model call after {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(url).json(body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .map_err(|e| ModelError::InvalidResponse(e.to_string()));
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(ModelError::Unavailable(format!(
                            "{}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(ModelError::InvalidResponse(format!(
                        "{}: {}",
                        status, body_text
                    )));
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(ModelError::Timeout(e.to_string()));
                    continue;
                }
                Err(e) => {
                    last_err = Some(ModelError::Unavailable(format!(
                        "could not reach model backend at {}: {}",
                        self.base_url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ModelError::Unavailable("model call failed after retries".into())))
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, system_prompt: &str, message: &str) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::json!({
            "model": self.completion_model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": message },
            ],
            "stream": false,
        });

        let json = self.post_with_retry(&url, &body).await?;
        json.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ModelError::InvalidResponse("missing message.content in chat response".into())
            })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": text,
            "stream": false,
        });

        let json = self.post_with_retry(&url, &body).await?;
        let vector: Vec<f32> = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .and_then(|arr| arr.first())
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                ModelError::InvalidResponse("missing embeddings array in embed response".into())
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vector.len() != self.dims {
            return Err(ModelError::InvalidResponse(format!(
                "embedding model returned {} dimensions, configured for {}",
                vector.len(),
                self.dims
            )));
        }

        Ok(vector)
    }

    fn embedding_dims(&self) -> usize {
        self.dims
    }
}
