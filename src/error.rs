//! Typed failures for the effectful stages of the pipeline.
//!
//! Parsing and chunking are pure and infallible (malformed structure is
//! recovered in place). Everything that crosses a process boundary — model
//! calls and store operations — reports one of the error kinds below so
//! callers can distinguish transient failures (retry, then skip the chunk)
//! from configuration failures (abort the run).

use thiserror::Error;

/// Failure from the text-completion or embedding capability.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The backend could not be reached or returned a retryable status.
    #[error("model backend unavailable: {0}")]
    Unavailable(String),

    /// The request exceeded the configured timeout.
    #[error("model call timed out: {0}")]
    Timeout(String),

    /// The backend answered, but the response is unusable. Not retried.
    #[error("model returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Unavailable(_) | ModelError::Timeout(_))
    }
}

/// Failure from the vector store capability.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed transiently.
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    /// Existing records hold vectors of a different dimensionality than the
    /// configured embedding model produces. Fatal before any write.
    #[error(
        "embedding dimensionality mismatch: store holds {stored}-dimensional \
         vectors, configured model produces {configured}"
    )]
    SchemaMismatch { stored: usize, configured: usize },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}
