//! Error types for folio.

use thiserror::Error;

/// Result type alias using folio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classified failure from a text-generation provider.
///
/// The class decides what the engine does next: `Transient` is retried with
/// backoff, `Configuration` and `Fatal` stop the job, `ContentPolicy` is
/// resolved to a soft-fallback chunk result by the caller, and `Cancelled`
/// ends the attempt without counting as a failure.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Network-level failure (connection refused/reset, timeout, 5xx).
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Missing or invalid provider configuration (no key, no model).
    #[error("provider configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the content itself (transport succeeded).
    #[error("content policy rejection: {0}")]
    ContentPolicy(String),

    /// Unrecoverable mid-job failure: quota exhausted, invalid credentials,
    /// unknown model, authorization failure.
    #[error("fatal provider error: {0}")]
    Fatal(String),

    /// The call was cancelled through the job's cancellation token.
    #[error("provider call cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether the retry policy may re-attempt this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Whether this failure must terminate the whole job.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProviderError::Fatal(_) | ProviderError::Configuration(_)
        )
    }
}

/// Core error type for folio job operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The document has no non-empty chapters to process.
    #[error("no content: {0}")]
    NoContent(String),

    /// Chapter not found in the document store.
    #[error("chapter not found: {0}")]
    ChapterNotFound(String),

    /// Invalid job or provider configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider failure that terminated the job.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The fallback circuit breaker tripped.
    #[error("fallback threshold exceeded: {count} fallbacks (limit {threshold})")]
    FallbackThreshold { count: u32, threshold: u32 },

    /// The job was cancelled by the user.
    #[error("job cancelled")]
    Cancelled,

    /// Document store failure.
    #[error("store error: {0}")]
    Store(String),

    /// File I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serialization error: {}", e))
    }
}
