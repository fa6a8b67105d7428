//! Core traits for folio abstractions.
//!
//! These traits define the two external seams of the engine: the document
//! store that owns container parsing/persistence, and the text providers
//! that perform the actual rewrite. Concrete implementations are pluggable
//! and the engine never branches on implementation identity.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result};
use crate::models::ChapterMeta;

/// External owner of document-container parsing, chapter extraction, and
/// reconstruction/persistence.
///
/// `stage_chapter` rebuilds the container fragment for one chapter from its
/// cleaned text and records it in the store's modified set; `persist`
/// writes the container including everything staged so far. `persist` must
/// be idempotent and safe to call repeatedly — the engine additionally
/// serializes stage+persist behind one mutex, so implementations are never
/// entered concurrently for writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List chapters in document order.
    async fn list_chapters(&self) -> Result<Vec<ChapterMeta>>;

    /// Extracted text of one chapter.
    async fn chapter_text(&self, id: &str) -> Result<String>;

    /// Rebuild one chapter's fragment from cleaned text into the modified
    /// set.
    async fn stage_chapter(&self, id: &str, cleaned: &str) -> Result<()>;

    /// Write the container with all staged modifications.
    async fn persist(&self) -> Result<()>;
}

/// An interchangeable text-generation backend.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Transform one chunk of text under the given system prompt.
    ///
    /// Implementations must observe `cancel` while the request is in
    /// flight and return [`ProviderError::Cancelled`] promptly once it is
    /// signaled.
    async fn transform(
        &self,
        text: &str,
        system_prompt: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError>;

    /// Human-readable backend name for logs and events.
    fn name(&self) -> &str;

    /// Whether the backend tolerates concurrent requests. Local
    /// single-instance model servers return false, routing the job onto
    /// the sequential path.
    fn supports_parallel(&self) -> bool {
        true
    }
}
