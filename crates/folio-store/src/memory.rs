//! In-memory document store for tests and embedded use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use folio_core::{ChapterMeta, DocumentStore, Error, Result};

/// Chapter-map document store held entirely in memory.
///
/// Staged chapters and persist calls are observable, so tests can assert
/// on incremental-save behavior. `failing_persist` injects an I/O-style
/// failure on every persist call.
pub struct MemoryStore {
    chapters: Vec<ChapterMeta>,
    texts: HashMap<String, String>,
    staged: Mutex<HashMap<String, String>>,
    persisted: Mutex<HashMap<String, String>>,
    persist_count: AtomicUsize,
    fail_persist: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            chapters: Vec::new(),
            texts: HashMap::new(),
            staged: Mutex::new(HashMap::new()),
            persisted: Mutex::new(HashMap::new()),
            persist_count: AtomicUsize::new(0),
            fail_persist: false,
        }
    }

    /// Add a chapter in document order.
    pub fn with_chapter(
        mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let id = id.into();
        self.chapters.push(ChapterMeta {
            id: id.clone(),
            title: title.into(),
        });
        self.texts.insert(id, text.into());
        self
    }

    /// Make every `persist` call fail.
    pub fn failing_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }

    /// Staged (rebuilt but possibly unpersisted) text for a chapter.
    pub fn staged_text(&self, id: &str) -> Option<String> {
        self.staged.lock().unwrap().get(id).cloned()
    }

    /// Persisted text for a chapter.
    pub fn persisted_text(&self, id: &str) -> Option<String> {
        self.persisted.lock().unwrap().get(id).cloned()
    }

    /// Number of chapters in the persisted container.
    pub fn persisted_count(&self) -> usize {
        self.persisted.lock().unwrap().len()
    }

    /// How many times `persist` was called.
    pub fn persist_count(&self) -> usize {
        self.persist_count.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_chapters(&self) -> Result<Vec<ChapterMeta>> {
        Ok(self.chapters.clone())
    }

    async fn chapter_text(&self, id: &str) -> Result<String> {
        self.texts
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ChapterNotFound(id.to_string()))
    }

    async fn stage_chapter(&self, id: &str, cleaned: &str) -> Result<()> {
        if !self.texts.contains_key(id) {
            return Err(Error::ChapterNotFound(id.to_string()));
        }
        self.staged
            .lock()
            .unwrap()
            .insert(id.to_string(), cleaned.to_string());
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        self.persist_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist {
            return Err(Error::Store("simulated persist failure".to_string()));
        }
        let staged = self.staged.lock().unwrap().clone();
        self.persisted.lock().unwrap().extend(staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_chapters_in_order() {
        let store = MemoryStore::new()
            .with_chapter("b", "Second", "two")
            .with_chapter("a", "First", "one");

        let chapters = store.list_chapters().await.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].id, "b", "insertion order is document order");
        assert_eq!(chapters[1].id, "a");
    }

    #[tokio::test]
    async fn test_chapter_text_not_found() {
        let store = MemoryStore::new();
        let err = store.chapter_text("missing").await.unwrap_err();
        assert!(matches!(err, Error::ChapterNotFound(_)));
    }

    #[tokio::test]
    async fn test_stage_then_persist() {
        let store = MemoryStore::new().with_chapter("ch1", "One", "dirty");

        store.stage_chapter("ch1", "clean").await.unwrap();
        assert_eq!(store.staged_text("ch1").as_deref(), Some("clean"));
        assert!(store.persisted_text("ch1").is_none());

        store.persist().await.unwrap();
        assert_eq!(store.persisted_text("ch1").as_deref(), Some("clean"));
        assert_eq!(store.persist_count(), 1);
    }

    #[tokio::test]
    async fn test_persist_is_idempotent() {
        let store = MemoryStore::new().with_chapter("ch1", "One", "dirty");
        store.stage_chapter("ch1", "clean").await.unwrap();

        store.persist().await.unwrap();
        store.persist().await.unwrap();
        assert_eq!(store.persisted_text("ch1").as_deref(), Some("clean"));
        assert_eq!(store.persisted_count(), 1);
    }

    #[tokio::test]
    async fn test_stage_unknown_chapter_fails() {
        let store = MemoryStore::new();
        let err = store.stage_chapter("nope", "text").await.unwrap_err();
        assert!(matches!(err, Error::ChapterNotFound(_)));
    }

    #[tokio::test]
    async fn test_failing_persist() {
        let store = MemoryStore::new()
            .with_chapter("ch1", "One", "dirty")
            .failing_persist();
        store.stage_chapter("ch1", "clean").await.unwrap();

        let err = store.persist().await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(store.persisted_text("ch1").is_none());
    }
}
