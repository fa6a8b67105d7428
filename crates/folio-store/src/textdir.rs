//! Directory-backed document store: one plain-text file per chapter.
//!
//! Chapter files are the `.txt` entries of the directory, sorted by file
//! name; the file stem is the chapter id. Cleaned chapters are written
//! under a `cleaned/` subdirectory on persist, leaving the originals
//! untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use folio_core::{ChapterMeta, DocumentStore, Error, Result};

const CLEANED_SUBDIR: &str = "cleaned";

/// Document store over a directory of `.txt` chapter files.
pub struct TextDirStore {
    dir: PathBuf,
    chapters: Vec<ChapterMeta>,
    /// Modified set: chapter id → cleaned text. Persist writes the whole
    /// set, so repeated calls are idempotent.
    staged: Mutex<BTreeMap<String, String>>,
}

impl TextDirStore {
    /// Open a chapter directory, scanning its `.txt` files.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut names = Vec::new();

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("txt") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();

        let chapters = names
            .into_iter()
            .map(|id| {
                let title = prettify(&id);
                ChapterMeta { id, title }
            })
            .collect::<Vec<_>>();

        debug!(dir = %dir.display(), chapter_count = chapters.len(), "Opened chapter directory");
        Ok(Self {
            dir,
            chapters,
            staged: Mutex::new(BTreeMap::new()),
        })
    }

    fn chapter_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", id))
    }

    fn cleaned_dir(&self) -> PathBuf {
        self.dir.join(CLEANED_SUBDIR)
    }

    /// Path a cleaned chapter is written to.
    pub fn cleaned_path(&self, id: &str) -> PathBuf {
        self.cleaned_dir().join(format!("{}.txt", id))
    }
}

/// Turn a file stem into a display title.
fn prettify(stem: &str) -> String {
    let spaced = stem.replace(['_', '-'], " ");
    let trimmed = spaced.trim_start_matches(|c: char| c.is_ascii_digit() || c == ' ');
    let title = if trimmed.is_empty() { spaced.trim() } else { trimmed };
    title.to_string()
}

#[async_trait]
impl DocumentStore for TextDirStore {
    async fn list_chapters(&self) -> Result<Vec<ChapterMeta>> {
        Ok(self.chapters.clone())
    }

    async fn chapter_text(&self, id: &str) -> Result<String> {
        let path = self.chapter_path(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ChapterNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stage_chapter(&self, id: &str, cleaned: &str) -> Result<()> {
        if !self.chapters.iter().any(|c| c.id == id) {
            return Err(Error::ChapterNotFound(id.to_string()));
        }
        self.staged
            .lock()
            .unwrap()
            .insert(id.to_string(), cleaned.to_string());
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let staged = self.staged.lock().unwrap().clone();
        if staged.is_empty() {
            return Ok(());
        }

        let cleaned_dir = self.cleaned_dir();
        tokio::fs::create_dir_all(&cleaned_dir).await?;
        for (id, text) in &staged {
            let path = self.cleaned_path(id);
            tokio::fs::write(&path, text).await?;
        }

        info!(
            dir = %cleaned_dir.display(),
            chapter_count = staged.len(),
            "Persisted cleaned chapters"
        );
        Ok(())
    }
}

/// True if `path` points at a directory containing at least one `.txt`
/// chapter file.
pub fn looks_like_chapter_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.path().extension().and_then(|x| x.to_str()) == Some("txt"))
        })
        .unwrap_or(false)
}
