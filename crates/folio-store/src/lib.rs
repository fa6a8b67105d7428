//! # folio-store
//!
//! Document store implementations for folio.
//!
//! The engine consumes stores behind the `DocumentStore` trait; this crate
//! provides:
//! - `MemoryStore`: in-memory store with observable staging/persist state
//! - `TextDirStore`: a directory of plain-text chapter files

pub mod memory;
pub mod textdir;

pub use memory::MemoryStore;
pub use textdir::{looks_like_chapter_dir, TextDirStore};
