//! # folio-core
//!
//! Core types, traits, and abstractions for folio.
//!
//! This crate provides:
//! - The job data model (chapters, chunks, results, analytics)
//! - The error taxonomy for jobs and provider calls
//! - The `DocumentStore` and `TextProvider` trait seams
//! - The progress event bus
//! - Centralized default constants and logging field names

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

pub use error::{Error, ProviderError, Result};
pub use events::{EventBus, ProgressEvent};
pub use models::{
    Analytics, ChapterMeta, Chunk, ChunkResult, FallbackCounts, FallbackReason, JobConfig,
    JobOutcome, JobPhase, RewriteMode, SkippedChunk,
};
pub use traits::{DocumentStore, TextProvider};

// Re-export the cancellation token so downstream crates share one type.
pub use tokio_util::sync::CancellationToken;
