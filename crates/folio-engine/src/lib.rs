//! # folio-engine
//!
//! The chunking, scheduling, and output-fidelity-guarding engine that
//! drives an unreliable text transformer over a large, chaptered document
//! without losing or silently corrupting content.
//!
//! This crate provides:
//! - `Segmenter`: boundary-aware chunking of chapter text
//! - `OutputGuard`: fidelity checks classifying each provider response
//! - `ChunkProcessor`: retry → transform → guard with bounded bisection
//! - The work scheduler: parallel workers over one shared queue with
//!   incremental per-chapter persistence
//! - `JobController`: the job phase machine producing a final report
//! - `JobManager`: the start/cancel/wait control surface

pub mod controller;
pub mod guard;
pub mod manager;
pub mod processor;
pub mod scheduler;
pub mod segmenter;

pub use controller::{JobController, JobReport};
pub use guard::{OutputGuard, Verdict};
pub use manager::JobManager;
pub use processor::{ChunkProcessor, ProcessedChunk};
pub use scheduler::{JobContext, ScheduleOutcome};
pub use segmenter::Segmenter;

// Re-export the core model so engine consumers need only one import path.
pub use folio_core::{
    Analytics, ChapterMeta, Chunk, ChunkResult, DocumentStore, Error, EventBus, FallbackCounts,
    FallbackReason, JobConfig, JobOutcome, JobPhase, ProgressEvent, ProviderError, Result,
    RewriteMode, SkippedChunk, TextProvider,
};
