//! Core data model for folio cleanup jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

/// Chapter identity and title as listed by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMeta {
    /// Container-native chapter id (owned by the document store).
    pub id: String,
    pub title: String,
}

/// A contiguous, non-overlapping slice of one chapter's text — the unit of
/// work sent to a provider.
///
/// Invariant: concatenating all chunks of a chapter in `index` order
/// reconstructs the chapter's extracted text exactly.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub chapter_id: String,
    /// Index of the owning chapter within the job manifest.
    pub chapter_index: usize,
    /// Index of this chunk within its chapter.
    pub index: usize,
    /// Position in the flattened global work queue.
    pub queue_position: usize,
    pub text: String,
}

/// Why a chunk kept its original text instead of the provider's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
    /// Response was a skip marker (for non-trivial input) or assistant
    /// chatter instead of transformed text.
    ContentSkip,
    /// Refusal vocabulary on an input too small to bisect further.
    #[serde(rename = "copyright-refusal")]
    Copyright,
    /// Response too short with no refusal signature.
    Truncated,
    /// A skip marker embedded inside a longer response.
    MarkerMismatch,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FallbackReason::ContentSkip => "content-skip",
            FallbackReason::Copyright => "copyright-refusal",
            FallbackReason::Truncated => "truncated",
            FallbackReason::MarkerMismatch => "marker-mismatch",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of processing one chunk. Produced exactly once per chunk;
/// immutable once created.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub chapter_id: String,
    /// Index of the chunk within its chapter.
    pub index: usize,
    /// Accepted provider output, or the original chunk text on fallback.
    pub text: String,
    pub fallback: Option<FallbackReason>,
}

/// Audit record for a chunk (or bisected piece) that fell back to its
/// original text. Written once at job end for external review; never fed
/// back into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedChunk {
    pub chapter_id: String,
    pub chapter_index: usize,
    pub chunk_index: usize,
    pub reason: FallbackReason,
    pub original_text: String,
    /// Leading sample of the provider's actual response.
    pub response_sample: String,
}

/// Rewrite register for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteMode {
    /// OCR/format cleanup; output is expected to stay near input length.
    Cleanup,
    /// Register simplification; output may legitimately shrink.
    Simplify,
}

impl RewriteMode {
    /// Minimum accepted response/input length ratio for this mode.
    pub fn length_ratio(&self) -> f64 {
        match self {
            RewriteMode::Cleanup => defaults::CLEANUP_LENGTH_RATIO,
            RewriteMode::Simplify => defaults::SIMPLIFY_LENGTH_RATIO,
        }
    }

    /// Parse mode from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cleanup" | "clean" => Some(RewriteMode::Cleanup),
            "simplify" | "simplification" => Some(RewriteMode::Simplify),
            _ => None,
        }
    }
}

impl std::fmt::Display for RewriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewriteMode::Cleanup => write!(f, "cleanup"),
            RewriteMode::Simplify => write!(f, "simplify"),
        }
    }
}

/// Configuration for one cleanup job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub mode: RewriteMode,
    /// Parallel worker count; 1 selects the sequential path.
    pub workers: usize,
    /// Maximum chunk size in bytes.
    pub chunk_size: usize,
    /// Cumulative fallback count that trips the circuit breaker.
    pub fallback_threshold: u32,
    /// Minimum input size (chars) for bisection retry.
    pub bisect_min_chars: usize,
    /// System prompt sent with every transform call.
    pub system_prompt: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            mode: RewriteMode::Cleanup,
            workers: defaults::WORKER_COUNT,
            chunk_size: defaults::CHUNK_SIZE,
            fallback_threshold: defaults::FALLBACK_THRESHOLD,
            bisect_min_chars: defaults::BISECT_MIN_CHARS,
            system_prompt: String::new(),
        }
    }
}

impl JobConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FOLIO_WORKERS` | `3` | Parallel worker count |
    /// | `FOLIO_CHUNK_SIZE` | `8000` | Max chunk size in bytes |
    /// | `FOLIO_FALLBACK_THRESHOLD` | `10` | Circuit breaker limit |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FOLIO_WORKERS") {
            if let Ok(n) = val.parse::<usize>() {
                config.workers = n.max(1);
            } else {
                tracing::warn!(value = %val, "Invalid FOLIO_WORKERS, using default");
            }
        }
        if let Ok(val) = std::env::var("FOLIO_CHUNK_SIZE") {
            if let Ok(n) = val.parse::<usize>() {
                config.chunk_size = n.max(1);
            } else {
                tracing::warn!(value = %val, "Invalid FOLIO_CHUNK_SIZE, using default");
            }
        }
        if let Ok(val) = std::env::var("FOLIO_FALLBACK_THRESHOLD") {
            if let Ok(n) = val.parse::<u32>() {
                config.fallback_threshold = n;
            } else {
                tracing::warn!(value = %val, "Invalid FOLIO_FALLBACK_THRESHOLD, using default");
            }
        }

        config
    }

    /// Set the rewrite mode.
    pub fn with_mode(mut self, mode: RewriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the worker count (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the maximum chunk size in bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the fallback circuit-breaker threshold.
    pub fn with_fallback_threshold(mut self, threshold: u32) -> Self {
        self.fallback_threshold = threshold;
        self
    }

    /// Set the bisection minimum input size in chars.
    pub fn with_bisect_min_chars(mut self, min: usize) -> Self {
        self.bisect_min_chars = min;
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

/// Phase of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Loading,
    PreScanning,
    Processing,
    Finalizing,
    Complete,
    Cancelled,
    Failed,
}

impl JobPhase {
    /// Whether this phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Complete | JobPhase::Cancelled | JobPhase::Failed
        )
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobPhase::Loading => "loading",
            JobPhase::PreScanning => "pre-scanning",
            JobPhase::Processing => "processing",
            JobPhase::Finalizing => "finalizing",
            JobPhase::Complete => "complete",
            JobPhase::Cancelled => "cancelled",
            JobPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Per-reason fallback counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackCounts {
    pub content_skip: u32,
    pub copyright: u32,
    pub truncated: u32,
    pub marker_mismatch: u32,
}

impl FallbackCounts {
    /// Increment the counter for a reason.
    pub fn record(&mut self, reason: FallbackReason) {
        match reason {
            FallbackReason::ContentSkip => self.content_skip += 1,
            FallbackReason::Copyright => self.copyright += 1,
            FallbackReason::Truncated => self.truncated += 1,
            FallbackReason::MarkerMismatch => self.marker_mismatch += 1,
        }
    }

    /// Total fallbacks across all reasons.
    pub fn total(&self) -> u32 {
        self.content_skip + self.copyright + self.truncated + self.marker_mismatch
    }
}

/// Read-only summary computed once at job completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analytics {
    pub job_id: Uuid,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub chapters_processed: usize,
    pub fallbacks: FallbackCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Input characters processed per second of wall-clock time.
    pub chars_per_second: f64,
}

/// Terminal outcome of a job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Complete,
    /// Cancelled by the user; already-persisted chapters remain intact.
    Cancelled,
    /// Genuine failure with a human-readable reason.
    Failed(String),
}

impl JobOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, JobOutcome::Complete)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }

    pub fn phase(&self) -> JobPhase {
        match self {
            JobOutcome::Complete => JobPhase::Complete,
            JobOutcome::Cancelled => JobPhase::Cancelled,
            JobOutcome::Failed(_) => JobPhase::Failed,
        }
    }
}
