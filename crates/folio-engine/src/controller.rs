//! Job phase machine: Loading → PreScanning → Processing → Finalizing.
//!
//! The controller owns one job from configuration to report. It reads
//! chapter texts, builds the full chunk manifest up front (so progress
//! percentages and the fallback circuit breaker have a stable denominator
//! before any network calls), dispatches to the scheduler, and finalizes
//! with a covering persist pass and analytics.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use folio_core::{
    Analytics, ChapterMeta, Chunk, DocumentStore, Error, EventBus, FallbackCounts, JobConfig,
    JobOutcome, JobPhase, ProgressEvent, Result, SkippedChunk, TextProvider,
};

use crate::processor::ChunkProcessor;
use crate::scheduler::{self, JobContext};
use crate::segmenter::Segmenter;

/// Final report for one job run.
#[derive(Debug)]
pub struct JobReport {
    pub job_id: Uuid,
    pub outcome: JobOutcome,
    pub analytics: Analytics,
    /// Audit artifact: chunks that kept their original text.
    pub skipped: Vec<SkippedChunk>,
}

/// A chapter loaded for processing, tagged with its position in the
/// store's chapter list.
struct LoadedChapter {
    meta: ChapterMeta,
    ordinal: usize,
    text: String,
}

/// Mutable run statistics, filled in as phases complete so the report is
/// meaningful even when a phase fails partway.
#[derive(Default)]
struct RunStats {
    total_chunks: usize,
    chunks_completed: usize,
    chapters_saved: usize,
    fallbacks: FallbackCounts,
    skipped: Vec<SkippedChunk>,
    input_chars: usize,
}

/// Drives one cleanup job to completion, cancellation, or failure.
pub struct JobController {
    job_id: Uuid,
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn TextProvider>,
    config: JobConfig,
    bus: EventBus,
    cancel: CancellationToken,
}

impl JobController {
    /// Create a controller for one job.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn TextProvider>,
        config: JobConfig,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            store,
            provider,
            config,
            bus: EventBus::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Publish events on an existing bus (shared across jobs).
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Token that cancels this job when signaled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to this job's progress events.
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent> {
        self.bus.subscribe()
    }

    /// Run the job to a terminal state. Never panics or bubbles: the
    /// outcome distinguishes completion, user cancellation, and genuine
    /// failure, and chapters persisted incrementally stay on disk in every
    /// case.
    pub async fn run(self) -> JobReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut stats = RunStats::default();

        info!(
            job_id = %self.job_id,
            provider = self.provider.name(),
            mode = %self.config.mode,
            "Job starting"
        );

        let result = self.run_phases(&mut stats).await;
        let outcome = match result {
            Ok(()) => JobOutcome::Complete,
            Err(Error::Cancelled) => JobOutcome::Cancelled,
            Err(e) => JobOutcome::Failed(e.to_string()),
        };

        let finished_at = Utc::now();
        let duration_ms = start.elapsed().as_millis() as u64;
        let chars_per_second = if duration_ms > 0 {
            (stats.input_chars as f64) / (duration_ms as f64 / 1_000.0)
        } else {
            0.0
        };

        let analytics = Analytics {
            job_id: self.job_id,
            chunks_total: stats.total_chunks,
            chunks_completed: stats.chunks_completed,
            chapters_processed: stats.chapters_saved,
            fallbacks: stats.fallbacks,
            started_at,
            finished_at,
            duration_ms,
            chars_per_second,
        };

        let message = match &outcome {
            JobOutcome::Complete => format!(
                "complete: {} chunks, {} fallbacks, {} ms",
                analytics.chunks_completed,
                analytics.fallbacks.total(),
                analytics.duration_ms
            ),
            JobOutcome::Cancelled => "cancelled by user".to_string(),
            JobOutcome::Failed(reason) => reason.clone(),
        };
        self.bus.emit(ProgressEvent::phase(
            self.job_id,
            outcome.phase(),
            stats.total_chunks,
            message,
        ));

        match &outcome {
            JobOutcome::Complete => info!(
                job_id = %self.job_id,
                duration_ms,
                chunks = analytics.chunks_completed,
                fallbacks = analytics.fallbacks.total(),
                "Job complete"
            ),
            JobOutcome::Cancelled => warn!(job_id = %self.job_id, "Job cancelled"),
            JobOutcome::Failed(reason) => {
                warn!(job_id = %self.job_id, error = %reason, "Job failed")
            }
        }

        JobReport {
            job_id: self.job_id,
            outcome,
            analytics,
            skipped: stats.skipped,
        }
    }

    async fn run_phases(&self, stats: &mut RunStats) -> Result<()> {
        // Loading
        self.emit_phase(JobPhase::Loading, 0, "loading chapters");
        let chapters = self.load_chapters().await?;
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // PreScanning: the whole manifest is built before any network
        // call so the total chunk count is stable.
        let manifest = self.build_manifest(&chapters);
        stats.total_chunks = manifest.len();
        stats.input_chars = manifest.iter().map(|c| c.text.chars().count()).sum();
        self.emit_phase(
            JobPhase::PreScanning,
            manifest.len(),
            format!(
                "{} chunks across {} chapters",
                manifest.len(),
                chapters.len()
            ),
        );

        // Processing
        let width = if !self.provider.supports_parallel() || self.config.workers <= 1 {
            1
        } else {
            self.config.workers
        };
        debug!(
            width,
            parallel = width > 1,
            provider = self.provider.name(),
            "Dispatching chunk manifest"
        );
        self.emit_phase(
            JobPhase::Processing,
            manifest.len(),
            format!("processing with {} worker(s)", width),
        );

        let ctx = JobContext {
            job_id: self.job_id,
            config: self.config.clone(),
            store: self.store.clone(),
            processor: Arc::new(ChunkProcessor::new(
                self.provider.clone(),
                &self.config,
            )),
            bus: self.bus.clone(),
            cancel: self.cancel.clone(),
        };
        let out = scheduler::run(&ctx, manifest, width).await;
        stats.chunks_completed = out.chunks_completed;
        stats.chapters_saved = out.chapters_saved;
        stats.fallbacks = out.fallbacks;
        stats.skipped = out.audit;
        if let Some(e) = out.error {
            return Err(e);
        }

        // Finalizing: one covering persist for anything staged after the
        // last incremental save.
        self.emit_phase(JobPhase::Finalizing, stats.total_chunks, "final persistence pass");
        self.store.persist().await?;

        Ok(())
    }

    /// Load chapters, skipping those whose extracted text is empty.
    async fn load_chapters(&self) -> Result<Vec<LoadedChapter>> {
        let listed = self.store.list_chapters().await?;
        if listed.is_empty() {
            return Err(Error::NoContent("document has no chapters".to_string()));
        }

        let mut chapters = Vec::new();
        for (ordinal, meta) in listed.into_iter().enumerate() {
            let text = self.store.chapter_text(&meta.id).await?;
            if text.trim().is_empty() {
                debug!(chapter_id = %meta.id, "Skipping empty chapter");
                continue;
            }
            chapters.push(LoadedChapter {
                meta,
                ordinal,
                text,
            });
        }

        if chapters.is_empty() {
            return Err(Error::NoContent(
                "document has no non-empty chapters".to_string(),
            ));
        }
        Ok(chapters)
    }

    /// Segment every chapter into the flattened, ordered chunk manifest.
    fn build_manifest(&self, chapters: &[LoadedChapter]) -> Vec<Chunk> {
        let segmenter = Segmenter::new(self.config.chunk_size);
        let mut manifest = Vec::new();
        let mut queue_position = 0;

        for chapter in chapters {
            let pieces = segmenter.segment(&chapter.text);
            debug!(
                chapter_id = %chapter.meta.id,
                chunk_count = pieces.len(),
                "Chapter segmented"
            );
            for (index, text) in pieces.into_iter().enumerate() {
                manifest.push(Chunk {
                    chapter_id: chapter.meta.id.clone(),
                    chapter_index: chapter.ordinal,
                    index,
                    queue_position,
                    text,
                });
                queue_position += 1;
            }
        }
        manifest
    }

    fn emit_phase(&self, phase: JobPhase, total: usize, message: impl Into<String>) {
        self.bus
            .emit(ProgressEvent::phase(self.job_id, phase, total, message));
    }
}
