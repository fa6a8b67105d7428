//! Parallel chunk scheduling with incremental per-chapter persistence.
//!
//! All chunks flow through one shared FIFO queue drained by W workers.
//! Results arrive in whatever order workers finish; chapter reconstruction
//! sorts by chunk index, so the final output is independent of scheduling.
//! A chapter persists as soon as its last chunk resolves, regardless of
//! which chapters finished first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use folio_core::{
    Chunk, ChunkResult, DocumentStore, Error, EventBus, FallbackCounts, JobConfig, ProgressEvent,
    ProviderError, SkippedChunk,
};

use crate::processor::{ChunkProcessor, ProcessedChunk};

/// Per-job context shared by every worker.
///
/// All mutable job state (counters, audit list, results) lives behind this
/// object rather than in process-wide statics, so concurrent jobs can
/// never interfere.
pub struct JobContext {
    pub job_id: Uuid,
    pub config: JobConfig,
    pub store: Arc<dyn DocumentStore>,
    pub processor: Arc<ChunkProcessor>,
    pub bus: EventBus,
    pub cancel: CancellationToken,
}

/// What the scheduler produced, success or not.
///
/// `error` carries the terminal failure if one occurred; partial counters
/// stay valid either way so the job report reflects work actually done.
pub struct ScheduleOutcome {
    /// One slot per manifest item, in manifest order. All `Some` on
    /// success.
    pub results: Vec<Option<ChunkResult>>,
    pub fallbacks: FallbackCounts,
    pub audit: Vec<SkippedChunk>,
    pub chunks_completed: usize,
    pub chapters_saved: usize,
    pub error: Option<Error>,
}

/// Reassembly state for one chapter.
struct ChapterAssembly {
    chapter_id: String,
    expected: usize,
    done: AtomicUsize,
    parts: Mutex<Vec<Option<String>>>,
}

/// State shared across workers for one scheduling run.
struct Shared {
    job_id: Uuid,
    manifest: Vec<Chunk>,
    next: AtomicUsize,
    chapters: HashMap<usize, ChapterAssembly>,
    results: Mutex<Vec<Option<ChunkResult>>>,
    completed: AtomicUsize,
    fallback_count: AtomicU32,
    fallback_threshold: u32,
    /// Stops dispatch without aborting in-flight work (fatal errors).
    halt: AtomicBool,
    /// Child of the job token; cancelling it aborts in-flight provider
    /// calls (circuit breaker) and follows user cancellation.
    abort: CancellationToken,
    fatal: Mutex<Option<Error>>,
    audit: Mutex<Vec<SkippedChunk>>,
    chapters_saved: AtomicUsize,
    /// The one critical section: stage + persist through the store.
    save_lock: tokio::sync::Mutex<()>,
    store: Arc<dyn DocumentStore>,
    bus: EventBus,
}

impl Shared {
    fn set_fatal(&self, err: Error) {
        let mut fatal = self.fatal.lock().unwrap();
        if fatal.is_none() {
            error!(error = %err, "Terminal job failure, halting dispatch");
            *fatal = Some(err);
        }
        self.halt.store(true, Ordering::SeqCst);
    }

    /// Record a finished chunk and, if its chapter is now complete,
    /// reassemble and persist the chapter.
    async fn record(&self, chunk: &Chunk, processed: ProcessedChunk) -> Result<(), Error> {
        {
            let mut results = self.results.lock().unwrap();
            results[chunk.queue_position] = Some(ChunkResult {
                chapter_id: chunk.chapter_id.clone(),
                index: chunk.index,
                text: processed.text.clone(),
                fallback: processed.fallback,
            });
        }
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        if !processed.audit.is_empty() {
            self.audit.lock().unwrap().extend(processed.audit);
        }

        if let Some(reason) = processed.fallback {
            let count = self.fallback_count.fetch_add(1, Ordering::SeqCst) + 1;
            warn!(
                fallback_reason = %reason,
                fallback_count = count,
                chapter_id = %chunk.chapter_id,
                chunk_index = chunk.index,
                "Chunk fell back to original text"
            );
            if self.fallback_threshold > 0 && count >= self.fallback_threshold {
                self.set_fatal(Error::FallbackThreshold {
                    count,
                    threshold: self.fallback_threshold,
                });
                // Output quality is degrading across the board; stop all
                // provider traffic, including bisection sub-calls.
                self.abort.cancel();
            }
        }

        self.bus.emit(ProgressEvent::chunk(
            self.job_id,
            completed,
            self.manifest.len(),
            chunk.chapter_index,
            format!("chunk {} of {}", completed, self.manifest.len()),
        ));

        let Some(assembly) = self.chapters.get(&chunk.chapter_index) else {
            return Err(Error::Internal(format!(
                "no assembly for chapter index {}",
                chunk.chapter_index
            )));
        };
        let done = {
            let mut parts = assembly.parts.lock().unwrap();
            parts[chunk.index] = Some(processed.text);
            assembly.done.fetch_add(1, Ordering::SeqCst) + 1
        };

        if done == assembly.expected {
            let text: String = {
                let parts = assembly.parts.lock().unwrap();
                parts
                    .iter()
                    .map(|p| p.as_deref().unwrap_or_default())
                    .collect()
            };

            let _guard = self.save_lock.lock().await;
            self.store.stage_chapter(&assembly.chapter_id, &text).await?;
            self.store.persist().await?;
            drop(_guard);

            let saved = self.chapters_saved.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                chapter_id = %assembly.chapter_id,
                chapters_saved = saved,
                "Chapter reassembled and persisted"
            );
            self.bus.emit(ProgressEvent::chunk(
                self.job_id,
                completed,
                self.manifest.len(),
                chunk.chapter_index,
                format!("chapter {} saved", assembly.chapter_id),
            ));
        }

        Ok(())
    }
}

/// Worker loop: atomically pop the next chunk, process it, record the
/// result. Ends on queue exhaustion, cancellation, or halt.
async fn worker(shared: Arc<Shared>, processor: Arc<ChunkProcessor>) {
    loop {
        if shared.abort.is_cancelled() || shared.halt.load(Ordering::SeqCst) {
            break;
        }
        let i = shared.next.fetch_add(1, Ordering::SeqCst);
        let Some(chunk) = shared.manifest.get(i) else {
            break;
        };

        match processor.process(chunk, &shared.abort).await {
            Ok(processed) => {
                if let Err(e) = shared.record(chunk, processed).await {
                    shared.set_fatal(e);
                    break;
                }
            }
            Err(ProviderError::Cancelled) => break,
            Err(e) => {
                // Fatal, configuration, or retry-exhausted transient:
                // surface as the job's terminal failure. Other in-flight
                // workers finish their current item but pull no more.
                shared.set_fatal(Error::Provider(e));
                break;
            }
        }
    }
}

/// Run the manifest through `width` workers.
pub async fn run(ctx: &JobContext, manifest: Vec<Chunk>, width: usize) -> ScheduleOutcome {
    let total = manifest.len();

    let mut counts: HashMap<usize, (String, usize)> = HashMap::new();
    for chunk in &manifest {
        let entry = counts
            .entry(chunk.chapter_index)
            .or_insert_with(|| (chunk.chapter_id.clone(), 0));
        entry.1 += 1;
    }
    let chapters = counts
        .into_iter()
        .map(|(chapter_index, (chapter_id, expected))| {
            (
                chapter_index,
                ChapterAssembly {
                    chapter_id,
                    expected,
                    done: AtomicUsize::new(0),
                    parts: Mutex::new(vec![None; expected]),
                },
            )
        })
        .collect();

    let shared = Arc::new(Shared {
        job_id: ctx.job_id,
        manifest,
        next: AtomicUsize::new(0),
        chapters,
        results: Mutex::new(vec![None; total]),
        completed: AtomicUsize::new(0),
        fallback_count: AtomicU32::new(0),
        fallback_threshold: ctx.config.fallback_threshold,
        halt: AtomicBool::new(false),
        abort: ctx.cancel.child_token(),
        fatal: Mutex::new(None),
        audit: Mutex::new(Vec::new()),
        chapters_saved: AtomicUsize::new(0),
        save_lock: tokio::sync::Mutex::new(()),
        store: ctx.store.clone(),
        bus: ctx.bus.clone(),
    });

    let width = width.max(1).min(total.max(1));
    let mut tasks = JoinSet::new();
    for _ in 0..width {
        let shared = shared.clone();
        let processor = ctx.processor.clone();
        tasks.spawn(async move {
            worker(shared, processor).await;
        });
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = ?e, "Worker task panicked");
            shared.set_fatal(Error::Internal(format!("worker task failed: {}", e)));
        }
    }

    let shared = match Arc::try_unwrap(shared) {
        Ok(shared) => shared,
        Err(_) => {
            // All workers have joined; the Arc cannot still be shared.
            return ScheduleOutcome {
                results: Vec::new(),
                fallbacks: FallbackCounts::default(),
                audit: Vec::new(),
                chunks_completed: 0,
                chapters_saved: 0,
                error: Some(Error::Internal("scheduler state still shared".to_string())),
            };
        }
    };

    let results = shared.results.into_inner().unwrap_or_default();
    let mut fallbacks = FallbackCounts::default();
    for result in results.iter().flatten() {
        if let Some(reason) = result.fallback {
            fallbacks.record(reason);
        }
    }

    let fatal = shared.fatal.into_inner().unwrap_or_default();
    let error = if ctx.cancel.is_cancelled() {
        Some(Error::Cancelled)
    } else if let Some(e) = fatal {
        Some(e)
    } else if results.iter().any(|r| r.is_none()) {
        Some(Error::Internal(
            "scheduler finished with missing chunk results".to_string(),
        ))
    } else {
        None
    };

    ScheduleOutcome {
        fallbacks,
        audit: shared.audit.into_inner().unwrap_or_default(),
        chunks_completed: shared.completed.load(Ordering::SeqCst),
        chapters_saved: shared.chapters_saved.load(Ordering::SeqCst),
        results,
        error,
    }
}
