//! End-to-end job pipeline tests over the in-memory store and mock
//! provider.

use std::sync::Arc;
use std::time::Duration;

use folio_core::{Error, FallbackReason, JobConfig, JobOutcome, JobPhase};
use folio_engine::{JobController, JobManager};
use folio_inference::MockProvider;
use folio_store::MemoryStore;

fn controller(
    store: Arc<MemoryStore>,
    provider: MockProvider,
    config: JobConfig,
) -> JobController {
    JobController::new(store, Arc::new(provider), config)
}

#[tokio::test]
async fn test_three_chapter_document_cleaned() {
    let store = Arc::new(
        MemoryStore::new()
            .with_chapter("ch1", "One", "first chapter text")
            .with_chapter("ch2", "Two", "second chapter text")
            .with_chapter("ch3", "Three", "third chapter text"),
    );
    let provider = MockProvider::new().with_transform(|s| s.replace("chapter", "CHAPTER"));

    let report = controller(store.clone(), provider, JobConfig::default())
        .run()
        .await;

    assert_eq!(report.outcome, JobOutcome::Complete);
    assert_eq!(report.analytics.chunks_total, 3);
    assert_eq!(report.analytics.chunks_completed, 3);
    assert_eq!(report.analytics.chapters_processed, 3);
    assert_eq!(report.analytics.fallbacks.total(), 0);
    assert!(report.skipped.is_empty());
    assert_eq!(
        store.persisted_text("ch2").as_deref(),
        Some("second CHAPTER text")
    );
}

#[tokio::test]
async fn test_empty_chapter_excluded_from_manifest() {
    // Chapter 2 is empty: the manifest covers chapters 1 and 3 only and
    // chapters_processed excludes chapter 2.
    let store = Arc::new(
        MemoryStore::new()
            .with_chapter("ch1", "One", "first chapter text")
            .with_chapter("ch2", "Two", "   \n  ")
            .with_chapter("ch3", "Three", "third chapter text"),
    );
    let provider = MockProvider::new();
    let handle = provider.clone();

    let report = controller(store.clone(), provider, JobConfig::default())
        .run()
        .await;

    assert_eq!(report.outcome, JobOutcome::Complete);
    assert_eq!(report.analytics.chunks_total, 2);
    assert_eq!(report.analytics.chapters_processed, 2);
    assert_eq!(handle.call_count(), 2);
    assert!(store.persisted_text("ch2").is_none(), "chapter 2 untouched");
    assert!(store.persisted_text("ch1").is_some());
    assert!(store.persisted_text("ch3").is_some());
}

#[tokio::test]
async fn test_no_chapters_fails_with_no_content() {
    let store = Arc::new(MemoryStore::new());
    let provider = MockProvider::new();

    let report = controller(store, provider, JobConfig::default()).run().await;
    match report.outcome {
        JobOutcome::Failed(reason) => assert!(reason.contains("no content")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_all_empty_chapters_fails_with_no_content() {
    let store = Arc::new(
        MemoryStore::new()
            .with_chapter("ch1", "One", "")
            .with_chapter("ch2", "Two", "  "),
    );
    let provider = MockProvider::new();
    let handle = provider.clone();

    let report = controller(store, provider, JobConfig::default()).run().await;
    assert!(matches!(report.outcome, JobOutcome::Failed(_)));
    assert_eq!(handle.call_count(), 0, "no provider calls for empty content");
}

#[tokio::test]
async fn test_sentinel_skip_on_trivial_chunk_is_not_a_fallback() {
    // A 50-char chunk answered with exactly the skip marker resolves to
    // the empty placeholder and does not count against the breaker.
    let text = "Page 17 — decorative drop cap and printer's mark.";
    assert!(text.chars().count() <= 50);
    let store = Arc::new(MemoryStore::new().with_chapter("ch1", "One", text));
    let provider = MockProvider::new().with_response(text, "[[SKIP]]");

    let report = controller(store.clone(), provider, JobConfig::default())
        .run()
        .await;

    assert_eq!(report.outcome, JobOutcome::Complete);
    assert_eq!(report.analytics.fallbacks.total(), 0);
    assert!(report.skipped.is_empty());
    assert_eq!(store.persisted_text("ch1").as_deref(), Some(""));
}

#[tokio::test]
async fn test_fallback_threshold_fails_job() {
    let text = (0..8)
        .map(|i| format!("{} paragraph {}.\n\n", "filler words ".repeat(40), i))
        .collect::<String>();
    let store = Arc::new(MemoryStore::new().with_chapter("ch1", "One", text));
    // Always truncate: every chunk falls back.
    let provider = MockProvider::new().with_transform(|_| "nope".to_string());
    let handle = provider.clone();

    let config = JobConfig::default()
        .with_chunk_size(600)
        .with_fallback_threshold(2);
    let report = controller(store, provider, config).run().await;

    match &report.outcome {
        JobOutcome::Failed(reason) => {
            assert!(reason.contains("fallback threshold"), "reason: {}", reason)
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(handle.call_count(), 2, "dispatch stops at the threshold");
    assert_eq!(report.analytics.fallbacks.total(), 2);
}

#[tokio::test]
async fn test_cancellation_mid_job_ends_cancelled() {
    let text = (0..12)
        .map(|i| format!("{} paragraph {}.\n\n", "steady words ".repeat(30), i))
        .collect::<String>();
    let store = Arc::new(MemoryStore::new().with_chapter("ch1", "One", text));
    let provider = MockProvider::new().with_latency_ms(80);
    let handle = provider.clone();

    let job = controller(
        store,
        provider,
        JobConfig::default().with_chunk_size(500).with_workers(2),
    );
    let cancel = job.cancel_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
    });

    let report = job.run().await;
    assert_eq!(report.outcome, JobOutcome::Cancelled);
    assert!(
        report.analytics.chunks_completed < report.analytics.chunks_total,
        "cancellation must land before the manifest drains"
    );
    let calls_at_end = handle.call_count();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        handle.call_count(),
        calls_at_end,
        "no provider call may start after cancellation"
    );
}

#[tokio::test]
async fn test_serial_provider_forces_sequential_path() {
    let text = (0..4)
        .map(|i| format!("{} paragraph {}.\n\n", "orderly words ".repeat(20), i))
        .collect::<String>();
    let store = Arc::new(MemoryStore::new().with_chapter("ch1", "One", text));
    let provider = MockProvider::new().serial_only();
    let handle = provider.clone();

    let report = controller(
        store,
        provider,
        JobConfig::default().with_chunk_size(400).with_workers(4),
    )
    .run()
    .await;

    assert_eq!(report.outcome, JobOutcome::Complete);
    // Sequential processing visits chunks in manifest order.
    let calls = handle.calls();
    assert!(calls.len() >= 2);
    assert!(calls[0].contains("paragraph 0"));
    assert!(calls[1].contains("paragraph 1") || calls[1].contains("paragraph 0"));
}

#[tokio::test]
async fn test_copyright_refusal_bisects_and_audits() {
    let text = "A sentence of testimony. ".repeat(200); // 5000 chars
    let store = Arc::new(MemoryStore::new().with_chapter("ch1", "One", text.clone()));
    // Refuse everything: bisection bottoms out and every leaf keeps its
    // original text.
    let provider = MockProvider::new()
        .with_transform(|_| "I cannot reproduce this copyrighted passage.".to_string());

    let config = JobConfig::default()
        .with_chunk_size(16_000)
        .with_fallback_threshold(50);
    let report = controller(store.clone(), provider, config).run().await;

    assert_eq!(report.outcome, JobOutcome::Complete);
    assert!(report.analytics.fallbacks.copyright > 0);
    assert!(!report.skipped.is_empty());
    assert!(report
        .skipped
        .iter()
        .all(|r| r.reason == FallbackReason::Copyright));
    assert!(report
        .skipped
        .iter()
        .all(|r| r.response_sample.contains("cannot reproduce")));
    // No content loss: the persisted chapter is the original text.
    assert_eq!(store.persisted_text("ch1").as_deref(), Some(text.as_str()));
}

#[tokio::test]
async fn test_progress_events_cover_phases_and_chunks() {
    let store = Arc::new(
        MemoryStore::new()
            .with_chapter("ch1", "One", "alpha text")
            .with_chapter("ch2", "Two", "beta text"),
    );
    let provider = MockProvider::new();
    let job = controller(store, provider, JobConfig::default());
    let mut events = job.events();

    let report = job.run().await;
    assert_eq!(report.outcome, JobOutcome::Complete);

    let mut phases = Vec::new();
    let mut chunk_events = 0;
    while let Ok(event) = events.try_recv() {
        if event.chapter_index.is_some() {
            chunk_events += 1;
        } else {
            phases.push(event.phase);
        }
    }
    assert!(phases.contains(&JobPhase::Loading));
    assert!(phases.contains(&JobPhase::PreScanning));
    assert!(phases.contains(&JobPhase::Processing));
    assert!(phases.contains(&JobPhase::Finalizing));
    assert!(phases.contains(&JobPhase::Complete));
    assert!(chunk_events >= 2, "one event per completed chunk");
}

#[tokio::test]
async fn test_manager_start_wait_roundtrip() {
    let manager = JobManager::new();
    let store = Arc::new(MemoryStore::new().with_chapter("ch1", "One", "text to clean"));
    let provider = Arc::new(MockProvider::new());

    let job_id = manager
        .start(store, provider, JobConfig::default())
        .await;
    let report = manager.wait(job_id).await.expect("report");

    assert_eq!(report.job_id, job_id);
    assert_eq!(report.outcome, JobOutcome::Complete);
    assert!(manager.wait(job_id).await.is_none(), "report consumed");
}

#[tokio::test]
async fn test_manager_cancel_live_job() {
    let manager = JobManager::new();
    let text = (0..10)
        .map(|i| format!("{} paragraph {}.\n\n", "patient words ".repeat(30), i))
        .collect::<String>();
    let store = Arc::new(MemoryStore::new().with_chapter("ch1", "One", text));
    let provider = Arc::new(MockProvider::new().with_latency_ms(100));

    let job_id = manager
        .start(store, provider, JobConfig::default().with_chunk_size(500))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(manager.cancel(job_id).await, "live job found and signaled");
    let report = manager.wait(job_id).await.expect("report");
    assert_eq!(report.outcome, JobOutcome::Cancelled);
}

#[tokio::test]
async fn test_manager_cancel_unknown_job() {
    let manager = JobManager::new();
    assert!(!manager.cancel(uuid::Uuid::new_v4()).await);
}

#[tokio::test]
async fn test_fatal_mid_job_leaves_completed_chapters_persisted() {
    let store = Arc::new(
        MemoryStore::new()
            .with_chapter("ch1", "One", "short first chapter")
            .with_chapter("ch2", "Two", "short second chapter")
            .with_chapter("ch3", "Three", "short third chapter"),
    );
    // First two chunks succeed; the third hits quota exhaustion.
    let provider = FatalOnThird::new();
    let report = JobController::new(
        store.clone(),
        Arc::new(provider),
        JobConfig::default().with_workers(1),
    )
    .run()
    .await;

    match &report.outcome {
        JobOutcome::Failed(reason) => assert!(reason.contains("quota"), "reason: {}", reason),
        other => panic!("expected failure, got {:?}", other),
    }
    // Chapters that completed before the fatal error stay persisted.
    assert!(store.persisted_text("ch1").is_some());
    assert!(store.persisted_text("ch2").is_some());
    assert!(store.persisted_text("ch3").is_none());
}

/// Provider that echoes its first two inputs then fails fatally.
struct FatalOnThird {
    calls: std::sync::atomic::AtomicUsize,
}

impl FatalOnThird {
    fn new() -> Self {
        Self {
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl folio_core::TextProvider for FatalOnThird {
    async fn transform(
        &self,
        text: &str,
        _system_prompt: &str,
        _cancel: &folio_core::CancellationToken,
    ) -> std::result::Result<String, folio_core::ProviderError> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n >= 2 {
            return Err(folio_core::ProviderError::Fatal(
                "quota exhausted".to_string(),
            ));
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "fatal-on-third"
    }
}

#[tokio::test]
async fn test_reports_store_error_when_final_persist_fails() {
    let store = Arc::new(
        MemoryStore::new()
            .with_chapter("ch1", "One", "some text")
            .failing_persist(),
    );
    let provider = MockProvider::new();

    let report = controller(store, provider, JobConfig::default()).run().await;
    match report.outcome {
        JobOutcome::Failed(reason) => assert!(reason.contains("store error")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_no_content_variant_shape() {
    // NoContent formats with its detail message.
    let err = Error::NoContent("document has no chapters".to_string());
    assert_eq!(err.to_string(), "no content: document has no chapters");
}
