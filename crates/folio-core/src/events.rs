//! Progress event types and event bus for job observation.
//!
//! The controller and scheduler publish typed progress events to any number
//! of subscribers over a broadcast channel. Subscribers are passive: a slow
//! or absent consumer never blocks the pipeline (emission is
//! fire-and-forget), and chunk-completion timestamps may arrive out of
//! order across workers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::defaults;
use crate::models::JobPhase;

/// One progress record, emitted per phase transition and per completed
/// chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub phase: JobPhase,
    /// Chunks completed so far in the job (also `chunks_completed`; kept
    /// separate so consumers can render "n of m" without extra state).
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub percentage: f32,
    pub message: String,
    /// Chapter index for chunk/chapter-scoped events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_index: Option<usize>,
    pub chunks_completed: usize,
    pub completed_at: DateTime<Utc>,
}

impl ProgressEvent {
    /// Build a phase-transition event with no chunk progress attached.
    pub fn phase(job_id: Uuid, phase: JobPhase, total_chunks: usize, message: impl Into<String>) -> Self {
        Self {
            job_id,
            phase,
            current_chunk: 0,
            total_chunks,
            percentage: 0.0,
            message: message.into(),
            chapter_index: None,
            chunks_completed: 0,
            completed_at: Utc::now(),
        }
    }

    /// Build a chunk-completion event.
    pub fn chunk(
        job_id: Uuid,
        completed: usize,
        total: usize,
        chapter_index: usize,
        message: impl Into<String>,
    ) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (completed as f32 / total as f32) * 100.0
        };
        Self {
            job_id,
            phase: JobPhase::Processing,
            current_chunk: completed,
            total_chunks: total,
            percentage,
            message: message.into(),
            chapter_index: Some(chapter_index),
            chunks_completed: completed,
            completed_at: Utc::now(),
        }
    }
}

/// Broadcast bus for progress events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(defaults::EVENT_BUS_CAPACITY)
    }

    /// Create a bus with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Fire-and-forget: a send with no subscribers is not
    /// an error.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_event_fields() {
        let job_id = Uuid::new_v4();
        let event = ProgressEvent::phase(job_id, JobPhase::Loading, 0, "loading chapters");

        assert_eq!(event.job_id, job_id);
        assert_eq!(event.phase, JobPhase::Loading);
        assert_eq!(event.current_chunk, 0);
        assert!(event.chapter_index.is_none());
        assert_eq!(event.message, "loading chapters");
    }

    #[test]
    fn test_chunk_event_percentage() {
        let event = ProgressEvent::chunk(Uuid::new_v4(), 5, 20, 1, "chunk done");
        assert!((event.percentage - 25.0).abs() < f32::EPSILON);
        assert_eq!(event.chapter_index, Some(1));
        assert_eq!(event.chunks_completed, 5);
    }

    #[test]
    fn test_chunk_event_zero_total() {
        let event = ProgressEvent::chunk(Uuid::new_v4(), 0, 0, 0, "");
        assert!((event.percentage - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_event_serializes_without_none_chapter() {
        let event = ProgressEvent::phase(Uuid::new_v4(), JobPhase::Complete, 4, "done");
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("chapter_index"));
        assert!(json.contains("\"phase\":\"complete\""));
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(ProgressEvent::phase(
            Uuid::new_v4(),
            JobPhase::Processing,
            10,
            "started",
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.phase, JobPhase::Processing);
        assert_eq!(received.total_chunks, 10);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        // Must not panic or error.
        bus.emit(ProgressEvent::phase(
            Uuid::new_v4(),
            JobPhase::Loading,
            0,
            "nobody listening",
        ));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(ProgressEvent::chunk(Uuid::new_v4(), 1, 2, 0, "one"));

        assert_eq!(rx1.recv().await.unwrap().current_chunk, 1);
        assert_eq!(rx2.recv().await.unwrap().current_chunk, 1);
    }
}
