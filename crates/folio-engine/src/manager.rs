//! Job control surface: start, cancel, and await jobs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use folio_core::{DocumentStore, EventBus, JobConfig, ProgressEvent, TextProvider};

use crate::controller::{JobController, JobReport};

struct JobHandle {
    cancel: CancellationToken,
    task: JoinHandle<JobReport>,
}

/// Registry of live jobs sharing one event bus.
///
/// Each job runs on its own task with its own cancellation token; the
/// manager only holds the token and the join handle. Clones share the
/// registry and bus.
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<Uuid, JobHandle>>>,
    bus: EventBus,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            bus: EventBus::new(),
        }
    }

    /// Subscribe to progress events from all jobs.
    pub fn events(&self) -> broadcast::Receiver<ProgressEvent> {
        self.bus.subscribe()
    }

    /// Start a job and return its id immediately.
    pub async fn start(
        &self,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn TextProvider>,
        config: JobConfig,
    ) -> Uuid {
        let controller = JobController::new(store, provider, config).with_bus(self.bus.clone());
        let job_id = controller.job_id();
        let cancel = controller.cancel_token();

        let task = tokio::spawn(async move { controller.run().await });
        self.jobs
            .write()
            .await
            .insert(job_id, JobHandle { cancel, task });

        info!(job_id = %job_id, "Job registered");
        job_id
    }

    /// Signal cancellation for a job. Returns whether a live job was
    /// found and signaled.
    pub async fn cancel(&self, job_id: Uuid) -> bool {
        let jobs = self.jobs.read().await;
        match jobs.get(&job_id) {
            Some(handle) if !handle.task.is_finished() => {
                info!(job_id = %job_id, "Cancellation requested");
                handle.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Await a job's report, removing it from the registry. Returns None
    /// for unknown jobs or jobs whose task failed.
    pub async fn wait(&self, job_id: Uuid) -> Option<JobReport> {
        let handle = self.jobs.write().await.remove(&job_id)?;
        handle.task.await.ok()
    }

    /// Number of registered jobs whose task has not finished.
    pub async fn running_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|h| !h.task.is_finished())
            .count()
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}
