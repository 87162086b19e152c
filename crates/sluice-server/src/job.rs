//! Background job bookkeeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use derive_more::{Debug, Display};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifier of a submitted job.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh job id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// The job is executing or queued for execution.
    Running,
    /// The job drained its pipeline and exited normally.
    Completed,
    /// The job aborted with an error.
    Failed,
    /// The job was cancelled before or during execution.
    Cancelled,
}

/// Snapshot of a job as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Job id.
    pub id: JobId,
    /// Label of the pipeline the job runs.
    pub pipeline: String,
    /// Current state.
    pub state: JobState,
    /// Failure message, present for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct JobEntry {
    pipeline: String,
    state: JobState,
    error: Option<String>,
    token: CancellationToken,
}

/// Shared map of submitted jobs.
///
/// Cheap to clone; all clones observe the same jobs.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new running job, returning its id and the token
    /// that cancels it.
    pub fn insert(&self, pipeline: impl Into<String>) -> (JobId, CancellationToken) {
        let id = JobId::generate();
        let token = CancellationToken::new();
        let entry = JobEntry {
            pipeline: pipeline.into(),
            state: JobState::Running,
            error: None,
            token: token.clone(),
        };
        self.lock().insert(id, entry);
        (id, token)
    }

    /// Marks a job completed.
    pub fn complete(&self, id: JobId) {
        self.transition(id, JobState::Completed, None);
    }

    /// Marks a job failed with its error message.
    pub fn fail(&self, id: JobId, error: impl Into<String>) {
        self.transition(id, JobState::Failed, Some(error.into()));
    }

    /// Marks a job cancelled.
    pub fn mark_cancelled(&self, id: JobId) {
        self.transition(id, JobState::Cancelled, None);
    }

    fn transition(&self, id: JobId, state: JobState, error: Option<String>) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.state = state;
            entry.error = error;
        }
    }

    /// Fires a job's cancellation token. Returns false for unknown ids.
    ///
    /// The job transitions to `Cancelled` once its task observes the
    /// token; a job that already finished keeps its terminal state.
    pub fn cancel(&self, id: JobId) -> bool {
        let guard = self.lock();
        let Some(entry) = guard.get(&id) else {
            return false;
        };
        entry.token.cancel();
        true
    }

    /// Returns a snapshot of one job.
    pub fn get(&self, id: JobId) -> Option<JobInfo> {
        self.lock().get(&id).map(|entry| snapshot(id, entry))
    }

    /// Returns snapshots of all jobs.
    pub fn list(&self) -> Vec<JobInfo> {
        self.lock()
            .iter()
            .map(|(id, entry)| snapshot(*id, entry))
            .collect()
    }
}

fn snapshot(id: JobId, entry: &JobEntry) -> JobInfo {
    JobInfo {
        id,
        pipeline: entry.pipeline.clone(),
        state: entry.state.clone(),
        error: entry.error.clone(),
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_transition() {
        let registry = JobRegistry::new();
        let (id, _token) = registry.insert("demo");

        let info = registry.get(id).expect("job missing");
        assert_eq!(info.state, JobState::Running);
        assert_eq!(info.pipeline, "demo");

        registry.complete(id);
        let info = registry.get(id).expect("job missing");
        assert_eq!(info.state, JobState::Completed);
    }

    #[test]
    fn test_cancel_fires_token() {
        let registry = JobRegistry::new();
        let (id, token) = registry.insert("demo");

        assert!(registry.cancel(id));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(JobId::generate()));
    }

    #[test]
    fn test_failed_job_keeps_message() {
        let registry = JobRegistry::new();
        let (id, _token) = registry.insert("demo");
        registry.fail(id, "source error: boom");

        let info = registry.get(id).expect("job missing");
        assert_eq!(info.state, JobState::Failed);
        assert_eq!(info.error.as_deref(), Some("source error: boom"));
    }
}
