//! Request handlers for the pipeline trigger API.
//!
//! Configurations are validated eagerly so a bad request fails with a
//! 400 before any job is registered; execution itself happens on the
//! blocking pool, one job per task, and is reported through the job
//! registry.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sluice_runtime::engine::RunRequest;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::job::{JobId, JobInfo, JobRegistry};
use crate::state::AppState;

/// Pause between rounds of a repeated job.
const REPEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Response for an accepted job submission.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    /// Always true for accepted submissions.
    pub ok: bool,
    /// Id of the spawned job.
    pub job: JobId,
}

/// Response listing all jobs.
#[derive(Debug, Serialize)]
pub struct JobList {
    /// Always true.
    pub ok: bool,
    /// Snapshots of every submitted job.
    pub jobs: Vec<JobInfo>,
}

/// Body of a cancellation request.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Id of the job to cancel.
    pub job: JobId,
}

/// Runs a configuration once in the background.
pub async fn run_once(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let (id, token) = accept(&state, &request)?;
    let service = Arc::clone(&state.service);
    let jobs = state.jobs.clone();
    tokio::task::spawn_blocking(move || {
        if token.is_cancelled() {
            jobs.mark_cancelled(id);
            return;
        }
        let result = service.run_cancellable(&request, || token.is_cancelled());
        if token.is_cancelled() && result.is_ok() {
            jobs.mark_cancelled(id);
            return;
        }
        finish(&jobs, id, result);
    });
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { ok: true, job: id })))
}

/// Re-runs a configuration until the job is cancelled or a round
/// fails.
pub async fn run_repeatedly(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let (id, token) = accept(&state, &request)?;
    let service = Arc::clone(&state.service);
    let jobs = state.jobs.clone();
    tokio::task::spawn_blocking(move || {
        loop {
            if token.is_cancelled() {
                jobs.mark_cancelled(id);
                return;
            }
            if let Err(error) = service.run_cancellable(&request, || token.is_cancelled()) {
                tracing::error!(
                    target: crate::TRACING_TARGET,
                    job = %id,
                    error = %error,
                    "repeated job failed"
                );
                jobs.fail(id, error.to_string());
                return;
            }
            std::thread::sleep(REPEAT_INTERVAL);
        }
    });
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { ok: true, job: id })))
}

/// Lists all submitted jobs.
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobList> {
    Json(JobList {
        ok: true,
        jobs: state.jobs.list(),
    })
}

/// Cancels a job by id.
pub async fn cancel_job(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<JobAccepted>, ApiError> {
    if !state.jobs.cancel(request.job) {
        return Err(ApiError::JobNotFound(request.job));
    }
    tracing::info!(
        target: crate::TRACING_TARGET,
        job = %request.job,
        "job cancellation requested"
    );
    Ok(Json(JobAccepted {
        ok: true,
        job: request.job,
    }))
}

/// Validates the request and registers the job.
fn accept(
    state: &AppState,
    request: &RunRequest,
) -> Result<(JobId, CancellationToken), ApiError> {
    let pipeline = state.service.prepare(request).map_err(ApiError::bad_request)?;
    let (id, token) = state.jobs.insert(pipeline.label().to_string());
    tracing::info!(
        target: crate::TRACING_TARGET,
        job = %id,
        pipeline = %pipeline.label(),
        "job accepted"
    );
    Ok((id, token))
}

fn finish(
    jobs: &JobRegistry,
    id: JobId,
    result: sluice_runtime::PipelineResult<Vec<serde_json::Value>>,
) {
    match result {
        Ok(outputs) => {
            tracing::info!(
                target: crate::TRACING_TARGET,
                job = %id,
                outputs = outputs.len(),
                "job completed"
            );
            jobs.complete(id);
        }
        Err(error) => {
            tracing::error!(
                target: crate::TRACING_TARGET,
                job = %id,
                error = %error,
                "job failed"
            );
            jobs.fail(id, error.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use sluice_runtime::engine::PipelineService;

    // The service is shared across blocking tasks behind an Arc.
    #[test]
    fn test_service_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineService>();
    }
}
