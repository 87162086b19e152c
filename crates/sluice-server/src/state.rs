//! Shared application state.

use std::sync::Arc;

use sluice_runtime::engine::PipelineService;

use crate::job::JobRegistry;

/// State shared by every handler: the execution service plus the job
/// registry.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pipeline execution front.
    pub service: Arc<PipelineService>,
    /// Submitted jobs.
    pub jobs: JobRegistry,
}

impl AppState {
    /// Wraps a service with an empty job registry.
    pub fn new(service: PipelineService) -> Self {
        Self {
            service: Arc::new(service),
            jobs: JobRegistry::new(),
        }
    }
}
