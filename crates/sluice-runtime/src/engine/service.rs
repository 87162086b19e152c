//! Execution service: compile a request, open its source, drain.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::compiler::PipelineBuilder;
use crate::error::PipelineResult;
use crate::pipeline::Pipeline;
use crate::registry::ActionRegistry;
use crate::source::{Connected, Producer, SourceRegistry, SourceSpec};

/// Execution limits and knobs for the service.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option), default)]
pub struct ServiceConfig {
    /// Caps the number of records a single drain may produce;
    /// unlimited when unset.
    pub max_records: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { max_records: None }
    }
}

/// A request to execute one pipeline over one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Structural pipeline description.
    pub pipeline: Value,
    /// Data source to bind as the pipeline input.
    pub source: SourceSpec,
}

/// Stateless execution front: holds the registries and turns run
/// requests into drained output sequences.
///
/// Each run is wholly synchronous and single-threaded; concurrency
/// between runs is the caller's business.
#[derive(Debug, Clone)]
pub struct PipelineService {
    actions: ActionRegistry,
    sources: SourceRegistry,
    config: ServiceConfig,
}

impl PipelineService {
    /// Creates a service with default limits.
    pub fn new(actions: ActionRegistry, sources: SourceRegistry) -> Self {
        Self::with_config(actions, sources, ServiceConfig::default())
    }

    /// Creates a service with explicit limits.
    pub fn with_config(
        actions: ActionRegistry,
        sources: SourceRegistry,
        config: ServiceConfig,
    ) -> Self {
        Self {
            actions,
            sources,
            config,
        }
    }

    /// Returns the action registry.
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Returns the source registry.
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Validates a request without executing it: the pipeline must
    /// compile and the source must build.
    pub fn prepare(&self, request: &RunRequest) -> PipelineResult<Pipeline> {
        self.sources.build(&request.source)?;
        PipelineBuilder::new(&self.actions).build_value(&request.pipeline)
    }

    /// Compiles the request, opens its source and drains the pipeline
    /// to exhaustion (or to the configured record cap), returning the
    /// ordered output.
    ///
    /// The source is disconnected on every exit path, including
    /// mid-drain failures.
    pub fn run_once(&self, request: &RunRequest) -> PipelineResult<Vec<Value>> {
        self.run_cancellable(request, || false)
    }

    /// Like [`PipelineService::run_once`], but checks `cancelled` at
    /// every pull boundary and stops the drain early when it returns
    /// true. Already produced output is returned, not discarded.
    pub fn run_cancellable(
        &self,
        request: &RunRequest,
        cancelled: impl Fn() -> bool,
    ) -> PipelineResult<Vec<Value>> {
        let mut pipeline = PipelineBuilder::new(&self.actions).build_value(&request.pipeline)?;
        let source = self.sources.build(&request.source)?;
        pipeline.chain(Box::new(Connected::open(source)?))?;

        tracing::info!(
            target: crate::TRACING_TARGET,
            pipeline = %pipeline.label(),
            source = %request.source.plugin,
            "run started"
        );

        let mut outputs = Vec::new();
        loop {
            if cancelled() {
                tracing::debug!(
                    target: crate::TRACING_TARGET,
                    pipeline = %pipeline.label(),
                    outputs = outputs.len(),
                    "run cancelled mid-drain"
                );
                break;
            }
            let Some(value) = pipeline.pull()? else { break };
            outputs.push(value);
            if self
                .config
                .max_records
                .is_some_and(|cap| outputs.len() >= cap)
            {
                tracing::debug!(
                    target: crate::TRACING_TARGET,
                    pipeline = %pipeline.label(),
                    cap = outputs.len(),
                    "record cap reached"
                );
                break;
            }
        }

        tracing::info!(
            target: crate::TRACING_TARGET,
            pipeline = %pipeline.label(),
            outputs = outputs.len(),
            "run finished"
        );
        Ok(outputs)
    }
}
