//! Reconstruction and execution.
//!
//! [`PipelineBuilder`] turns structural descriptions back into live
//! pipelines; [`PipelineService`] packages that with source handling
//! into a one-call execution front.

mod compiler;
mod service;

pub use compiler::PipelineBuilder;
pub use service::{PipelineService, RunRequest, ServiceConfig, ServiceConfigBuilder};
