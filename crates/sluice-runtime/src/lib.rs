#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod definition;
pub mod engine;
mod error;
mod label;
pub mod pipeline;
pub mod registry;
pub mod source;

#[doc(hidden)]
pub mod prelude;

pub use error::{PipelineError, PipelineResult};
pub use label::Label;

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "sluice_runtime";
