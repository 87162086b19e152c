//! Convenience re-exports for downstream crates.

pub use crate::definition::{Def, MapDef, OperatorDef, PipelineDef};
pub use crate::engine::{PipelineBuilder, PipelineService, RunRequest, ServiceConfig};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::label::Label;
pub use crate::pipeline::{Chain, FanOperator, Pipeline, Stage, StageId, StageKind};
pub use crate::registry::{Action, ActionRegistry, NamedAction};
pub use crate::source::{
    Connected, DataSource, Integers, IterProducer, Producer, SourceRegistry, SourceSpec, Values,
};
