//! Pipeline reconstruction from structural descriptions.

use serde_json::Value;

use crate::definition::{Def, PipelineDef};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{Chain, FanOperator, Pipeline, Stage};
use crate::registry::ActionRegistry;

/// Rebuilds executable pipelines from structural descriptions.
///
/// Action names are resolved through the borrowed registry; a failure
/// anywhere in the tree aborts the build, so no partially constructed
/// pipeline ever escapes.
#[derive(Debug, Clone, Copy)]
pub struct PipelineBuilder<'a> {
    registry: &'a ActionRegistry,
}

impl<'a> PipelineBuilder<'a> {
    /// Creates a builder resolving actions through the given registry.
    pub fn new(registry: &'a ActionRegistry) -> Self {
        Self { registry }
    }

    /// Parses a JSON value and rebuilds the pipeline it describes.
    pub fn build_value(&self, value: &Value) -> PipelineResult<Pipeline> {
        self.build(&Def::from_value(value)?)
    }

    /// Rebuilds a pipeline from its description.
    pub fn build(&self, def: &Def) -> PipelineResult<Pipeline> {
        let Def::Pipeline(pipeline_def) = def else {
            return Err(PipelineError::InvalidDefinition(format!(
                "expected a Pipeline definition, found: {}",
                def.tag()
            )));
        };
        self.build_pipeline(pipeline_def)
    }

    fn build_pipeline(&self, def: &PipelineDef) -> PipelineResult<Pipeline> {
        let chain = self.build_chain(&def.content)?;
        Pipeline::bounded(def.label.clone(), chain, &def.start, &def.end)
    }

    /// Collects the nesting outermost-first, then pushes stages onto
    /// the chain in upstream order.
    fn build_chain(&self, outermost: &Def) -> PipelineResult<Chain> {
        let mut defs = vec![outermost];
        let mut current = outermost;
        while let Some(input) = operator_input(current) {
            defs.push(input);
            current = input;
        }

        let mut chain = Chain::new();
        for def in defs.into_iter().rev() {
            let stage = self.build_stage(def)?;
            tracing::trace!(
                target: crate::TRACING_TARGET,
                stage = %stage,
                "stage rebuilt"
            );
            chain.push(stage)?;
        }
        Ok(chain)
    }

    fn build_stage(&self, def: &Def) -> PipelineResult<Stage> {
        let stage = match def {
            Def::Pipeline(_) => {
                return Err(PipelineError::InvalidDefinition(
                    "a Pipeline definition cannot nest as an operator input".into(),
                ));
            }
            Def::PipelineOperator(op) => {
                Stage::observe(self.registry.resolve(&op.action)?).with_label(op.label.clone())
            }
            Def::PipelineTransform(op) => {
                Stage::transform(self.registry.resolve(&op.action)?).with_label(op.label.clone())
            }
            Def::PipelineFilter(op) => {
                Stage::filter(self.registry.resolve(&op.action)?).with_label(op.label.clone())
            }
            Def::PipelineMap(map) => {
                let mut fan = FanOperator::new(map.fill_value.clone());
                for input in &map.inputs {
                    let Def::Pipeline(sub) = input else {
                        return Err(PipelineError::InvalidOperand(input.tag().to_string()));
                    };
                    fan.add_pipeline(self.build_pipeline(sub)?)?;
                }
                Stage::fan(fan).with_label(map.label.clone())
            }
        };
        Ok(stage)
    }
}

fn operator_input(def: &Def) -> Option<&Def> {
    match def {
        Def::PipelineOperator(op)
        | Def::PipelineTransform(op)
        | Def::PipelineFilter(op) => op.input.as_deref(),
        Def::Pipeline(_) | Def::PipelineMap(_) => None,
    }
}
