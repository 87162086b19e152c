//! Pull-based pipelines over operator chains.
//!
//! A [`Pipeline`] spans a contiguous run of stages in a [`Chain`] and
//! drives them by demand: every pull asks the bound input for a raw
//! value and pushes it through the stages from innermost to outermost.
//! Nothing moves until the downstream side pulls.

use std::fmt;

use serde_json::Value;

mod chain;
mod fan;

pub use chain::{Chain, Stage, StageId, StageKind};
pub use fan::FanOperator;

use chain::is_truthy;

use crate::error::{PipelineError, PipelineResult};
use crate::label::Label;
use crate::source::Producer;

/// A labeled, bounded view over a chain, driven by pulls.
///
/// The pipeline owns its chain and an optional input producer. Input
/// binding is one-shot once consumption starts: [`Pipeline::chain`]
/// may replace the input freely before the first pull and fails with
/// [`PipelineError::Rebind`] afterwards.
pub struct Pipeline {
    label: Label,
    chain: Chain,
    start: StageId,
    end: StageId,
    /// Stage ids from innermost to outermost within `start..=end`.
    path: Vec<StageId>,
    input: Option<Box<dyn Producer>>,
    started: bool,
}

impl Pipeline {
    /// Creates a pipeline over `start..=end` with a generated label.
    pub fn new(chain: Chain, start: StageId, end: StageId) -> PipelineResult<Self> {
        Self::named(Label::generate(), chain, start, end)
    }

    /// Creates a labeled pipeline over `start..=end`.
    pub fn named(
        label: impl Into<Label>,
        chain: Chain,
        start: StageId,
        end: StageId,
    ) -> PipelineResult<Self> {
        let path = resolve_path(&chain, start, end)?;
        Ok(Self {
            label: label.into(),
            chain,
            start,
            end,
            path,
            input: None,
            started: false,
        })
    }

    /// Creates a pipeline spanning the whole chain.
    pub fn from_chain(chain: Chain) -> PipelineResult<Self> {
        Self::from_chain_named(Label::generate(), chain)
    }

    /// Creates a labeled pipeline spanning the whole chain.
    pub fn from_chain_named(label: impl Into<Label>, chain: Chain) -> PipelineResult<Self> {
        let (Some(start), Some(end)) = (chain.head(), chain.tail()) else {
            return Err(PipelineError::InvalidDefinition(
                "pipeline requires a non-empty chain".into(),
            ));
        };
        Self::named(label, chain, start, end)
    }

    /// Creates a labeled pipeline bounded by stage labels.
    ///
    /// The end label is located anywhere in the chain; the start label
    /// is then searched walking upstream from the end. A fan stage
    /// short-circuits the walk: it has no in-chain upstream, so it
    /// becomes the start whatever the start label says.
    pub fn bounded(
        label: impl Into<Label>,
        chain: Chain,
        start: &Label,
        end: &Label,
    ) -> PipelineResult<Self> {
        let end_id = chain.find_label(end).ok_or_else(|| {
            PipelineError::InvalidDefinition(format!("end label not found in chain: {end}"))
        })?;
        let mut start_id = None;
        for id in chain.walk_upstream(end_id) {
            let Some(node) = chain.get(id) else { break };
            if node.stage.label == *start {
                start_id = Some(id);
                break;
            }
            if matches!(node.stage.kind, StageKind::Fan(_)) {
                start_id = Some(id);
                break;
            }
        }
        let start_id =
            start_id.ok_or_else(|| PipelineError::StartLabelNotFound(start.clone()))?;
        Self::named(label, chain, start_id, end_id)
    }

    /// Returns the pipeline label.
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Returns the label of the innermost stage.
    pub fn start_label(&self) -> &Label {
        self.chain.nodes[self.start.0].stage.label()
    }

    /// Returns the label of the outermost stage.
    pub fn end_label(&self) -> &Label {
        self.chain.nodes[self.end.0].stage.label()
    }

    /// Returns the number of stages the pipeline spans.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// Returns whether the pipeline spans no stages. Never true for a
    /// constructed pipeline.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub(crate) fn chain_ref(&self) -> &Chain {
        &self.chain
    }

    pub(crate) fn bounds(&self) -> (StageId, StageId) {
        (self.start, self.end)
    }

    /// Binds the input producer feeding the innermost stage.
    ///
    /// Replaces any previously bound input. Fails once consumption has
    /// started.
    pub fn chain(&mut self, input: Box<dyn Producer>) -> PipelineResult<()> {
        if self.started {
            return Err(PipelineError::Rebind);
        }
        self.input = Some(input);
        Ok(())
    }

    /// Drains the pipeline to exhaustion, collecting every output.
    pub fn execute(&mut self) -> PipelineResult<Vec<Value>> {
        let mut outputs = Vec::new();
        while let Some(value) = self.pull()? {
            outputs.push(value);
        }
        tracing::debug!(
            target: crate::TRACING_TARGET,
            pipeline = %self.label,
            outputs = outputs.len(),
            "pipeline drained"
        );
        Ok(outputs)
    }
}

impl Producer for Pipeline {
    /// Pulls the next output value.
    ///
    /// Each iteration takes one raw value from the input (or one
    /// combined record from a fan head) and applies the remaining
    /// stages in order. A filter rejection discards the value and
    /// restarts with the next raw one, so a single downstream pull may
    /// consume several upstream values. `Ok(None)` from the input
    /// propagates unchanged through every stage.
    fn pull(&mut self) -> PipelineResult<Option<Value>> {
        self.started = true;
        'next: loop {
            let head = self.path[0];
            let raw = match &mut self.chain.nodes[head.0].stage.kind {
                StageKind::Fan(fan) => fan.pull(&mut self.input)?,
                _ => match self.input.as_mut() {
                    Some(input) => input.pull()?,
                    None => return Err(PipelineError::InputNotBound),
                },
            };
            let Some(mut value) = raw else {
                return Ok(None);
            };

            let fan_head = matches!(self.chain.nodes[head.0].stage.kind, StageKind::Fan(_));
            let rest = if fan_head { &self.path[1..] } else { &self.path[..] };
            for &id in rest {
                let node = &self.chain.nodes[id.0];
                match &node.stage.kind {
                    StageKind::Observe(action) => {
                        action.call(value.clone())?;
                    }
                    StageKind::Transform(action) => {
                        value = action.call(value)?;
                    }
                    StageKind::Filter(action) => {
                        if !is_truthy(&action.call(value.clone())?) {
                            continue 'next;
                        }
                    }
                    // unreachable: Chain::push only accepts a fan as
                    // the first stage
                    StageKind::Fan(_) => {
                        return Err(PipelineError::InvalidDefinition(
                            "fan operator found past the innermost stage".into(),
                        ));
                    }
                }
            }
            return Ok(Some(value));
        }
    }
}

fn resolve_path(chain: &Chain, start: StageId, end: StageId) -> PipelineResult<Vec<StageId>> {
    let start_label = chain
        .get(start)
        .map(|node| node.stage.label().clone())
        .ok_or_else(|| {
            PipelineError::InvalidDefinition("start stage id out of bounds".into())
        })?;
    if chain.get(end).is_none() {
        return Err(PipelineError::InvalidDefinition(
            "end stage id out of bounds".into(),
        ));
    }
    let mut path: Vec<StageId> = Vec::new();
    for id in chain.walk_upstream(end) {
        path.push(id);
        if id == start {
            path.reverse();
            return Ok(path);
        }
    }
    Err(PipelineError::StartLabelNotFound(start_label))
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("label", &self.label)
            .field("stages", &self.path.len())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
