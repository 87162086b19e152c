//! Operator chain arena.
//!
//! Stages live in an owned, indexable arena instead of a recursive
//! linked structure: each stage records its upstream by index, chains
//! are linear by construction, and walks over them are plain loops.

use std::fmt;

use serde_json::Value;

use super::fan::FanOperator;
use crate::error::{PipelineError, PipelineResult};
use crate::label::Label;
use crate::registry::NamedAction;

/// Index of a stage within its chain arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(pub(crate) usize);

/// The behavior of a single pull-based stage.
#[derive(Debug, strum::Display)]
pub enum StageKind {
    /// Side-effecting pass-through: invokes the action, forwards the
    /// original value unchanged.
    Observe(NamedAction),
    /// Replaces the value with the action's return value.
    Transform(NamedAction),
    /// Forwards only values for which the action returns a truthy
    /// result; re-signals end of stream when the upstream exhausts.
    Filter(NamedAction),
    /// Fan-out into sub-pipelines, zipped back into keyed records.
    /// Always the innermost stage of its chain.
    Fan(FanOperator),
}

/// A labeled stage ready to be pushed onto a chain.
#[derive(Debug)]
pub struct Stage {
    pub(crate) label: Label,
    pub(crate) kind: StageKind,
}

impl Stage {
    fn new(kind: StageKind) -> Self {
        Self {
            label: Label::generate(),
            kind,
        }
    }

    /// Creates a side-effecting pass-through stage.
    pub fn observe(action: NamedAction) -> Self {
        Self::new(StageKind::Observe(action))
    }

    /// Creates a value-transforming stage.
    pub fn transform(action: NamedAction) -> Self {
        Self::new(StageKind::Transform(action))
    }

    /// Creates a predicate-filtering stage.
    pub fn filter(action: NamedAction) -> Self {
        Self::new(StageKind::Filter(action))
    }

    /// Creates a fan stage.
    pub fn fan(fan: FanOperator) -> Self {
        Self::new(StageKind::Fan(fan))
    }

    /// Replaces the generated label with an explicit one.
    pub fn with_label(mut self, label: impl Into<Label>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns the stage label.
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Returns the stage kind.
    pub fn kind(&self) -> &StageKind {
        &self.kind
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.kind)
    }
}

#[derive(Debug)]
pub(crate) struct StageNode {
    pub(crate) stage: Stage,
    pub(crate) upstream: Option<StageId>,
}

/// An owned, linear sequence of stages.
///
/// `push` appends a stage whose upstream is the current tail, so the
/// first stage pushed is the innermost and the last is the outermost.
/// Upstream indices always point at earlier arena slots, which rules
/// out cycles structurally.
#[derive(Debug, Default)]
pub struct Chain {
    pub(crate) nodes: Vec<StageNode>,
}

impl Chain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage, linking it to the current tail.
    ///
    /// A fan stage is only accepted as the first stage: it replicates
    /// the external input itself and can never have an in-chain
    /// upstream. Stage labels anchor serialized boundaries, so they
    /// must be unique within the chain.
    pub fn push(&mut self, stage: Stage) -> PipelineResult<StageId> {
        if matches!(stage.kind, StageKind::Fan(_)) && !self.nodes.is_empty() {
            return Err(PipelineError::InvalidDefinition(
                "a fan operator must be the innermost stage of its chain".into(),
            ));
        }
        if self.find_label(&stage.label).is_some() {
            return Err(PipelineError::DuplicateLabel(stage.label));
        }
        let upstream = self.tail();
        let id = StageId(self.nodes.len());
        self.nodes.push(StageNode { stage, upstream });
        Ok(id)
    }

    /// Returns the innermost stage id, if any.
    pub fn head(&self) -> Option<StageId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(StageId(0))
        }
    }

    /// Returns the outermost stage id, if any.
    pub fn tail(&self) -> Option<StageId> {
        self.nodes.len().checked_sub(1).map(StageId)
    }

    /// Returns the number of stages.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn get(&self, id: StageId) -> Option<&StageNode> {
        self.nodes.get(id.0)
    }

    /// Finds the stage carrying a label.
    pub fn find_label(&self, label: &Label) -> Option<StageId> {
        self.nodes
            .iter()
            .position(|node| node.stage.label == *label)
            .map(StageId)
    }

    /// Walks upstream references starting at `from` (inclusive),
    /// yielding ids from outermost to innermost.
    pub(crate) fn walk_upstream(&self, from: StageId) -> UpstreamWalk<'_> {
        UpstreamWalk {
            chain: self,
            next: Some(from),
        }
    }
}

pub(crate) struct UpstreamWalk<'a> {
    chain: &'a Chain,
    next: Option<StageId>,
}

impl Iterator for UpstreamWalk<'_> {
    type Item = StageId;

    fn next(&mut self) -> Option<StageId> {
        let current = self.next?;
        self.next = self.chain.get(current).and_then(|node| node.upstream);
        Some(current)
    }
}

/// Truthiness of a JSON value, as filter stages interpret predicate
/// results: `null`, `false`, `0`, `""` and empty containers are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::ActionRegistry;

    fn action() -> NamedAction {
        ActionRegistry::with_builtins()
            .resolve("std.identity")
            .expect("resolve failed")
    }

    #[test]
    fn test_push_links_upstream() {
        let mut chain = Chain::new();
        let first = chain.push(Stage::transform(action())).expect("push failed");
        let second = chain.push(Stage::transform(action())).expect("push failed");

        assert_eq!(chain.head(), Some(first));
        assert_eq!(chain.tail(), Some(second));
        let walked: Vec<StageId> = chain.walk_upstream(second).collect();
        assert_eq!(walked, vec![second, first]);
    }

    #[test]
    fn test_fan_rejected_mid_chain() {
        let mut chain = Chain::new();
        chain.push(Stage::transform(action())).expect("push failed");
        let result = chain.push(Stage::fan(FanOperator::new(Value::Null)));
        assert!(matches!(result, Err(PipelineError::InvalidDefinition(_))));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut chain = Chain::new();
        chain
            .push(Stage::transform(action()).with_label("same"))
            .expect("push failed");
        let result = chain.push(Stage::filter(action()).with_label("same"));
        assert!(matches!(result, Err(PipelineError::DuplicateLabel(_))));
    }

    #[test]
    fn test_truthiness_table() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "expected falsy: {falsy}");
        }
        for truthy in [json!(true), json!(1), json!(-2), json!("x"), json!([0]), json!({"k": 0})] {
            assert!(is_truthy(&truthy), "expected truthy: {truthy}");
        }
    }
}
