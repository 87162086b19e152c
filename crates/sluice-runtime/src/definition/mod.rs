//! Structural pipeline descriptions.
//!
//! A [`Def`] is the serializable form of a pipeline: a nesting of
//! tagged operator descriptions carrying action names instead of
//! action handles. Serialization walks a live chain outward-in;
//! reconstruction resolves the names back through an
//! [`ActionRegistry`](crate::registry::ActionRegistry) (see
//! [`engine`](crate::engine)).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use crate::label::Label;
use crate::pipeline::{Pipeline, Stage, StageKind};

/// The closed set of structural description tags.
const KNOWN_TAGS: [&str; 5] = [
    "Pipeline",
    "PipelineOperator",
    "PipelineTransform",
    "PipelineFilter",
    "PipelineMap",
];

/// A tagged structural description of a pipeline or one of its
/// operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Def {
    /// A bounded chain with its start/end labels.
    Pipeline(PipelineDef),
    /// A side-effecting pass-through operator.
    PipelineOperator(OperatorDef),
    /// A value-transforming operator.
    PipelineTransform(OperatorDef),
    /// A predicate-filtering operator.
    PipelineFilter(OperatorDef),
    /// A fan operator over sub-pipelines.
    PipelineMap(MapDef),
}

/// Description of a pipeline: its chain nesting plus the labels of the
/// stages bounding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
    /// Pipeline label.
    pub label: Label,
    /// Outermost operator of the chain, nesting inward via `input`.
    pub content: Box<Def>,
    /// Label of the innermost stage of the span.
    pub start: Label,
    /// Label of the outermost stage of the span.
    pub end: Label,
}

/// Description of a simple operator: its action name plus the operator
/// it consumes from, absent for the innermost one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDef {
    /// Operator label.
    pub label: Label,
    /// Qualified action name to resolve through the registry.
    pub action: String,
    /// Upstream operator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Box<Def>>,
}

/// Description of a fan operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDef {
    /// Operator label; not a record key.
    pub label: Label,
    /// Padding value for exhausted sub-pipelines.
    pub fill_value: Value,
    /// Sub-pipeline descriptions; every element must carry the
    /// `Pipeline` tag.
    pub inputs: Vec<Def>,
}

impl Def {
    /// Parses a structural description from a JSON value.
    ///
    /// Every `type` tag in the tree is checked against the closed set
    /// first, so an unknown operator kind surfaces as
    /// [`PipelineError::UnknownOperatorKind`] rather than a generic
    /// deserialization error.
    pub fn from_value(value: &Value) -> PipelineResult<Self> {
        validate_tags(value)?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Serializes the description to a JSON value.
    pub fn to_value(&self) -> PipelineResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Returns the description's `type` tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Def::Pipeline(_) => "Pipeline",
            Def::PipelineOperator(_) => "PipelineOperator",
            Def::PipelineTransform(_) => "PipelineTransform",
            Def::PipelineFilter(_) => "PipelineFilter",
            Def::PipelineMap(_) => "PipelineMap",
        }
    }
}

fn validate_tags(value: &Value) -> PipelineResult<()> {
    let Value::Object(map) = value else {
        return Err(PipelineError::InvalidDefinition(
            "definition must be a JSON object".into(),
        ));
    };
    let tag = map.get("type").and_then(Value::as_str).ok_or_else(|| {
        PipelineError::InvalidDefinition("definition is missing its type tag".into())
    })?;
    if !KNOWN_TAGS.contains(&tag) {
        return Err(PipelineError::UnknownOperatorKind(tag.to_string()));
    }
    if let Some(content) = map.get("content") {
        validate_tags(content)?;
    }
    if let Some(input) = map.get("input") {
        validate_tags(input)?;
    }
    if let Some(Value::Array(inputs)) = map.get("inputs") {
        for input in inputs {
            validate_tags(input)?;
        }
    }
    Ok(())
}

impl Pipeline {
    /// Serializes the pipeline into its structural description.
    ///
    /// The whole chain is encoded from the outermost stage inward;
    /// the span the pipeline executes is carried by the `start`/`end`
    /// labels rather than by truncating the nesting.
    pub fn to_def(&self) -> PipelineResult<Def> {
        let chain = self.chain_ref();
        let (_, end) = self.bounds();
        let mut ids: Vec<_> = chain.walk_upstream(end).collect();
        ids.reverse();

        let mut content: Option<Def> = None;
        for id in ids {
            if let Some(node) = chain.get(id) {
                content = Some(stage_to_def(&node.stage, content.take())?);
            }
        }
        let content = content.ok_or_else(|| {
            PipelineError::InvalidDefinition("pipeline spans no stages".into())
        })?;

        Ok(Def::Pipeline(PipelineDef {
            label: self.label().clone(),
            content: Box::new(content),
            start: self.start_label().clone(),
            end: self.end_label().clone(),
        }))
    }

    /// Serializes the pipeline to a JSON value.
    pub fn to_json(&self) -> PipelineResult<Value> {
        self.to_def()?.to_value()
    }
}

fn stage_to_def(stage: &Stage, input: Option<Def>) -> PipelineResult<Def> {
    let operator = |action: &crate::registry::NamedAction| OperatorDef {
        label: stage.label().clone(),
        action: action.name().to_string(),
        input: input.clone().map(Box::new),
    };
    Ok(match stage.kind() {
        StageKind::Observe(action) => Def::PipelineOperator(operator(action)),
        StageKind::Transform(action) => Def::PipelineTransform(operator(action)),
        StageKind::Filter(action) => Def::PipelineFilter(operator(action)),
        StageKind::Fan(fan) => Def::PipelineMap(MapDef {
            label: stage.label().clone(),
            fill_value: fan.fill_value().clone(),
            inputs: fan
                .sub_pipelines()
                .iter()
                .map(Pipeline::to_def)
                .collect::<PipelineResult<Vec<_>>>()?,
        }),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::{Chain, FanOperator};
    use crate::registry::ActionRegistry;

    fn chain_of(specs: &[(&str, &str, &str)]) -> Chain {
        let registry = ActionRegistry::with_builtins();
        let mut chain = Chain::new();
        for (kind, action, label) in specs {
            let action = registry.resolve(action).expect("resolve failed");
            let stage = match *kind {
                "observe" => Stage::observe(action),
                "transform" => Stage::transform(action),
                "filter" => Stage::filter(action),
                other => panic!("unknown stage kind: {other}"),
            };
            chain.push(stage.with_label(*label)).expect("push failed");
        }
        chain
    }

    #[test]
    fn test_serialize_chain_shape() {
        let chain = chain_of(&[
            ("filter", "math.is_odd", "pick"),
            ("transform", "math.square", "sq"),
        ]);
        let pipeline =
            Pipeline::from_chain_named("demo", chain).expect("pipeline build failed");

        let json = pipeline.to_json().expect("serialize failed");
        assert_eq!(
            json,
            json!({
                "type": "Pipeline",
                "label": "demo",
                "start": "pick",
                "end": "sq",
                "content": {
                    "type": "PipelineTransform",
                    "label": "sq",
                    "action": "math.square",
                    "input": {
                        "type": "PipelineFilter",
                        "label": "pick",
                        "action": "math.is_odd",
                    },
                },
            })
        );
    }

    #[test]
    fn test_serialize_fan() {
        let registry = ActionRegistry::with_builtins();
        let mut fan = FanOperator::new(json!(0));
        for (label, action) in [("sq", "math.square"), ("db", "math.double")] {
            let mut chain = Chain::new();
            chain
                .push(
                    Stage::transform(registry.resolve(action).expect("resolve failed"))
                        .with_label(format!("{label}-t")),
                )
                .expect("push failed");
            fan.add_pipeline(
                Pipeline::from_chain_named(label, chain).expect("pipeline build failed"),
            )
            .expect("add failed");
        }
        let mut chain = Chain::new();
        chain
            .push(Stage::fan(fan).with_label("zip"))
            .expect("push failed");
        let pipeline =
            Pipeline::from_chain_named("fanned", chain).expect("pipeline build failed");

        let def = pipeline.to_def().expect("serialize failed");
        let Def::Pipeline(pipeline_def) = &def else {
            panic!("expected a Pipeline def, got {}", def.tag());
        };
        let Def::PipelineMap(map_def) = pipeline_def.content.as_ref() else {
            panic!("expected a PipelineMap content");
        };
        assert_eq!(map_def.fill_value, json!(0));
        assert_eq!(map_def.inputs.len(), 2);
        assert!(map_def.inputs.iter().all(|input| input.tag() == "Pipeline"));
    }

    #[test]
    fn test_def_value_round_trip() {
        let chain = chain_of(&[("transform", "math.double", "x2")]);
        let pipeline =
            Pipeline::from_chain_named("rt", chain).expect("pipeline build failed");

        let def = pipeline.to_def().expect("serialize failed");
        let value = def.to_value().expect("to_value failed");
        let parsed = Def::from_value(&value).expect("from_value failed");
        assert_eq!(parsed, def);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let value = json!({
            "type": "Pipeline",
            "label": "bad",
            "start": "a",
            "end": "a",
            "content": { "type": "PipelineReduce", "label": "a", "action": "x" },
        });
        let result = Def::from_value(&value);
        assert!(matches!(
            result,
            Err(PipelineError::UnknownOperatorKind(tag)) if tag == "PipelineReduce"
        ));
    }

    #[test]
    fn test_missing_tag_rejected() {
        let result = Def::from_value(&json!({ "label": "untagged" }));
        assert!(matches!(result, Err(PipelineError::InvalidDefinition(_))));
    }

    #[test]
    fn test_innermost_operator_omits_input() {
        let chain = chain_of(&[("observe", "std.log", "peek")]);
        let pipeline =
            Pipeline::from_chain_named("lone", chain).expect("pipeline build failed");

        let json = pipeline.to_json().expect("serialize failed");
        assert_eq!(json["content"]["type"], json!("PipelineOperator"));
        assert!(json["content"].get("input").is_none());
    }
}
