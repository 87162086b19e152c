//! Fan operator: tee one stream into several sub-pipelines and zip the
//! results back into keyed records.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::Pipeline;
use crate::error::{PipelineError, PipelineResult};
use crate::source::Producer;

/// Replicates an input stream across sub-pipelines in lock step.
///
/// Each pull replicates upstream demand into every sub-pipeline and
/// combines one value per sub-pipeline into a record keyed by the
/// sub-pipeline labels. Sub-pipelines that exhaust early contribute the
/// fill value until every one of them is exhausted; only then does the
/// fan signal end of stream.
#[derive(Debug)]
pub struct FanOperator {
    fill_value: Value,
    sub_pipelines: Vec<Pipeline>,
    started: bool,
}

impl FanOperator {
    /// Creates a fan with the given padding value for exhausted
    /// sub-pipelines.
    pub fn new(fill_value: Value) -> Self {
        Self {
            fill_value,
            sub_pipelines: Vec::new(),
            started: false,
        }
    }

    /// Adds a sub-pipeline.
    ///
    /// Sub-pipeline labels key the combined records, so they must be
    /// unique within the fan. Fails once consumption has started.
    pub fn add_pipeline(&mut self, pipeline: Pipeline) -> PipelineResult<()> {
        if self.started {
            return Err(PipelineError::Rebind);
        }
        if self
            .sub_pipelines
            .iter()
            .any(|existing| existing.label() == pipeline.label())
        {
            return Err(PipelineError::DuplicateLabel(pipeline.label().clone()));
        }
        self.sub_pipelines.push(pipeline);
        Ok(())
    }

    /// Returns the padding value.
    pub fn fill_value(&self) -> &Value {
        &self.fill_value
    }

    /// Returns the sub-pipelines in record-key order.
    pub fn sub_pipelines(&self) -> &[Pipeline] {
        &self.sub_pipelines
    }

    /// Pulls one combined record, splitting the bound input across the
    /// sub-pipelines on first use.
    pub(crate) fn pull(
        &mut self,
        input: &mut Option<Box<dyn Producer>>,
    ) -> PipelineResult<Option<Value>> {
        if !self.started {
            let source = input.take().ok_or(PipelineError::InputNotBound)?;
            let shared = Rc::new(RefCell::new(TeeState::new(
                source,
                self.sub_pipelines.len(),
            )));
            for (index, sub) in self.sub_pipelines.iter_mut().enumerate() {
                sub.chain(Box::new(TeeBranch {
                    index,
                    shared: Rc::clone(&shared),
                }))?;
            }
            self.started = true;
        }

        let mut record = Map::with_capacity(self.sub_pipelines.len());
        let mut exhausted = true;
        for sub in &mut self.sub_pipelines {
            let value = match sub.pull()? {
                Some(value) => {
                    exhausted = false;
                    value
                }
                None => self.fill_value.clone(),
            };
            record.insert(sub.label().to_string(), value);
        }
        if exhausted {
            return Ok(None);
        }
        Ok(Some(Value::Object(record)))
    }
}

/// Shared tee over the fan's input.
///
/// Branches consume at different rates: a pull on a branch first drains
/// that branch's queue, and only then advances the underlying source,
/// cloning the new value into every sibling queue. Queue depth is
/// bounded by how far branches diverge within a single combined pull,
/// which the lock-step zip keeps at one element.
struct TeeState {
    source: Box<dyn Producer>,
    queues: Vec<VecDeque<Value>>,
    exhausted: bool,
}

impl TeeState {
    fn new(source: Box<dyn Producer>, branches: usize) -> Self {
        Self {
            source,
            queues: (0..branches).map(|_| VecDeque::new()).collect(),
            exhausted: false,
        }
    }

    fn pull_branch(&mut self, index: usize) -> PipelineResult<Option<Value>> {
        if let Some(value) = self.queues[index].pop_front() {
            return Ok(Some(value));
        }
        if self.exhausted {
            return Ok(None);
        }
        match self.source.pull()? {
            Some(value) => {
                for (sibling, queue) in self.queues.iter_mut().enumerate() {
                    if sibling != index {
                        queue.push_back(value.clone());
                    }
                }
                Ok(Some(value))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

/// One branch of the tee, bound as a sub-pipeline's input.
struct TeeBranch {
    index: usize,
    shared: Rc<RefCell<TeeState>>,
}

impl Producer for TeeBranch {
    fn pull(&mut self) -> PipelineResult<Option<Value>> {
        self.shared.borrow_mut().pull_branch(self.index)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::{Chain, Stage};
    use crate::registry::ActionRegistry;
    use crate::source::IterProducer;

    fn sub(label: &str, action: &str) -> Pipeline {
        let registry = ActionRegistry::with_builtins();
        let mut chain = Chain::new();
        chain
            .push(Stage::transform(
                registry.resolve(action).expect("resolve failed"),
            ))
            .expect("push failed");
        Pipeline::from_chain_named(label, chain).expect("pipeline build failed")
    }

    /// Sub-pipeline that only passes values below a threshold, to give
    /// each branch a different effective length.
    fn below(label: &str, threshold: i64) -> Pipeline {
        let mut registry = ActionRegistry::new();
        registry.register_fn("test.below", move |value| {
            Ok(json!(value.as_i64().is_some_and(|v| v < threshold)))
        });
        let mut chain = Chain::new();
        chain
            .push(Stage::filter(
                registry.resolve("test.below").expect("resolve failed"),
            ))
            .expect("push failed");
        Pipeline::from_chain_named(label, chain).expect("pipeline build failed")
    }

    #[test]
    fn test_fan_zips_branches_into_records() {
        let mut fan = FanOperator::new(Value::Null);
        fan.add_pipeline(sub("square", "math.square"))
            .expect("add failed");
        fan.add_pipeline(sub("double", "math.double"))
            .expect("add failed");

        let mut input: Option<Box<dyn Producer>> =
            Some(Box::new(IterProducer::new(vec![json!(2), json!(3)])));
        assert_eq!(
            fan.pull(&mut input).expect("pull failed"),
            Some(json!({ "square": 4, "double": 4 }))
        );
        assert_eq!(
            fan.pull(&mut input).expect("pull failed"),
            Some(json!({ "square": 9, "double": 6 }))
        );
        assert_eq!(fan.pull(&mut input).expect("pull failed"), None);
    }

    #[test]
    fn test_fan_pads_exhausted_branches() {
        // Branch lengths 3, 5 and 4 over five input values: exhausted
        // branches contribute the fill value until the longest one
        // ends, so five combined records come out.
        let mut fan = FanOperator::new(json!(-1));
        fan.add_pipeline(below("a", 3)).expect("add failed");
        fan.add_pipeline(sub("b", "std.identity")).expect("add failed");
        fan.add_pipeline(below("c", 4)).expect("add failed");

        let mut input: Option<Box<dyn Producer>> = Some(Box::new(IterProducer::new(
            (0..5).map(Value::from).collect::<Vec<_>>(),
        )));

        let mut records = Vec::new();
        while let Some(record) = fan.pull(&mut input).expect("pull failed") {
            records.push(record);
        }
        assert_eq!(
            records,
            vec![
                json!({ "a": 0, "b": 0, "c": 0 }),
                json!({ "a": 1, "b": 1, "c": 1 }),
                json!({ "a": 2, "b": 2, "c": 2 }),
                json!({ "a": -1, "b": 3, "c": 3 }),
                json!({ "a": -1, "b": 4, "c": -1 }),
            ]
        );
    }

    #[test]
    fn test_fan_rejects_duplicate_labels() {
        let mut fan = FanOperator::new(Value::Null);
        fan.add_pipeline(sub("dup", "math.square"))
            .expect("add failed");
        let result = fan.add_pipeline(sub("dup", "math.double"));
        assert!(matches!(result, Err(PipelineError::DuplicateLabel(_))));
    }

    #[test]
    fn test_fan_requires_input() {
        let mut fan = FanOperator::new(Value::Null);
        fan.add_pipeline(sub("only", "std.identity"))
            .expect("add failed");
        let mut input: Option<Box<dyn Producer>> = None;
        assert!(matches!(
            fan.pull(&mut input),
            Err(PipelineError::InputNotBound)
        ));
    }

    #[test]
    fn test_fan_rejects_pipeline_after_start() {
        let mut fan = FanOperator::new(Value::Null);
        fan.add_pipeline(sub("first", "std.identity"))
            .expect("add failed");
        let mut input: Option<Box<dyn Producer>> =
            Some(Box::new(IterProducer::new(vec![json!(1)])));
        fan.pull(&mut input).expect("pull failed");

        let result = fan.add_pipeline(sub("late", "std.identity"));
        assert!(matches!(result, Err(PipelineError::Rebind)));
    }
}
