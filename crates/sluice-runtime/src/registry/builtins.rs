//! Built-in named actions.
//!
//! A small catalogue of generally useful actions registered under
//! stable qualified names, so that configurations produced elsewhere
//! resolve out of the box.

use serde_json::Value;

use super::ActionRegistry;
use crate::error::{PipelineError, PipelineResult};

/// Registers the built-in actions into a registry.
pub fn register_builtins(registry: &mut ActionRegistry) {
    registry.register_fn("std.identity", Ok);
    registry.register_fn("std.log", log);
    registry.register_fn("math.square", square);
    registry.register_fn("math.double", double);
    registry.register_fn("math.is_odd", is_odd);
    registry.register_fn("math.is_even", is_even);
}

/// Logs the value and passes it through unchanged.
fn log(value: Value) -> PipelineResult<Value> {
    tracing::info!(target: crate::TRACING_TARGET, value = %value, "std.log");
    Ok(value)
}

fn square(value: Value) -> PipelineResult<Value> {
    match &value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i * i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::from(f * f))
            } else {
                Err(non_numeric("math.square", &value))
            }
        }
        _ => Err(non_numeric("math.square", &value)),
    }
}

fn double(value: Value) -> PipelineResult<Value> {
    match &value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i * 2))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::from(f * 2.0))
            } else {
                Err(non_numeric("math.double", &value))
            }
        }
        _ => Err(non_numeric("math.double", &value)),
    }
}

fn is_odd(value: Value) -> PipelineResult<Value> {
    match value.as_i64() {
        Some(i) => Ok(Value::Bool(i % 2 != 0)),
        None => Err(non_numeric("math.is_odd", &value)),
    }
}

fn is_even(value: Value) -> PipelineResult<Value> {
    match value.as_i64() {
        Some(i) => Ok(Value::Bool(i % 2 == 0)),
        None => Err(non_numeric("math.is_even", &value)),
    }
}

fn non_numeric(name: &str, value: &Value) -> PipelineError {
    PipelineError::ActionFailed {
        name: name.to_string(),
        message: format!("expected a number, got: {value}"),
    }
}
