//! Named-action registry for pipeline reconstruction.
//!
//! Actions are unary transformations over JSON values, registered under
//! qualified names (`math.square`, `std.log`, ...). The registry is
//! populated at startup and treated as read-only afterwards; the
//! serializer writes action names into structural descriptions and the
//! builder resolves them back through this registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};

mod builtins;

pub use builtins::register_builtins;

/// A unary transformation handle over JSON values.
///
/// How the return value is interpreted depends on the operator kind:
/// pass-through stages ignore it, transform stages forward it, filter
/// stages test it for truthiness.
pub trait Action: Send + Sync {
    /// Applies the action to a single value.
    fn call(&self, value: Value) -> PipelineResult<Value>;
}

impl<F> Action for F
where
    F: Fn(Value) -> PipelineResult<Value> + Send + Sync,
{
    fn call(&self, value: Value) -> PipelineResult<Value> {
        self(value)
    }
}

/// An action paired with the qualified name it resolves under.
///
/// The name is what the serializer writes into a structural
/// description; the handle is what the chain invokes at pull time.
#[derive(Clone)]
pub struct NamedAction {
    name: String,
    handle: Arc<dyn Action>,
}

impl NamedAction {
    /// Creates a named action from a name and a handle.
    pub fn new(name: impl Into<String>, handle: Arc<dyn Action>) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    /// Returns the qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the action, attributing failures to its name.
    pub fn call(&self, value: Value) -> PipelineResult<Value> {
        self.handle.call(value).map_err(|error| match error {
            failed @ PipelineError::ActionFailed { .. } => failed,
            other => PipelineError::ActionFailed {
                name: self.name.clone(),
                message: other.to_string(),
            },
        })
    }
}

impl fmt::Debug for NamedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// In-memory action registry.
///
/// Stores actions by qualified name for lookup during reconstruction.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in actions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Registers an action under a qualified name.
    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn Action>) {
        self.actions.insert(name.into(), action);
    }

    /// Registers a closure under a qualified name.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: Fn(Value) -> PipelineResult<Value> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(action));
    }

    /// Resolves a qualified name to a named action.
    pub fn resolve(&self, name: &str) -> PipelineResult<NamedAction> {
        self.actions
            .get(name)
            .cloned()
            .map(|handle| NamedAction::new(name, handle))
            .ok_or_else(|| PipelineError::ActionNotFound(name.to_string()))
    }

    /// Returns whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Lists all registered names.
    pub fn list(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_resolve_registered_action() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("test.negate", |value| {
            Ok(json!(-value.as_i64().unwrap_or_default()))
        });

        let action = registry.resolve("test.negate").expect("resolve failed");
        assert_eq!(action.name(), "test.negate");
        assert_eq!(action.call(json!(3)).expect("call failed"), json!(-3));
    }

    #[test]
    fn test_resolve_unknown_action() {
        let registry = ActionRegistry::new();
        let result = registry.resolve("nope.missing");
        assert!(matches!(result, Err(PipelineError::ActionNotFound(name)) if name == "nope.missing"));
    }

    #[test]
    fn test_action_failure_is_attributed() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("test.boom", |_| {
            Err(PipelineError::Source("boom".into()))
        });

        let action = registry.resolve("test.boom").expect("resolve failed");
        let result = action.call(json!(1));
        assert!(
            matches!(result, Err(PipelineError::ActionFailed { name, .. }) if name == "test.boom")
        );
    }
}
