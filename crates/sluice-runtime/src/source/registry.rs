//! Data-source plugin registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DataSource, Integers, Values};
use crate::error::{PipelineError, PipelineResult};

/// Factory building a data source from its JSON configuration.
pub type SourceFactory =
    Arc<dyn Fn(&Value) -> PipelineResult<Box<dyn DataSource>> + Send + Sync>;

/// Declarative selection of a data source: plugin name plus its config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Registered plugin name.
    pub plugin: String,
    /// Plugin-specific configuration.
    #[serde(default)]
    pub config: Value,
}

impl SourceSpec {
    /// Creates a spec for a plugin with its configuration.
    pub fn new(plugin: impl Into<String>, config: Value) -> Self {
        Self {
            plugin: plugin.into(),
            config,
        }
    }
}

/// In-memory registry of data-source plugins.
///
/// Populated at startup and treated as read-only afterwards, like the
/// action registry.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in sources.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("integers", |config| {
            Ok(Box::new(Integers::from_config(config)?) as Box<dyn DataSource>)
        });
        registry.register("values", |config| {
            Ok(Box::new(Values::from_config(config)?) as Box<dyn DataSource>)
        });
        registry
    }

    /// Registers a source factory under a plugin name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> PipelineResult<Box<dyn DataSource>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Returns whether a plugin name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a data source from a spec.
    pub fn build(&self, spec: &SourceSpec) -> PipelineResult<Box<dyn DataSource>> {
        let factory = self.factories.get(&spec.plugin).ok_or_else(|| {
            PipelineError::Source(format!("unknown source plugin: {}", spec.plugin))
        })?;
        factory(&spec.config)
    }

    /// Lists all registered plugin names.
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("plugins", &self.list())
            .finish()
    }
}
