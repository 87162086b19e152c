//! In-memory sequence data source.

use serde::Deserialize;
use serde_json::Value;

use super::{DataSource, Producer};
use crate::error::{PipelineError, PipelineResult};

/// Data source replaying a fixed sequence of JSON values.
///
/// Stands in for external scan-style adapters when the data is already
/// at hand (fixtures, replays, ad-hoc runs).
#[derive(Debug, Clone)]
pub struct Values {
    items: Vec<Value>,
    cursor: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ValuesConfig {
    items: Vec<Value>,
}

impl Values {
    /// Creates a source over a fixed sequence.
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }

    /// Builds the source from a JSON configuration.
    ///
    /// Accepts either a bare array or an object with an `items` field.
    pub fn from_config(config: &Value) -> PipelineResult<Self> {
        if let Value::Array(items) = config {
            return Ok(Self::new(items.clone()));
        }
        let config: ValuesConfig = serde_json::from_value(config.clone())?;
        Ok(Self::new(config.items))
    }
}

impl Producer for Values {
    fn pull(&mut self) -> PipelineResult<Option<Value>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(PipelineError::Source(
                "values source is not connected".into(),
            ));
        };
        let Some(value) = self.items.get(*cursor) else {
            return Ok(None);
        };
        *cursor += 1;
        Ok(Some(value.clone()))
    }
}

impl DataSource for Values {
    fn connect(&mut self) -> PipelineResult<()> {
        self.cursor = Some(0);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        self.cursor = None;
        Ok(())
    }
}
