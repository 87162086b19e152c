//! Counter data source.

use serde::Deserialize;
use serde_json::Value;

use super::{DataSource, Producer};
use crate::error::{PipelineError, PipelineResult};

/// Data source producing consecutive integers from `skip` up to `limit`.
///
/// Mostly useful for demos and for exercising pipelines end to end
/// without external infrastructure.
#[derive(Debug, Clone)]
pub struct Integers {
    limit: i64,
    skip: i64,
    cursor: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IntegersConfig {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    skip: i64,
}

fn default_limit() -> i64 {
    1000
}

impl Integers {
    /// Creates a source producing `0..limit`.
    pub fn new(limit: i64) -> Self {
        Self::with_skip(limit, 0)
    }

    /// Creates a source producing `skip..limit`.
    pub fn with_skip(limit: i64, skip: i64) -> Self {
        Self {
            limit,
            skip,
            cursor: None,
        }
    }

    /// Builds the source from a JSON configuration (`limit`, `skip`).
    pub fn from_config(config: &Value) -> PipelineResult<Self> {
        let config: IntegersConfig = serde_json::from_value(config.clone())?;
        Ok(Self::with_skip(config.limit, config.skip))
    }
}

impl Producer for Integers {
    fn pull(&mut self) -> PipelineResult<Option<Value>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(PipelineError::Source(
                "integers source is not connected".into(),
            ));
        };
        if *cursor >= self.limit {
            return Ok(None);
        }
        let value = Value::from(*cursor);
        *cursor += 1;
        Ok(Some(value))
    }
}

impl DataSource for Integers {
    fn connect(&mut self) -> PipelineResult<()> {
        self.cursor = Some(self.skip);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        self.cursor = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn drain(source: &mut Integers) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(value) = source.pull().expect("pull failed") {
            out.push(value);
        }
        out
    }

    #[test]
    fn test_integers_produces_range() {
        let mut source = Integers::new(3);
        source.connect().expect("connect failed");
        assert_eq!(drain(&mut source), vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_integers_with_skip() {
        let mut source = Integers::with_skip(5, 3);
        source.connect().expect("connect failed");
        assert_eq!(drain(&mut source), vec![json!(3), json!(4)]);
    }

    #[test]
    fn test_integers_requires_connection() {
        let mut source = Integers::new(3);
        assert!(matches!(source.pull(), Err(PipelineError::Source(_))));
    }

    #[test]
    fn test_integers_from_config_defaults() {
        let source =
            Integers::from_config(&json!({ "limit": 10 })).expect("config parse failed");
        assert_eq!(source.limit, 10);
        assert_eq!(source.skip, 0);
    }
}
