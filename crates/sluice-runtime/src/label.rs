//! Labels identifying operators and pipelines.

use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a stage or pipeline.
///
/// Labels key the combined records a fan operator produces and anchor
/// the `start`/`end` boundaries of a serialized chain, so they must be
/// unique within their scope. A freshly generated label is the short
/// trailing segment of a random UUID.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    /// Creates a label from an existing identifier.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Generates a fresh short random label.
    pub fn generate() -> Self {
        let id = Uuid::new_v4().to_string();
        let short = id.rsplit('-').next().unwrap_or(&id);
        Self(short.to_string())
    }

    /// Returns the label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Label {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_labels_are_unique() {
        let a = Label::generate();
        let b = Label::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_label_serde_transparent() {
        let label = Label::from("steve");
        let json = serde_json::to_value(&label).expect("serialization failed");
        assert_eq!(json, serde_json::json!("steve"));
    }
}
