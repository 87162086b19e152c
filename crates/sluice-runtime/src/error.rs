//! Pipeline error types.

use thiserror::Error;

use crate::label::Label;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while building or running pipelines.
///
/// End of stream is not an error: every pull signals it as `Ok(None)`
/// and it propagates unchanged through all operator layers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A structural description carries a `type` tag outside the closed set.
    #[error("unknown operator kind: {0}")]
    UnknownOperatorKind(String),

    /// Reconstruction could not resolve an action name in the registry.
    #[error("action not found in registry: {0}")]
    ActionNotFound(String),

    /// A fan operator input that is not a `Pipeline` definition.
    #[error("fan input must be a Pipeline definition, found: {0}")]
    InvalidOperand(String),

    /// The start-label walk exhausted the chain without a match.
    #[error("start label not found in chain: {0}")]
    StartLabelNotFound(Label),

    /// A label that must be unique occurs more than once.
    #[error("duplicate label: {0}")]
    DuplicateLabel(Label),

    /// An input was attached after consumption had already begun.
    #[error("input already bound and consumption has started")]
    Rebind,

    /// A pipeline was pulled without a bound input producer.
    #[error("pipeline has no input bound")]
    InputNotBound,

    /// An action returned an error while processing a value.
    #[error("action {name} failed: {message}")]
    ActionFailed {
        /// Qualified name of the failing action.
        name: String,
        /// Error message.
        message: String,
    },

    /// A data source failed to connect, pull or disconnect.
    #[error("source error: {0}")]
    Source(String),

    /// The pipeline definition is structurally invalid.
    #[error("invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
