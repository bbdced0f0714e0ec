//! Error types for mention-eval.

use thiserror::Error;

/// Result type for mention-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mention-eval operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input line (wrong field count, unparsable span or offset).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Structural invariant violation that makes scoring undefined:
    /// duplicate mention id, overlapping coreference clusters, duplicate
    /// span within a cluster, non-antisymmetric temporal edge.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Evaluation-stage error.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Error::Evaluation(msg.into())
    }
}
