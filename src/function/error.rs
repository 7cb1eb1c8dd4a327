//! Defines the error types raised by function capability calls.
use thiserror::Error;

/// A failure inside a function's `results`/`requirements` family of calls.
///
/// Functions are authored outside the resolver, so any of these is absorbed
/// by backtracking rather than surfaced directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("{0}")]
    Failed(String),
    #[error("function panicked: {0}")]
    Panicked(String),
}

impl FunctionError {
    pub fn failed(msg: impl Into<String>) -> Self {
        FunctionError::Failed(msg.into())
    }
}
