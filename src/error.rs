//! Error taxonomy for the query engine.
//!
//! Validation failures are raised before execution and name the offending
//! clause; execution failures never swallow an error silently.

use thiserror::Error;

use crate::value::ValueType;

/// Errors that can occur while validating or executing a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid query in {clause}: {message}")]
    InvalidQuery { clause: String, message: String },

    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch { expected: ValueType, found: ValueType },

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid_query(clause: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::InvalidQuery {
            clause: clause.into(),
            message: message.into(),
        }
    }

    pub fn type_mismatch(expected: ValueType, found: ValueType) -> Self {
        EngineError::TypeMismatch { expected, found }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
