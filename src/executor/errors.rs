use thiserror::Error;

use crate::result_shaper::ShapeError;
use crate::translator::TranslatorError;

/// Failure reported by a [`super::GraphStore`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Store rejected the statement: {message}")]
    Query {
        message: String,
        /// Store-specific status code, when the store reports one
        code: Option<String>,
    },

    #[error("Store connection failed: {0}")]
    Connection(String),
}

impl StoreError {
    pub fn message(&self) -> &str {
        match self {
            StoreError::Query { message, .. } => message,
            StoreError::Connection(message) => message,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutorError {
    #[error(transparent)]
    Translate(#[from] TranslatorError),

    #[error("Forbidden: {message}")]
    Authorization { message: String },

    #[error("Statement execution failed: {0}")]
    StoreExecution(StoreError),

    #[error("Failed to shape store records: {0}")]
    Shape(#[from] ShapeError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Statement did not complete within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ExecutorError {
    /// Classify a store failure: a failure raised by a validate-mode auth
    /// rule carries `forbidden_marker` in its message.
    pub fn from_store(err: StoreError, forbidden_marker: &str) -> Self {
        if !forbidden_marker.is_empty() && err.message().contains(forbidden_marker) {
            ExecutorError::Authorization {
                message: err.message().to_string(),
            }
        } else {
            ExecutorError::StoreExecution(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_marker_maps_to_authorization() {
        let err = StoreError::Query {
            message: "Failed to invoke procedure: CYPHERQL_FORBIDDEN".to_string(),
            code: Some("Neo.ClientError.Procedure.ProcedureCallFailed".to_string()),
        };
        assert!(matches!(
            ExecutorError::from_store(err, "CYPHERQL_FORBIDDEN"),
            ExecutorError::Authorization { .. }
        ));

        let err = StoreError::Connection("refused".to_string());
        assert_eq!(
            ExecutorError::from_store(err.clone(), "CYPHERQL_FORBIDDEN"),
            ExecutorError::StoreExecution(err)
        );
    }
}
