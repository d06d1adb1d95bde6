use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShapeError {
    #[error("Invalid {kind} value `{value}`")]
    InvalidTemporal { kind: String, value: String },

    #[error("Invalid ISO-8601 duration `{value}`")]
    InvalidDuration { value: String },

    #[error("Invalid point: {reason}")]
    InvalidPoint { reason: String },

    #[error("Field `{field}` expected {expected}, store returned {found}")]
    UnexpectedValue {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Store record has no column `{column}`")]
    MissingColumn { column: String },

    #[error("No candidate type of `{type_name}` matches labels [{labels}]")]
    UnresolvedType { type_name: String, labels: String },
}

impl ShapeError {
    pub fn unexpected(field: &str, expected: &str, found: impl std::fmt::Debug) -> Self {
        ShapeError::UnexpectedValue {
            field: field.to_string(),
            expected: expected.to_string(),
            found: format!("{:?}", found),
        }
    }
}
