use thiserror::Error;

use crate::schema_model::SchemaError;
use crate::selection::SelectionError;

/// Compile-time failures. All of them are raised before anything reaches
/// the store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslatorError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid filter on `{type_name}.{field}`: {reason}")]
    Filter {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("Field `{field}` is not valid for any of the types [{candidates}]")]
    PolymorphicBranch { field: String, candidates: String },

    #[error("Invalid sort on `{type_name}`: {reason}")]
    InvalidSort { type_name: String, reason: String },

    #[error("Invalid argument `{argument}` on `{field}`: {reason}")]
    InvalidArgument {
        field: String,
        argument: String,
        reason: String,
    },

    #[error("Invalid custom statement for `{field}`: {reason}")]
    CustomStatement { field: String, reason: String },
}

impl From<SelectionError> for TranslatorError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::Schema(e) => TranslatorError::Schema(e),
            SelectionError::Filter {
                type_name,
                field,
                reason,
            } => TranslatorError::Filter {
                type_name,
                field,
                reason,
            },
            SelectionError::PolymorphicBranch { field, candidates } => {
                TranslatorError::PolymorphicBranch { field, candidates }
            }
            SelectionError::InvalidSort { type_name, reason } => {
                TranslatorError::InvalidSort { type_name, reason }
            }
            SelectionError::InvalidArgument { argument, reason } => {
                TranslatorError::InvalidArgument {
                    field: String::new(),
                    argument,
                    reason,
                }
            }
        }
    }
}

impl TranslatorError {
    /// Attach the selected field to an argument error raised without one.
    pub fn in_field(self, field: &str) -> Self {
        match self {
            TranslatorError::InvalidArgument {
                field: f,
                argument,
                reason,
            } if f.is_empty() => TranslatorError::InvalidArgument {
                field: field.to_string(),
                argument,
                reason,
            },
            other => other,
        }
    }

    pub fn invalid_argument(
        field: impl Into<String>,
        argument: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TranslatorError::InvalidArgument {
            field: field.into(),
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}
