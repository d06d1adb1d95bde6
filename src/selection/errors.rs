use thiserror::Error;

use crate::schema_model::SchemaError;

/// Errors raised while reading a request's selection tree and its `where` /
/// `sort` / paging arguments against the schema model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    #[error(transparent)]
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

    #[error("Invalid value for argument `{argument}`: {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl SelectionError {
    pub fn filter(
        type_name: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SelectionError::Filter {
            type_name: type_name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn polymorphic_branch(field: impl Into<String>, candidates: &[&str]) -> Self {
        SelectionError::PolymorphicBranch {
            field: field.into(),
            candidates: candidates.join(", "),
        }
    }

    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        SelectionError::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}
