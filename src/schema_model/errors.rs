//! # Schema Model Error Types
//!
//! Errors raised while building the schema model from a definition document
//! and while resolving request fields against it.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: a request names a type, field or relationship the model
//!   does not know. These are surfaced to the caller as validation failures
//!   before any compilation happens.
//! - **Definition Errors**: the definition document is inconsistent (unknown
//!   targets, missing interface implementations, duplicate names).
//! - **Configuration Errors**: file I/O and parsing issues while loading.
//!
//! ```ignore
//! SchemaError::field_error_with_context(
//!     "Movie",
//!     "ratng",
//!     "While compiling `where` of root field `movies`"
//! )
//! ```

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Unknown type `{type_name}`")]
    UnknownType { type_name: String },

    #[error("Type `{type_name}` has no field `{field}`")]
    UnknownField { type_name: String, field: String },

    #[error("Type `{type_name}` has no relationship `{relationship}`")]
    UnknownRelationship {
        type_name: String,
        relationship: String,
    },

    #[error("Unknown root field `{field}`")]
    UnknownRootField { field: String },

    #[error("Duplicate definition of `{name}`")]
    Duplicate { name: String },

    #[error("Field `{type_name}.{field}` has unknown scalar type `{scalar}`")]
    InvalidScalarType {
        type_name: String,
        field: String,
        scalar: String,
    },

    #[error("Entity `{entity}` implements `{interface}` but does not supply `{member}`")]
    MissingImplementation {
        entity: String,
        interface: String,
        member: String,
    },

    #[error("Union `{union_name}` member `{member}` is not an entity")]
    InvalidUnionMember { union_name: String, member: String },

    #[error("Relationship `{type_name}.{relationship}` references unknown properties type `{properties}`")]
    UnknownPropertiesType {
        type_name: String,
        relationship: String,
        properties: String,
    },

    #[error("Failed to read schema definition: {error}")]
    ConfigReadError { error: String },

    #[error("Failed to parse schema definition: {error}")]
    ConfigParseError { error: String },

    #[error("Invalid schema definition: {message}")]
    InvalidConfig { message: String },
}

impl SchemaError {
    /// Create an UnknownField error carrying the operation that hit it.
    pub fn field_error_with_context(
        type_name: impl Into<String>,
        field: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        SchemaError::UnknownField {
            type_name: type_name.into(),
            field: format!("{}\n  Context: {}", field.into(), context.into()),
        }
    }

    /// Create an UnknownType error carrying the operation that hit it.
    pub fn type_error_with_context(
        type_name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        SchemaError::UnknownType {
            type_name: format!("{}\n  Context: {}", type_name.into(), context.into()),
        }
    }
}
