//! Schema Model: the static registry of entities, relationships, interfaces,
//! unions and edge-property-types every compiler stage reads from.

pub mod config;
pub mod errors;
pub mod schema;
pub mod types;

pub use errors::SchemaError;
pub use schema::{
    CustomField, CustomTarget, DeclaredRelationship, EdgePropertyType, Entity, FieldContainer,
    Interface, RelationshipField, RootFieldKind, ScalarField, SchemaModel, Union,
};
pub use types::{Cardinality, Direction, PaginationLimits, QueryDirection, ScalarKind, TypeRef};
