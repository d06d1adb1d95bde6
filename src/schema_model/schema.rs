use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::errors::SchemaError;
use super::types::{Cardinality, Direction, PaginationLimits, QueryDirection, ScalarKind, TypeRef};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalarField {
    pub name: String,
    pub kind: ScalarKind,
    pub nullable: bool,
    pub is_list: bool,
    /// Physical property name when it differs from the field name (`@alias`)
    pub alias: Option<String>,
    /// Substituted on read when the stored property is null
    pub default_value: Option<Value>,
}

impl ScalarField {
    /// Property name as stored in the graph.
    pub fn db_property(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipField {
    pub name: String,
    /// Physical edge label
    pub edge_label: String,
    pub direction: Direction,
    pub query_direction: QueryDirection,
    pub target: TypeRef,
    pub cardinality: Cardinality,
    /// Edge-property-type name, if the edge carries properties
    pub properties: Option<String>,
    /// Interface whose declared relationship this field implements
    pub declared_by: Option<String>,
}

/// What an escape-hatch field resolves to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CustomTarget {
    Scalar(ScalarKind),
    Entity(String),
}

/// A field resolved by a user supplied Cypher fragment instead of a
/// generated pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomField {
    pub name: String,
    pub statement: String,
    /// Column of the statement's RETURN that carries the field value
    pub column_name: String,
    pub target: CustomTarget,
    pub cardinality: Cardinality,
    /// Argument names the statement may reference as `$name`
    pub arguments: Vec<String>,
}

/// Lookup of scalar fields by name.
///
/// Implemented by every type that owns scalar fields (entities, interfaces,
/// edge-property-types) so filter and sort compilation can treat node and
/// edge scopes uniformly.
pub trait FieldContainer {
    fn type_name(&self) -> &str;

    fn scalar_fields(&self) -> &[ScalarField];

    fn scalar_field(&self, name: &str) -> Option<&ScalarField> {
        self.scalar_fields().iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub labels: Vec<String>,
    pub plural: String,
    pub implements: Vec<String>,
    pub fields: Vec<ScalarField>,
    pub relationships: Vec<RelationshipField>,
    pub custom_fields: Vec<CustomField>,
    pub limits: PaginationLimits,
}

impl Entity {
    /// The concrete relationship this entity supplies under `name`.
    ///
    /// For relationships declared on an interface, this is the capability
    /// lookup each implementing entity answers with its own edge label,
    /// direction and properties type.
    pub fn declares_relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn custom_field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|c| c.name == name)
    }

    pub fn has_labels(&self, labels: &[String]) -> bool {
        self.labels.iter().all(|l| labels.contains(l))
    }
}

impl FieldContainer for Entity {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn scalar_fields(&self) -> &[ScalarField] {
        &self.fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclaredRelationship {
    pub name: String,
    pub target: TypeRef,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub plural: String,
    pub fields: Vec<ScalarField>,
    pub declared_relationships: Vec<DeclaredRelationship>,
    /// Implementing entities, in definition order
    pub implementations: Vec<String>,
    pub limits: PaginationLimits,
}

impl Interface {
    pub fn declared_relationship(&self, name: &str) -> Option<&DeclaredRelationship> {
        self.declared_relationships.iter().find(|r| r.name == name)
    }
}

impl FieldContainer for Interface {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn scalar_fields(&self) -> &[ScalarField] {
        &self.fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Union {
    pub name: String,
    pub plural: String,
    pub members: Vec<String>,
}

/// Scalar fields attached to an edge rather than a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgePropertyType {
    pub name: String,
    pub fields: Vec<ScalarField>,
}

impl FieldContainer for EdgePropertyType {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn scalar_fields(&self) -> &[ScalarField] {
        &self.fields
    }
}

/// What a root-level field of a request resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum RootFieldKind {
    List(TypeRef),
    Connection(TypeRef),
    Aggregate(TypeRef),
    Custom(CustomField),
}

/// Read-only registry of every type the translator can compile against.
///
/// Built once (see [`super::config`]) and shared by reference into every
/// compilation; nothing mutates it afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    pub(crate) entities: Vec<Entity>,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) unions: Vec<Union>,
    pub(crate) edge_properties: Vec<EdgePropertyType>,
    pub(crate) enums: HashMap<String, Vec<String>>,
    pub(crate) root_fields: HashMap<String, RootFieldKind>,
    pub(crate) entity_index: HashMap<String, usize>,
    pub(crate) interface_index: HashMap<String, usize>,
    pub(crate) union_index: HashMap<String, usize>,
    pub(crate) edge_properties_index: HashMap<String, usize>,
}

impl SchemaModel {
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn unions(&self) -> &[Union] {
        &self.unions
    }

    pub fn entity(&self, name: &str) -> Result<&Entity, SchemaError> {
        self.entity_opt(name).ok_or_else(|| SchemaError::UnknownType {
            type_name: name.to_string(),
        })
    }

    pub fn entity_opt(&self, name: &str) -> Option<&Entity> {
        self.entity_index.get(name).map(|&i| &self.entities[i])
    }

    pub fn interface_opt(&self, name: &str) -> Option<&Interface> {
        self.interface_index.get(name).map(|&i| &self.interfaces[i])
    }

    pub fn union_opt(&self, name: &str) -> Option<&Union> {
        self.union_index.get(name).map(|&i| &self.unions[i])
    }

    pub fn edge_properties(&self, name: &str) -> Result<&EdgePropertyType, SchemaError> {
        self.edge_properties_opt(name)
            .ok_or_else(|| SchemaError::UnknownType {
                type_name: name.to_string(),
            })
    }

    pub fn edge_properties_opt(&self, name: &str) -> Option<&EdgePropertyType> {
        self.edge_properties_index
            .get(name)
            .map(|&i| &self.edge_properties[i])
    }

    pub fn is_edge_properties_name(&self, name: &str) -> bool {
        self.edge_properties_index.contains_key(name)
    }

    pub fn enum_values(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(|v| v.as_slice())
    }

    pub fn root_field(&self, name: &str) -> Result<&RootFieldKind, SchemaError> {
        self.root_fields
            .get(name)
            .ok_or_else(|| SchemaError::UnknownRootField {
                field: name.to_string(),
            })
    }

    /// Classify a type name.
    pub fn type_ref(&self, name: &str) -> Result<TypeRef, SchemaError> {
        if self.entity_index.contains_key(name) {
            Ok(TypeRef::Entity(name.to_string()))
        } else if self.interface_index.contains_key(name) {
            Ok(TypeRef::Interface(name.to_string()))
        } else if self.union_index.contains_key(name) {
            Ok(TypeRef::Union(name.to_string()))
        } else {
            Err(SchemaError::UnknownType {
                type_name: name.to_string(),
            })
        }
    }

    /// Concrete entities a type reference can resolve to at runtime, in
    /// definition order.
    pub fn concrete_entities(&self, target: &TypeRef) -> Result<Vec<&Entity>, SchemaError> {
        match target {
            TypeRef::Entity(name) => Ok(vec![self.entity(name)?]),
            TypeRef::Interface(name) => {
                let interface =
                    self.interface_opt(name)
                        .ok_or_else(|| SchemaError::UnknownType {
                            type_name: name.clone(),
                        })?;
                interface
                    .implementations
                    .iter()
                    .map(|e| self.entity(e))
                    .collect()
            }
            TypeRef::Union(name) => {
                let union = self
                    .union_opt(name)
                    .ok_or_else(|| SchemaError::UnknownType {
                        type_name: name.clone(),
                    })?;
                union.members.iter().map(|e| self.entity(e)).collect()
            }
        }
    }

    /// Pagination limits declared for a type reference.
    pub fn limits(&self, target: &TypeRef) -> PaginationLimits {
        match target {
            TypeRef::Entity(name) => self
                .entity_opt(name)
                .map(|e| e.limits)
                .unwrap_or_default(),
            TypeRef::Interface(name) => self
                .interface_opt(name)
                .map(|i| i.limits)
                .unwrap_or_default(),
            TypeRef::Union(_) => PaginationLimits::default(),
        }
    }

    /// Pick the concrete entity a stored node belongs to from its labels.
    ///
    /// Candidates are tried in order; the first whose full label set is
    /// carried by the node wins.
    pub fn resolve_type_by_labels<'a>(
        &self,
        candidates: &'a [String],
        labels: &[String],
    ) -> Option<&'a str> {
        candidates
            .iter()
            .find(|name| {
                self.entity_opt(name)
                    .map(|e| e.has_labels(labels))
                    .unwrap_or(false)
            })
            .map(|s| s.as_str())
    }
}
