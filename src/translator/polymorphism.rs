//! Concrete-branch expansion for interface and union typed fields.
//!
//! A polymorphic field compiles once per concrete entity it may resolve to.
//! Each branch carries the entity, and when the field is a relationship,
//! the edge label and edge-property-type that entity supplies.

use super::errors::TranslatorError;
use crate::cypher::ast::Expr;
use crate::result_shaper::TypeResolution;
use crate::schema_model::{EdgePropertyType, Entity, RelationshipField, SchemaModel, TypeRef};

/// One concrete resolution of a (possibly polymorphic) relationship.
#[derive(Debug, Clone, Copy)]
pub struct ConcreteBranch<'s> {
    pub entity: &'s Entity,
    pub relationship: &'s RelationshipField,
    pub properties: Option<&'s EdgePropertyType>,
}

/// A relationship resolved against the schema: its edge-property-type and
/// every entity its target can resolve to, in definition order.
#[derive(Debug, Clone)]
pub struct Expansion<'s> {
    pub relationship: &'s RelationshipField,
    pub properties: Option<&'s EdgePropertyType>,
    pub candidates: Vec<&'s Entity>,
}

impl<'s> Expansion<'s> {
    pub fn is_polymorphic(&self) -> bool {
        self.candidates.len() > 1
    }

    pub fn branches(&self) -> impl Iterator<Item = ConcreteBranch<'s>> + '_ {
        self.candidates.iter().map(move |&entity| ConcreteBranch {
            entity,
            relationship: self.relationship,
            properties: self.properties,
        })
    }
}

/// Expand a relationship (as declared by the entity it was selected on)
/// into its concrete branches.
pub fn expand<'s>(
    schema: &'s SchemaModel,
    relationship: &'s RelationshipField,
) -> Result<Expansion<'s>, TranslatorError> {
    let properties = match &relationship.properties {
        Some(name) => Some(schema.edge_properties(name)?),
        None => None,
    };
    Ok(Expansion {
        relationship,
        properties,
        candidates: schema.concrete_entities(&relationship.target)?,
    })
}

/// How the shaper names the runtime type of nodes of `target`.
pub fn type_resolution(target: &TypeRef, candidates: &[&Entity]) -> TypeResolution {
    match candidates {
        [only] => TypeResolution::Static(only.name.clone()),
        _ => TypeResolution::Labels {
            type_name: target.name().to_string(),
            candidates: candidates
                .iter()
                .map(|e| (e.name.clone(), e.labels.clone()))
                .collect(),
        },
    }
}

/// `labels(var)`, projected for label-based type resolution.
pub fn labels_of(var: &str) -> Expr {
    Expr::call("labels", vec![Expr::var(var)])
}
