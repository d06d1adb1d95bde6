//! `sort` argument parsing.
//!
//! `sort` is a list of objects. Keys keep their written order, both across
//! the list and inside each object, and that order is the tie-break
//! priority of the resulting keys.

use serde_json::Value;

use super::errors::SelectionError;
use super::filter::{NodeScope, AGGREGATE_SUFFIX};
use crate::cypher::ast::SortDirection;
use crate::schema_model::{CustomTarget, EdgePropertyType, FieldContainer, SchemaError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortTarget {
    /// Scalar node field
    Field(String),
    /// Scalar field resolved by a custom statement
    Custom(String),
    /// Number of related nodes over a relationship
    AggregateCount(String),
    /// Scalar property of the traversed edge (connection sorts only)
    Edge(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub target: SortTarget,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn is_scalar_field(&self) -> bool {
        matches!(self.target, SortTarget::Field(_))
    }
}

fn direction(value: &Value, type_name: &str) -> Result<SortDirection, SelectionError> {
    match value.as_str() {
        Some("ASC") => Ok(SortDirection::Asc),
        Some("DESC") => Ok(SortDirection::Desc),
        _ => Err(SelectionError::InvalidSort {
            type_name: type_name.to_string(),
            reason: format!("expected ASC or DESC, got {}", value),
        }),
    }
}

fn invalid(type_name: &str, reason: impl Into<String>) -> SelectionError {
    SelectionError::InvalidSort {
        type_name: type_name.to_string(),
        reason: reason.into(),
    }
}

/// Parse a `sort` argument.
///
/// `edge_types` is `Some` for connection fields, where keys are wrapped in
/// `node` / `edge` objects; it lists the edge-property-types the traversed
/// relationship can carry.
pub fn parse_sort(
    value: &Value,
    scope: &NodeScope<'_>,
    edge_types: Option<&[&EdgePropertyType]>,
) -> Result<Vec<SortKey>, SelectionError> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => return Err(invalid(&scope.type_name, "expected a list of sort objects")),
    };

    let mut keys = Vec::new();
    for item in items {
        let object = item
            .as_object()
            .ok_or_else(|| invalid(&scope.type_name, "expected a sort object"))?;
        for (key, val) in object {
            match (edge_types, key.as_str()) {
                (Some(_), "node") => {
                    let inner = val
                        .as_object()
                        .ok_or_else(|| invalid(&scope.type_name, "`node` expects an object"))?;
                    for (k, v) in inner {
                        keys.push(node_key(k, v, scope)?);
                    }
                }
                (Some(types), "edge") => {
                    let inner = val
                        .as_object()
                        .ok_or_else(|| invalid(&scope.type_name, "`edge` expects an object"))?;
                    for (k, v) in inner {
                        keys.push(edge_key(k, v, types, &scope.type_name)?);
                    }
                }
                (Some(_), other) => {
                    return Err(invalid(
                        &scope.type_name,
                        format!("connection sorts are keyed by node or edge, got `{}`", other),
                    ))
                }
                (None, _) => keys.push(node_key(key, val, scope)?),
            }
        }
    }
    Ok(keys)
}

fn node_key(key: &str, value: &Value, scope: &NodeScope<'_>) -> Result<SortKey, SelectionError> {
    if let Some(field) = scope.candidates.iter().find_map(|e| e.scalar_field(key)) {
        if field.is_list || field.kind.is_spatial() {
            return Err(invalid(
                &scope.type_name,
                format!("cannot sort by `{}` of type {}", key, field.kind),
            ));
        }
        return Ok(SortKey {
            target: SortTarget::Field(key.to_string()),
            direction: direction(value, &scope.type_name)?,
        });
    }

    if scope.candidates.iter().any(|e| {
        e.custom_field(key).is_some_and(|c| {
            matches!(c.target, CustomTarget::Scalar(_)) && !c.cardinality.is_list()
        })
    }) {
        return Ok(SortKey {
            target: SortTarget::Custom(key.to_string()),
            direction: direction(value, &scope.type_name)?,
        });
    }

    if let Some(relationship) = key.strip_suffix(AGGREGATE_SUFFIX) {
        if scope
            .candidates
            .iter()
            .any(|e| e.declares_relationship(relationship).is_some())
        {
            let count = value
                .as_object()
                .and_then(|o| o.get("count"))
                .filter(|_| value.as_object().map(|o| o.len()) == Some(1))
                .ok_or_else(|| {
                    invalid(&scope.type_name, format!("`{}` sorts only by count", key))
                })?;
            return Ok(SortKey {
                target: SortTarget::AggregateCount(relationship.to_string()),
                direction: direction(count, &scope.type_name)?,
            });
        }
    }

    if scope.candidates.len() > 1 {
        let names: Vec<&str> = scope.candidates.iter().map(|e| e.name.as_str()).collect();
        Err(SelectionError::polymorphic_branch(key, &names))
    } else {
        Err(SchemaError::field_error_with_context(&scope.type_name, key, "While parsing `sort`").into())
    }
}

fn edge_key(
    key: &str,
    value: &Value,
    types: &[&EdgePropertyType],
    type_name: &str,
) -> Result<SortKey, SelectionError> {
    match types.iter().find_map(|t| t.scalar_field(key)) {
        Some(field) if field.is_list || field.kind.is_spatial() => Err(invalid(
            type_name,
            format!("cannot sort by edge property `{}` of type {}", key, field.kind),
        )),
        Some(_) => Ok(SortKey {
            target: SortTarget::Edge(key.to_string()),
            direction: direction(value, type_name)?,
        }),
        None if types.len() > 1 => {
            let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
            Err(SelectionError::polymorphic_branch(key, &names))
        }
        None => Err(invalid(
            type_name,
            format!("the relationship has no edge property `{}`", key),
        )),
    }
}
