//! Sort compilation.
//!
//! Keys keep their parsed order; the first key has the highest priority and
//! every later key only breaks ties of the keys before it.

use super::custom_cypher::scalar_value_call;
use super::errors::TranslatorError;
use super::polymorphism::expand;
use super::predicate::{label_condition, read_property, traversal_pattern, Condition};
use super::CompileContext;
use crate::cypher::ast::{Clause, Expr, Literal, OrderItem, ProjectionItem};
use crate::schema_model::{EdgePropertyType, Entity, FieldContainer};
use crate::selection::{SortKey, SortTarget};

/// Edge bound alongside the sorted node, for `edge` keys of connections.
#[derive(Debug, Clone, Copy)]
pub struct EdgeBinding<'a> {
    pub var: &'a str,
    pub properties: Option<&'a EdgePropertyType>,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledSort {
    pub order_by: Vec<OrderItem>,
    /// Subqueries computing sort values; they must run before the ordering
    pub preludes: Vec<Clause>,
}

/// Compile keys for one concrete entity bound as `var`.
pub fn compile_sort<'s>(
    ctx: &mut CompileContext<'s>,
    keys: &[SortKey],
    entity: &'s Entity,
    var: &str,
    edge: Option<EdgeBinding<'_>>,
) -> Result<CompiledSort, TranslatorError> {
    let mut compiled = CompiledSort::default();
    for key in keys {
        if let Some(expr) = sort_value(ctx, key, entity, var, edge, &mut compiled.preludes)? {
            compiled.order_by.push(OrderItem {
                expr,
                direction: key.direction,
            });
        }
    }
    Ok(compiled)
}

fn sort_value<'s>(
    ctx: &mut CompileContext<'s>,
    key: &SortKey,
    entity: &'s Entity,
    var: &str,
    edge: Option<EdgeBinding<'_>>,
    preludes: &mut Vec<Clause>,
) -> Result<Option<Expr>, TranslatorError> {
    match &key.target {
        SortTarget::Field(name) => Ok(entity
            .scalar_field(name)
            .map(|field| read_property(ctx, var, field))),
        SortTarget::Edge(name) => {
            let Some(binding) = edge else {
                return Ok(None);
            };
            Ok(binding
                .properties
                .and_then(|p| p.scalar_field(name))
                .map(|field| read_property(ctx, binding.var, field)))
        }
        SortTarget::Custom(name) => {
            let Some(custom) = entity.custom_field(name) else {
                return Ok(None);
            };
            let (call, value_var) = scalar_value_call(ctx, custom, var)?;
            preludes.push(call);
            Ok(Some(Expr::var(value_var)))
        }
        SortTarget::AggregateCount(name) => {
            let Some(relationship) = entity.declares_relationship(name) else {
                return Ok(None);
            };
            let directed = relationship
                .query_direction
                .resolve(None)
                .map_err(|reason| TranslatorError::invalid_argument(name, "directed", reason))?;
            let targets = expand(ctx.schema, relationship)?.candidates;
            let node_var = ctx.names.node();
            let count_var = ctx.names.value();

            let (labels, restriction) = match targets.as_slice() {
                [only] => (only.labels.clone(), Condition::Always),
                many => (
                    Vec::new(),
                    Condition::or(many.iter().map(|e| label_condition(&node_var, e)).collect()),
                ),
            };
            let pattern = traversal_pattern(var, relationship, directed, None, &node_var, labels);
            preludes.push(Clause::call(
                vec![var.to_string()],
                vec![
                    Clause::matching(pattern, restriction.into_where()),
                    Clause::returning(vec![ProjectionItem::aliased(
                        Expr::call("count", vec![Expr::var(&node_var)]),
                        &count_var,
                    )]),
                ],
            ));
            Ok(Some(Expr::var(count_var)))
        }
    }
}

/// Hidden projection key carrying the `index`-th sort value of a branch.
pub fn hidden_key(index: usize) -> String {
    format!("__sort{}", index)
}

/// Keys usable to merge-sort the branches of a polymorphic field.
///
/// Field keys must be carried by every branch; a key only some branches
/// carry is dropped. Keys that need a per-branch subquery cannot be merged.
pub fn shared_keys(
    keys: &[SortKey],
    type_name: &str,
    branches: &[&Entity],
) -> Result<Vec<SortKey>, TranslatorError> {
    let mut shared = Vec::with_capacity(keys.len());
    for key in keys {
        match &key.target {
            SortTarget::Field(name) => {
                if branches.iter().all(|e| e.scalar_field(name).is_some()) {
                    shared.push(key.clone());
                } else {
                    log::warn!(
                        "sort key `{}` is not carried by every type of `{}`, ignoring it",
                        name,
                        type_name
                    );
                }
            }
            SortTarget::Edge(_) => shared.push(key.clone()),
            SortTarget::Custom(name) | SortTarget::AggregateCount(name) => {
                return Err(TranslatorError::InvalidSort {
                    type_name: type_name.to_string(),
                    reason: format!("`{}` cannot order a polymorphic list", name),
                })
            }
        }
    }
    Ok(shared)
}

/// `__sortN: <value>` entries projected by one branch.
pub fn branch_sort_entries<'s>(
    ctx: &mut CompileContext<'s>,
    keys: &[SortKey],
    entity: &'s Entity,
    var: &str,
    edge: Option<EdgeBinding<'_>>,
) -> Result<Vec<(String, Expr)>, TranslatorError> {
    let mut entries = Vec::with_capacity(keys.len());
    // shared keys never need preludes
    let mut preludes = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let value = sort_value(ctx, key, entity, var, edge, &mut preludes)?
            .unwrap_or(Expr::Literal(Literal::Null));
        entries.push((hidden_key(i), value));
    }
    Ok(entries)
}

/// Ordering over the hidden keys of merged branch rows bound as `var`.
pub fn merged_order(keys: &[SortKey], var: &str) -> Vec<OrderItem> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| OrderItem {
            expr: Expr::property(Expr::var(var), hidden_key(i)),
            direction: key.direction,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher::ast::SortDirection;
    use crate::cypher::ToCypher;
    use crate::schema_model::test_fixtures::movies_schema;
    use crate::selection::{parse_sort, NodeScope};
    use crate::translator::{AuthPredicates, TranslatorSettings};
    use serde_json::json;

    fn order_text(order: &[OrderItem]) -> String {
        order
            .iter()
            .map(|o| o.to_cypher())
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[test]
    fn test_tie_break_keeps_declared_order() {
        let schema = movies_schema();
        let auth = AuthPredicates::default();
        let settings = TranslatorSettings::default();
        let mut ctx = CompileContext::new(&schema, &auth, &settings);
        let movie = schema.entity("Movie").unwrap();
        let keys = parse_sort(
            &json!([{"title": "ASC"}, {"rating": "DESC"}]),
            &NodeScope::entity(movie),
            None,
        )
        .unwrap();

        let sort = compile_sort(&mut ctx, &keys, movie, "this", None).unwrap();
        assert!(sort.preludes.is_empty());
        assert_eq!(
            order_text(&sort.order_by),
            "this.title ASC, this.imdbRating DESC"
        );
    }

    #[test]
    fn test_aggregate_count_and_custom_keys_use_preludes() {
        let schema = movies_schema();
        let auth = AuthPredicates::default();
        let settings = TranslatorSettings::default();
        let mut ctx = CompileContext::new(&schema, &auth, &settings);
        let movie = schema.entity("Movie").unwrap();
        let keys = vec![
            SortKey {
                target: SortTarget::AggregateCount("actors".into()),
                direction: SortDirection::Desc,
            },
            SortKey {
                target: SortTarget::Custom("score".into()),
                direction: SortDirection::Asc,
            },
        ];

        let sort = compile_sort(&mut ctx, &keys, movie, "this", None).unwrap();
        assert_eq!(sort.preludes.len(), 2);
        assert_eq!(
            sort.preludes[0].to_cypher(),
            "CALL {\n    WITH this\n    MATCH (this)<-[:ACTED_IN]-(this0:Actor)\n    RETURN count(this0) AS var1\n}"
        );
        assert_eq!(order_text(&sort.order_by), "var1 DESC, var3 ASC");
    }

    #[test]
    fn test_edge_key() {
        let schema = movies_schema();
        let auth = AuthPredicates::default();
        let settings = TranslatorSettings::default();
        let mut ctx = CompileContext::new(&schema, &auth, &settings);
        let actor = schema.entity("Actor").unwrap();
        let props = schema.edge_properties("ActedIn").unwrap();
        let keys = vec![SortKey {
            target: SortTarget::Edge("screenTime".into()),
            direction: SortDirection::Desc,
        }];
        let edge = EdgeBinding {
            var: "this1",
            properties: Some(props),
        };
        let sort = compile_sort(&mut ctx, &keys, actor, "this0", Some(edge)).unwrap();
        assert_eq!(order_text(&sort.order_by), "this1.screenTime DESC");
    }

    #[test]
    fn test_shared_keys_for_polymorphic_lists() {
        let schema = movies_schema();
        let movie = schema.entity("Movie").unwrap();
        let series = schema.entity("Series").unwrap();
        let keys = vec![
            SortKey {
                target: SortTarget::Field("title".into()),
                direction: SortDirection::Asc,
            },
            SortKey {
                target: SortTarget::Field("rating".into()),
                direction: SortDirection::Desc,
            },
        ];
        let shared = shared_keys(&keys, "Production", &[movie, series]).unwrap();
        assert_eq!(shared, keys[..1].to_vec());
        assert_eq!(order_text(&merged_order(&shared, "this")), "this.__sort0 ASC");

        let custom = vec![SortKey {
            target: SortTarget::Custom("score".into()),
            direction: SortDirection::Asc,
        }];
        assert!(matches!(
            shared_keys(&custom, "Production", &[movie, series]),
            Err(TranslatorError::InvalidSort { .. })
        ));
    }
}
