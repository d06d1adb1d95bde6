//! Aggregations over a relationship's nodes or edges.
//!
//! Used in two ways:
//!
//! - predicate mode: `<rel>Aggregate` keys inside `where` become one `CALL`
//!   per comparison that returns the boolean outcome
//! - projection mode: `<rel>Aggregate` selections (and root `<plural>Aggregate`
//!   fields) become one map of the requested statistics
//!
//! `min` / `max` over strings compare lexically. `shortest` / `longest` and
//! the `*Length` predicates compare by string length.

use super::errors::TranslatorError;
use super::polymorphism::expand;
use super::predicate::{
    comparator_operator, label_condition, native_value, ordered_comparison, read_property,
    target_scope, traversal_pattern, Condition, TargetScope,
};
use super::sort::EdgeBinding;
use super::CompileContext;
use crate::cypher::ast::{CaseExpr, Clause, Expr, Operator, ProjectionItem, ReduceExpr, WithClause};
use crate::result_shaper::{FieldPlan, FieldShape};
use crate::schema_model::{Entity, FieldContainer, ScalarField, ScalarKind, SchemaError};
use crate::selection::filter::{AggregateComparison, AGGREGATE_SUFFIX};
use crate::selection::{
    AggregateFunction, AggregateTarget, Comparator, FilterParser, NodeScope, SelectionTree,
};

fn size(expr: Expr) -> Expr {
    Expr::call("size", vec![expr])
}

/// Aggregate a per-row value with one of the predicate-mode functions.
fn aggregate_value(function: AggregateFunction, value: Expr) -> Expr {
    match function {
        AggregateFunction::Count => Expr::call("count", vec![value]),
        AggregateFunction::Min => Expr::call("min", vec![value]),
        AggregateFunction::Max => Expr::call("max", vec![value]),
        AggregateFunction::Sum => Expr::call("sum", vec![value]),
        AggregateFunction::Average => Expr::call("avg", vec![value]),
        AggregateFunction::ShortestLength => Expr::call("min", vec![size(value)]),
        AggregateFunction::LongestLength => Expr::call("max", vec![size(value)]),
        AggregateFunction::AverageLength => Expr::call("avg", vec![size(value)]),
    }
}

/// Kind the aggregated value is compared as.
fn result_kind(function: AggregateFunction, field_kind: &ScalarKind) -> ScalarKind {
    match function {
        AggregateFunction::Count
        | AggregateFunction::ShortestLength
        | AggregateFunction::LongestLength => ScalarKind::Int,
        AggregateFunction::AverageLength => ScalarKind::Float,
        AggregateFunction::Average if field_kind.is_numeric() => ScalarKind::Float,
        _ => field_kind.clone(),
    }
}

fn target_stem(agg: &AggregateComparison) -> String {
    match &agg.target {
        AggregateTarget::Count => format!("{}_count_{}", agg.relationship, agg.comparator.key()),
        AggregateTarget::Node(field) => format!(
            "{}_node_{}_{}_{}",
            agg.relationship,
            field,
            agg.function.key(),
            agg.comparator.key()
        ),
        AggregateTarget::Edge(field) => format!(
            "{}_edge_{}_{}_{}",
            agg.relationship,
            field,
            agg.function.key(),
            agg.comparator.key()
        ),
    }
}

/// Compile one aggregate comparison for `entity` bound as `var`.
///
/// The aggregation runs in a `CALL` pushed to `preludes`; the returned
/// condition tests its boolean outcome.
pub fn compile_aggregate_predicate<'s>(
    ctx: &mut CompileContext<'s>,
    agg: &AggregateComparison,
    entity: &'s Entity,
    var: &str,
    preludes: &mut Vec<Clause>,
) -> Result<Condition, TranslatorError> {
    let Some(relationship) = entity.declares_relationship(&agg.relationship) else {
        log::debug!(
            "`{}` has no relationship `{}`, eliding aggregate",
            entity.name,
            agg.relationship
        );
        return Ok(Condition::Always);
    };
    let schema = ctx.schema;
    let expansion = expand(schema, relationship)?;
    let (targets, properties) = (expansion.candidates, expansion.properties);
    let directed = relationship
        .query_direction
        .resolve(None)
        .map_err(|reason| TranslatorError::invalid_argument(&relationship.name, "directed", reason))?;

    let node_var = ctx.names.node();
    let edge_var = matches!(agg.target, AggregateTarget::Edge(_)).then(|| ctx.names.node());

    let (value, field_kind) = match (&agg.target, &edge_var) {
        (AggregateTarget::Count, _) => (Expr::var(&node_var), ScalarKind::Int),
        (AggregateTarget::Node(name), _) => {
            let Some(field) = targets.iter().find_map(|e| e.scalar_field(name)) else {
                return Ok(Condition::Always);
            };
            (read_property(ctx, &node_var, field), field.kind.clone())
        }
        (AggregateTarget::Edge(name), Some(edge_var)) => {
            let Some(field) = properties.and_then(|p| p.scalar_field(name)) else {
                log::debug!(
                    "edge of `{}.{}` has no property `{}`, eliding aggregate",
                    entity.name,
                    relationship.name,
                    name
                );
                return Ok(Condition::Always);
            };
            (read_property(ctx, edge_var, field), field.kind.clone())
        }
        (AggregateTarget::Edge(_), None) => return Ok(Condition::Always),
    };

    let compared_kind = result_kind(agg.function, &field_kind);
    let param = Expr::param(ctx.params.bind(var, &target_stem(agg), agg.value.clone()));
    let aggregated = aggregate_value(agg.function, value);
    let rhs = native_value(&compared_kind, param);
    let test = match agg.comparator {
        Comparator::Eq => Expr::eq(aggregated, rhs),
        c => ordered_comparison(comparator_operator(c), &compared_kind, aggregated, rhs),
    };

    let restriction = match targets.as_slice() {
        [_] => Condition::Always,
        many => Condition::or(
            many.iter()
                .map(|e| label_condition(&node_var, e))
                .collect(),
        ),
    };
    let labels = match targets.as_slice() {
        [only] => only.labels.clone(),
        _ => Vec::new(),
    };
    let result_var = ctx.names.value();
    let pattern = traversal_pattern(
        var,
        relationship,
        directed,
        edge_var.as_deref(),
        &node_var,
        labels,
    );
    preludes.push(Clause::call(
        vec![var.to_string()],
        vec![
            Clause::matching(pattern, restriction.into_where()),
            Clause::returning(vec![ProjectionItem::aliased(test, &result_var)]),
        ],
    ));
    Ok(Condition::Expr(Expr::eq(Expr::var(result_var), Expr::boolean(true))))
}

/// `reduce(acc = head(collect(x)), v IN collect(x) | CASE WHEN size(v) < size(acc) THEN v ELSE acc END)`
fn by_length(value: Expr, shortest: bool) -> Expr {
    let accumulator = if shortest { "shortest" } else { "longest" };
    let collected = Expr::call("collect", vec![value]);
    let operator = if shortest {
        Operator::LessThan
    } else {
        Operator::GreaterThan
    };
    Expr::Reduce(ReduceExpr {
        accumulator: accumulator.to_string(),
        initial_value: Box::new(Expr::call("head", vec![collected.clone()])),
        variable: "v".to_string(),
        list: Box::new(collected),
        expression: Box::new(Expr::Case(CaseExpr {
            when_then: vec![(
                Expr::binary(operator, size(Expr::var("v")), size(Expr::var(accumulator))),
                Expr::var("v"),
            )],
            else_expr: Some(Box::new(Expr::var(accumulator))),
        })),
    })
}

fn projection_function(
    field: &ScalarField,
    function: &str,
    value: Expr,
) -> Result<(Expr, ScalarKind), TranslatorError> {
    let kind = &field.kind;
    let unavailable = || {
        TranslatorError::invalid_argument(
            &field.name,
            function,
            format!("aggregate `{}` is not available for {}", function, kind),
        )
    };
    if field.is_list {
        return Err(unavailable());
    }
    match function {
        "min" | "max"
            if kind.is_numeric()
                || kind.is_temporal()
                || kind.is_duration()
                || kind.is_string_like() =>
        {
            Ok((Expr::call(function, vec![value]), kind.clone()))
        }
        "average" if kind.is_numeric() => Ok((Expr::call("avg", vec![value]), ScalarKind::Float)),
        "average" if kind.is_duration() => Ok((Expr::call("avg", vec![value]), kind.clone())),
        "average" if kind.is_string_like() => {
            Ok((Expr::call("avg", vec![size(value)]), ScalarKind::Float))
        }
        "sum" if kind.is_numeric() || kind.is_duration() => {
            Ok((Expr::call("sum", vec![value]), kind.clone()))
        }
        "shortest" if kind.is_string_like() => Ok((by_length(value, true), ScalarKind::String)),
        "longest" if kind.is_string_like() => Ok((by_length(value, false), ScalarKind::String)),
        _ => Err(unavailable()),
    }
}

/// Statistics for each field selected under `node` / `edge`.
fn field_statistics<'f>(
    ctx: &mut CompileContext<'_>,
    selection: &SelectionTree,
    var: &str,
    lookup: impl Fn(&str) -> Option<&'f ScalarField>,
    type_name: &str,
) -> Result<(Expr, Vec<FieldPlan>), TranslatorError> {
    let mut entries = Vec::new();
    let mut plans = Vec::new();
    for child in &selection.selections {
        if child.is_typename() {
            continue;
        }
        let field = lookup(&child.field).ok_or_else(|| {
            SchemaError::field_error_with_context(
                type_name,
                &child.field,
                format!("While projecting `{}`", selection.response_key()),
            )
        })?;
        let mut stats = Vec::new();
        let mut stat_plans = Vec::new();
        for function in child.selections.iter().filter(|s| !s.is_typename()) {
            let value = read_property(ctx, var, field);
            let (expr, kind) = projection_function(field, &function.field, value)?;
            stats.push((function.response_key().to_string(), expr));
            stat_plans.push(FieldPlan {
                key: function.response_key().to_string(),
                shape: FieldShape::Scalar {
                    kind,
                    is_list: false,
                },
            });
        }
        entries.push((child.response_key().to_string(), Expr::Map(stats)));
        plans.push(FieldPlan {
            key: child.response_key().to_string(),
            shape: FieldShape::Object(stat_plans),
        });
    }
    Ok((Expr::Map(entries), plans))
}

/// Map expression computing an aggregate selection over rows binding
/// `node_var` (and `edge` for relationship aggregates).
pub fn aggregate_projection<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    node_var: &str,
    candidates: &[&'s Entity],
    edge: Option<EdgeBinding<'_>>,
) -> Result<(Expr, Vec<FieldPlan>), TranslatorError> {
    let mut entries = Vec::new();
    let mut plans = Vec::new();

    for child in &selection.selections {
        let key = child.response_key().to_string();
        match child.field.as_str() {
            "count" => {
                entries.push((key.clone(), Expr::call("count", vec![Expr::var(node_var)])));
                plans.push(FieldPlan {
                    key,
                    shape: FieldShape::Scalar {
                        kind: ScalarKind::Int,
                        is_list: false,
                    },
                });
            }
            "node" => {
                let type_name = candidates
                    .first()
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                let (expr, fields) = field_statistics(
                    ctx,
                    child,
                    node_var,
                    |name| candidates.iter().find_map(|e| e.scalar_field(name)),
                    &type_name,
                )?;
                entries.push((key.clone(), expr));
                plans.push(FieldPlan {
                    key,
                    shape: FieldShape::Object(fields),
                });
            }
            "edge" => {
                let Some(EdgeBinding {
                    var: edge_var,
                    properties: Some(props),
                }) = edge
                else {
                    return Err(SchemaError::field_error_with_context(
                        selection.response_key(),
                        "edge",
                        "The aggregated relationship carries no properties",
                    )
                    .into());
                };
                let (expr, fields) = field_statistics(
                    ctx,
                    child,
                    edge_var,
                    |name| props.scalar_field(name),
                    &props.name,
                )?;
                entries.push((key.clone(), expr));
                plans.push(FieldPlan {
                    key,
                    shape: FieldShape::Object(fields),
                });
            }
            _ if child.is_typename() => {
                log::debug!("`__typename` on aggregate `{}` is not projected", selection.field);
            }
            other => {
                return Err(SchemaError::field_error_with_context(
                    selection.response_key(),
                    other,
                    "Aggregate selections are `count`, `node` and `edge`",
                )
                .into())
            }
        }
    }
    Ok((Expr::Map(entries), plans))
}

/// `CALL` computing a `<rel>Aggregate` selection of `parent` bound as `var`.
///
/// Returns the clause, the variable holding the statistics map and the
/// shape of that map.
pub fn relationship_aggregate_call<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    parent: &'s Entity,
    var: &str,
) -> Result<Option<(Clause, String, Vec<FieldPlan>)>, TranslatorError> {
    let Some(name) = selection.field.strip_suffix(AGGREGATE_SUFFIX) else {
        return Ok(None);
    };
    let Some(relationship) = parent.declares_relationship(name) else {
        return Ok(None);
    };
    let schema = ctx.schema;
    let expansion = expand(schema, relationship)?;
    let (targets, properties) = (expansion.candidates, expansion.properties);
    let directed = relationship
        .query_direction
        .resolve(selection.directed().map_err(TranslatorError::from)?)
        .map_err(|reason| {
            TranslatorError::invalid_argument(selection.response_key(), "directed", reason)
        })?;

    let filter = match selection.where_arg() {
        Some(value) => Some(
            FilterParser::new(schema)
                .parse_node_filter(value, &NodeScope::for_type(schema, &relationship.target)?)?,
        ),
        None => None,
    };

    let node_var = ctx.names.node();
    let edge_var = ctx.names.node();
    let mut preludes = Vec::new();
    let TargetScope {
        labels, condition, ..
    } = target_scope(ctx, &targets, filter.as_ref(), &node_var, true, &mut preludes)?;

    let (map, plans) = aggregate_projection(
        ctx,
        selection,
        &node_var,
        &targets,
        Some(EdgeBinding {
            var: &edge_var,
            properties,
        }),
    )?;
    let result_var = ctx.names.value();

    let pattern = traversal_pattern(var, relationship, directed, Some(&edge_var), &node_var, labels);
    let mut body = Vec::new();
    if preludes.is_empty() {
        body.push(Clause::matching(pattern, condition.into_where()));
    } else {
        body.push(Clause::matching(pattern, None));
        body.extend(preludes);
        body.push(Clause::With(WithClause {
            where_clause: condition.into_where(),
            ..WithClause::star()
        }));
    }
    body.push(Clause::returning(vec![ProjectionItem::aliased(map, &result_var)]));

    Ok(Some((Clause::call(vec![var.to_string()], body), result_var, plans)))
}
