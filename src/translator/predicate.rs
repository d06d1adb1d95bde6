//! Filter compilation.
//!
//! A [`FilterNode`] tree is compiled for one concrete entity at a time into
//! a [`Condition`]. Conditions fold constant truth values eagerly:
//!
//! - an empty `AND` holds, an empty `OR` does not
//! - `NOT` inverts, so `NOT {}` never holds
//! - a key that does not apply to the entity being compiled (a field only
//!   some implementations carry, a `Narrow` for another type) holds
//!
//! Comparisons over custom fields and aggregate comparisons need values
//! computed by subqueries; those subqueries are pushed to `preludes` and must
//! run before the condition is evaluated.

use serde_json::Value;

use super::aggregation::compile_aggregate_predicate;
use super::auth::compile_auth;
use super::custom_cypher::scalar_value_call;
use super::errors::TranslatorError;
use super::polymorphism::expand;
use super::CompileContext;
use crate::cypher::ast::{
    Clause, Expr, Literal, NodePattern, Operator, OperatorApplication, Pattern, PatternDirection,
    RelationshipPattern, Subquery, WithClause,
};
use crate::schema_model::{
    CustomTarget, Direction, EdgePropertyType, Entity, FieldContainer, RelationshipField,
    ScalarField, ScalarKind,
};
use crate::selection::filter::{
    Comparator, Comparison, ComparisonOperator, ConnectionFilter, FilterNode, LogicalOp,
    Quantifier, RelationshipFilter,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    Never,
    Expr(Expr),
}

impl Condition {
    pub fn and(parts: Vec<Condition>) -> Condition {
        let mut exprs = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Condition::Always => {}
                Condition::Never => return Condition::Never,
                Condition::Expr(e) => exprs.push(e),
            }
        }
        Expr::and_all(exprs)
            .map(Condition::Expr)
            .unwrap_or(Condition::Always)
    }

    pub fn or(parts: Vec<Condition>) -> Condition {
        let mut exprs = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Condition::Always => return Condition::Always,
                Condition::Never => {}
                Condition::Expr(e) => exprs.push(e),
            }
        }
        Expr::or_all(exprs)
            .map(Condition::Expr)
            .unwrap_or(Condition::Never)
    }

    pub fn negate(self) -> Condition {
        match self {
            Condition::Always => Condition::Never,
            Condition::Never => Condition::Always,
            Condition::Expr(e) => Condition::Expr(Expr::not(e)),
        }
    }

    pub fn into_expr(self) -> Expr {
        match self {
            Condition::Always => Expr::boolean(true),
            Condition::Never => Expr::boolean(false),
            Condition::Expr(e) => e,
        }
    }

    /// `WHERE` operand; `None` when no restriction is needed.
    pub fn into_where(self) -> Option<Expr> {
        match self {
            Condition::Always => None,
            other => Some(other.into_expr()),
        }
    }
}

/// Map an aggregate/distance comparator onto a Cypher operator.
pub fn comparator_operator(comparator: Comparator) -> Operator {
    match comparator {
        Comparator::Eq => Operator::Equal,
        Comparator::Lt => Operator::LessThan,
        Comparator::Lte => Operator::LessThanEqual,
        Comparator::Gt => Operator::GreaterThan,
        Comparator::Gte => Operator::GreaterThanEqual,
    }
}

/// Wrap a bound parameter in the constructor that turns it into the native
/// store type of `kind`.
pub fn native_value(kind: &ScalarKind, param: Expr) -> Expr {
    match kind.cypher_constructor() {
        Some(constructor) => Expr::call(constructor, vec![param]),
        None => param,
    }
}

/// Read a scalar property, substituting the declared default for null.
pub fn read_property(ctx: &mut CompileContext<'_>, var: &str, field: &ScalarField) -> Expr {
    let property = Expr::property(Expr::var(var), field.db_property());
    match &field.default_value {
        Some(default) => {
            let name = ctx
                .params
                .bind(var, &format!("{}_default", field.name), default.clone());
            Expr::call("coalesce", vec![property, native_value(&field.kind, Expr::param(name))])
        }
        None => property,
    }
}

/// `(from)-[edge:LABEL]->(to:Labels)` oriented by the stored direction.
pub fn traversal_pattern(
    from: &str,
    relationship: &RelationshipField,
    directed: bool,
    edge_var: Option<&str>,
    to: &str,
    to_labels: Vec<String>,
) -> Pattern {
    let direction = match (directed, relationship.direction) {
        (false, _) => PatternDirection::Either,
        (true, Direction::Out) => PatternDirection::Outgoing,
        (true, Direction::In) => PatternDirection::Incoming,
    };
    Pattern::hop(
        NodePattern::bound(from),
        RelationshipPattern {
            variable: edge_var.map(str::to_string),
            types: vec![relationship.edge_label.clone()],
            direction,
        },
        NodePattern::new(to, to_labels),
    )
}

/// `var:Label1:Label2` for every label of the entity.
pub fn label_condition(var: &str, entity: &Entity) -> Condition {
    Condition::Expr(Expr::HasLabels(var.to_string(), entity.labels.clone()))
}

/// How a traversal constrains its far end.
#[derive(Debug, Clone)]
pub struct TargetScope {
    /// Labels for the end node pattern; empty for polymorphic targets
    pub labels: Vec<String>,
    /// Disjunction over the target labels; `Always` for a single target
    pub restriction: Condition,
    /// Node filter (and auth rules) over the targets, implying `restriction`
    pub condition: Condition,
}

/// Compile an optional node filter over every concrete target of a
/// traversal bound as `node_var`. Polymorphic targets are matched without
/// labels and each branch is guarded by its own label test.
pub fn target_scope<'s>(
    ctx: &mut CompileContext<'s>,
    targets: &[&'s Entity],
    filter: Option<&FilterNode>,
    node_var: &str,
    with_auth: bool,
    preludes: &mut Vec<Clause>,
) -> Result<TargetScope, TranslatorError> {
    if let [target] = targets {
        return Ok(TargetScope {
            labels: target.labels.clone(),
            restriction: Condition::Always,
            condition: branch_condition(ctx, target, filter, node_var, with_auth, preludes)?,
        });
    }

    let mut restrictions = Vec::with_capacity(targets.len());
    let mut branches = Vec::with_capacity(targets.len());
    for target in targets {
        let condition = branch_condition(ctx, target, filter, node_var, with_auth, preludes)?;
        restrictions.push(label_condition(node_var, target));
        branches.push(Condition::and(vec![label_condition(node_var, target), condition]));
    }
    Ok(TargetScope {
        labels: Vec::new(),
        restriction: Condition::or(restrictions),
        condition: Condition::or(branches),
    })
}

fn branch_condition<'s>(
    ctx: &mut CompileContext<'s>,
    target: &'s Entity,
    filter: Option<&FilterNode>,
    node_var: &str,
    with_auth: bool,
    preludes: &mut Vec<Clause>,
) -> Result<Condition, TranslatorError> {
    let mut parts = Vec::with_capacity(2);
    if let Some(f) = filter {
        parts.push(compile_node_filter(ctx, f, target, node_var, preludes)?);
    }
    if with_auth {
        parts.push(compile_auth(ctx, target, node_var, preludes)?);
    }
    Ok(Condition::and(parts))
}

pub fn compile_node_filter<'s>(
    ctx: &mut CompileContext<'s>,
    filter: &FilterNode,
    entity: &'s Entity,
    var: &str,
    preludes: &mut Vec<Clause>,
) -> Result<Condition, TranslatorError> {
    match filter {
        FilterNode::Logical { op, children } => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                parts.push(compile_node_filter(ctx, child, entity, var, preludes)?);
            }
            Ok(combine(*op, parts))
        }
        FilterNode::Comparison(cmp) if cmp.custom => {
            let Some(custom) = entity.custom_field(&cmp.field) else {
                log::debug!("`{}` has no custom field `{}`, eliding", entity.name, cmp.field);
                return Ok(Condition::Always);
            };
            let CustomTarget::Scalar(kind) = &custom.target else {
                return Ok(Condition::Always);
            };
            let (call, value_var) = scalar_value_call(ctx, custom, var)?;
            preludes.push(call);
            let is_list = custom.cardinality.is_list();
            Ok(Condition::Expr(comparison_expr(
                ctx,
                var,
                &cmp.field,
                kind,
                is_list,
                Expr::var(value_var),
                cmp,
            )))
        }
        FilterNode::Comparison(cmp) => {
            let Some(field) = entity.scalar_field(&cmp.field) else {
                log::debug!("`{}` has no field `{}`, eliding", entity.name, cmp.field);
                return Ok(Condition::Always);
            };
            let lhs = read_property(ctx, var, field);
            Ok(Condition::Expr(comparison_expr(
                ctx,
                var,
                &field.name,
                &field.kind,
                field.is_list,
                lhs,
                cmp,
            )))
        }
        FilterNode::RelationshipQuantifier(rel) => compile_quantifier(ctx, rel, entity, var),
        FilterNode::AggregateComparison(agg) => {
            compile_aggregate_predicate(ctx, agg, entity, var, preludes)
        }
        FilterNode::Narrow { type_name, filter } => {
            if *type_name == entity.name {
                compile_node_filter(ctx, filter, entity, var, preludes)
            } else {
                Ok(Condition::Always)
            }
        }
        FilterNode::Typename(types) => Ok(if types.iter().any(|t| *t == entity.name) {
            Condition::Always
        } else {
            Condition::Never
        }),
    }
}

/// Compile a filter over edge properties. `properties` is the
/// edge-property-type of the concrete relationship being traversed, if any.
pub fn compile_edge_filter(
    ctx: &mut CompileContext<'_>,
    filter: &FilterNode,
    properties: Option<&EdgePropertyType>,
    var: &str,
) -> Result<Condition, TranslatorError> {
    match filter {
        FilterNode::Logical { op, children } => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                parts.push(compile_edge_filter(ctx, child, properties, var)?);
            }
            Ok(combine(*op, parts))
        }
        FilterNode::Comparison(cmp) => {
            let Some(field) = properties.and_then(|p| p.scalar_field(&cmp.field)) else {
                log::debug!(
                    "edge property `{}` not declared by {:?}, eliding",
                    cmp.field,
                    properties.map(|p| &p.name)
                );
                return Ok(Condition::Always);
            };
            let lhs = read_property(ctx, var, field);
            Ok(Condition::Expr(comparison_expr(
                ctx,
                var,
                &field.name,
                &field.kind,
                field.is_list,
                lhs,
                cmp,
            )))
        }
        FilterNode::Narrow { type_name, filter } => {
            match properties.filter(|p| p.name == *type_name) {
                Some(props) => compile_edge_filter(ctx, filter, Some(props), var),
                None => Ok(Condition::Always),
            }
        }
        _ => Ok(Condition::Always),
    }
}

/// Compile a connection `where` for one concrete branch: node parts against
/// `entity` bound as `node_var`, edge parts against `properties` bound as
/// `edge_var`.
#[allow(clippy::too_many_arguments)]
pub fn compile_connection_filter<'s>(
    ctx: &mut CompileContext<'s>,
    filter: &ConnectionFilter,
    entity: &'s Entity,
    node_var: &str,
    properties: Option<&EdgePropertyType>,
    edge_var: &str,
    preludes: &mut Vec<Clause>,
) -> Result<Condition, TranslatorError> {
    match filter {
        ConnectionFilter::Node(node) => compile_node_filter(ctx, node, entity, node_var, preludes),
        ConnectionFilter::Edge(edge) => compile_edge_filter(ctx, edge, properties, edge_var),
        ConnectionFilter::Logical { op, children } => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                parts.push(compile_connection_filter(
                    ctx, child, entity, node_var, properties, edge_var, preludes,
                )?);
            }
            Ok(combine(*op, parts))
        }
    }
}

fn combine(op: LogicalOp, parts: Vec<Condition>) -> Condition {
    match op {
        LogicalOp::And => Condition::and(parts),
        LogicalOp::Or => Condition::or(parts),
        // NOT {} inverts the empty conjunction
        LogicalOp::Not => Condition::and(parts).negate(),
    }
}

fn comparison_expr(
    ctx: &mut CompileContext<'_>,
    scope: &str,
    field_name: &str,
    kind: &ScalarKind,
    is_list: bool,
    lhs: Expr,
    cmp: &Comparison,
) -> Expr {
    let stem = format!("{}_{}", field_name, cmp.operator.key());

    if cmp.operator == ComparisonOperator::IsNull {
        let operator = if cmp.value == Value::Bool(false) {
            Operator::IsNotNull
        } else {
            Operator::IsNull
        };
        return Expr::Operator(OperatorApplication {
            operator,
            operands: vec![lhs],
        });
    }

    let param = Expr::param(ctx.params.bind(scope, &stem, cmp.value.clone()));
    match cmp.operator {
        ComparisonOperator::Eq if is_list => Expr::eq(lhs, param),
        ComparisonOperator::Eq => Expr::eq(lhs, native_value(kind, param)),
        ComparisonOperator::In => {
            let rhs = match (kind.cypher_constructor(), param) {
                (Some(constructor), Expr::Parameter(name)) => {
                    Expr::Raw(format!("[v IN ${} | {}(v)]", name, constructor))
                }
                (_, param) => param,
            };
            Expr::binary(Operator::In, lhs, rhs)
        }
        ComparisonOperator::Lt
        | ComparisonOperator::Lte
        | ComparisonOperator::Gt
        | ComparisonOperator::Gte => {
            let operator = match cmp.operator {
                ComparisonOperator::Lt => Operator::LessThan,
                ComparisonOperator::Lte => Operator::LessThanEqual,
                ComparisonOperator::Gt => Operator::GreaterThan,
                _ => Operator::GreaterThanEqual,
            };
            ordered_comparison(operator, kind, lhs, native_value(kind, param))
        }
        ComparisonOperator::Contains => Expr::binary(Operator::Contains, lhs, param),
        ComparisonOperator::StartsWith => Expr::binary(Operator::StartsWith, lhs, param),
        ComparisonOperator::EndsWith => Expr::binary(Operator::EndsWith, lhs, param),
        ComparisonOperator::Matches => Expr::binary(Operator::RegexMatch, lhs, param),
        ComparisonOperator::Includes => Expr::binary(Operator::In, native_value(kind, param), lhs),
        ComparisonOperator::Distance(comparator) => Expr::binary(
            comparator_operator(comparator),
            Expr::call(
                "point.distance",
                vec![
                    lhs,
                    Expr::call("point", vec![Expr::property(param.clone(), "point")]),
                ],
            ),
            Expr::property(param, "distance"),
        ),
        ComparisonOperator::IsNull => Expr::Literal(Literal::Boolean(true)),
    }
}

/// Ordering comparison; durations are compared by anchoring both sides to
/// the statement clock since they have no total order of their own.
pub fn ordered_comparison(operator: Operator, kind: &ScalarKind, lhs: Expr, rhs: Expr) -> Expr {
    if kind.is_duration() {
        let anchored = |e: Expr| Expr::binary(Operator::Addition, Expr::call("datetime", vec![]), e);
        Expr::binary(operator, anchored(lhs), anchored(rhs))
    } else {
        Expr::binary(operator, lhs, rhs)
    }
}

/// Body of an `EXISTS` / `COUNT` subquery over a traversal.
fn pattern_subquery(
    pattern: Pattern,
    restriction: Condition,
    preludes: Vec<Clause>,
    predicate: Condition,
) -> Subquery {
    if preludes.is_empty() {
        return Subquery {
            clauses: vec![Clause::matching(
                pattern,
                Condition::and(vec![restriction, predicate]).into_where(),
            )],
        };
    }
    let mut clauses = vec![Clause::matching(pattern, restriction.into_where())];
    clauses.extend(preludes);
    clauses.push(Clause::With(WithClause {
        where_clause: predicate.into_where(),
        ..WithClause::star()
    }));
    Subquery { clauses }
}

fn compile_quantifier<'s>(
    ctx: &mut CompileContext<'s>,
    filter: &RelationshipFilter,
    entity: &'s Entity,
    var: &str,
) -> Result<Condition, TranslatorError> {
    let Some(relationship) = entity.declares_relationship(&filter.relationship) else {
        log::debug!(
            "`{}` has no relationship `{}`, eliding",
            entity.name,
            filter.relationship
        );
        return Ok(Condition::Always);
    };
    let directed = relationship
        .query_direction
        .resolve(None)
        .map_err(|reason| {
            TranslatorError::invalid_argument(&relationship.name, "directed", reason)
        })?;
    let schema = ctx.schema;
    let expansion = expand(schema, relationship)?;
    let (targets, properties) = (expansion.candidates, expansion.properties);

    let node_var = ctx.names.node();
    let edge_var = ctx.names.node();
    let mut preludes = Vec::new();

    let edge_condition = match &filter.edge_filter {
        Some(f) => compile_edge_filter(ctx, f, properties, &edge_var)?,
        None => Condition::Always,
    };

    let TargetScope {
        labels,
        restriction,
        condition: node_condition,
    } = target_scope(
        ctx,
        &targets,
        filter.node_filter.as_ref(),
        &node_var,
        false,
        &mut preludes,
    )?;

    let predicate = Condition::and(vec![node_condition, edge_condition]);
    let pattern = traversal_pattern(var, relationship, directed, Some(&edge_var), &node_var, labels);

    let some = |predicate: Condition, preludes: Vec<Clause>| match predicate {
        Condition::Never => Condition::Never,
        predicate => Condition::Expr(Expr::Exists(Box::new(pattern_subquery(
            pattern.clone(),
            Condition::Always,
            preludes,
            predicate,
        )))),
    };

    Ok(match filter.quantifier {
        Quantifier::Some => some(predicate, preludes),
        Quantifier::None => some(predicate, preludes).negate(),
        Quantifier::All => match predicate.negate() {
            Condition::Never => Condition::Always,
            counterexample => Condition::Expr(Expr::not(Expr::Exists(Box::new(
                pattern_subquery(pattern.clone(), restriction, preludes, counterexample),
            )))),
        },
        Quantifier::Single => match predicate {
            Condition::Never => Condition::Never,
            predicate => Condition::Expr(Expr::eq(
                Expr::Count(Box::new(pattern_subquery(
                    pattern.clone(),
                    Condition::Always,
                    preludes,
                    predicate,
                ))),
                Expr::Literal(Literal::Integer(1)),
            )),
        },
    })
}
