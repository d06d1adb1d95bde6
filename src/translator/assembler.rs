//! Query assembly.
//!
//! Every node-valued field below the root compiles to a bounded `CALL`
//! importing the parent variable and returning one collected value, so
//! sibling fields never multiply each other's rows. Polymorphic fields
//! compile one branch per concrete entity; the branches are joined with
//! `UNION` and merge-sorted on the keys every branch carries.
//!
//! The assembler also records, field by field, the [`FieldShape`] the
//! result shaper needs to rebuild the response.

use super::aggregation::{aggregate_projection, relationship_aggregate_call};
use super::auth::compile_auth;
use super::custom_cypher::{collect_values, statement_clauses};
use super::errors::TranslatorError;
use super::pagination::{connection_window, list_window, window_clause, PageWindow};
use super::polymorphism::{expand, labels_of, type_resolution};
use super::predicate::{
    compile_connection_filter, compile_node_filter, label_condition, read_property,
    traversal_pattern, Condition,
};
use super::sort::{branch_sort_entries, compile_sort, merged_order, shared_keys, EdgeBinding};
use super::CompileContext;
use crate::cypher::ast::{
    CaseExpr, Clause, Expr, Literal, MapProjection, MapProjectionItem, NodePattern, Operator,
    Pattern, ProjectionItem, WithClause,
};
use crate::cypher::naming::ROOT_VARIABLE;
use crate::result_shaper::{
    ConnectionField, ConnectionShape, EdgeField, FieldPlan, FieldShape, NodeShape, PageInfoField,
    RootCollect, RootPlan, EDGES_KEY, EDGE_NODE_KEY, EDGE_PROPERTIES_KEY, LABELS_KEY,
    PROPERTIES_TYPE_KEY, TOTAL_COUNT_KEY,
};
use crate::schema_model::{
    CustomField, CustomTarget, EdgePropertyType, Entity, FieldContainer, RelationshipField,
    RootFieldKind, ScalarField, SchemaError, SchemaModel, TypeRef,
};
use crate::selection::{
    parse_sort, ConnectionFilter, FilterNode, FilterParser, NodeScope, SelectionTree, SortKey,
};

const CONNECTION_SUFFIX: &str = "Connection";

type Assembled = (Vec<Clause>, RootCollect, FieldShape);

/// Compile a root selection into the statement clauses and the plan for
/// shaping its records.
pub fn assemble<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
) -> Result<(Vec<Clause>, RootPlan), TranslatorError> {
    let schema = ctx.schema;
    let kind = schema.root_field(&selection.field)?;
    log::debug!("root field `{}` resolves to {:?}", selection.field, kind);

    let (clauses, collect, shape) = match kind {
        RootFieldKind::List(target) => root_list(ctx, selection, target)?,
        RootFieldKind::Connection(target) => root_connection(ctx, selection, target)?,
        RootFieldKind::Aggregate(target) => root_aggregate(ctx, selection, target)?,
        RootFieldKind::Custom(custom) => root_custom(ctx, selection, custom)?,
    };
    Ok((
        clauses,
        RootPlan {
            response_key: selection.response_key().to_string(),
            column: ROOT_VARIABLE.to_string(),
            collect,
            shape,
        },
    ))
}

/// Where the rows of a node-valued field come from.
#[derive(Clone, Copy)]
enum Source<'s, 'a> {
    Root,
    Traversal {
        parent: &'a str,
        relationship: &'s RelationshipField,
        properties: Option<&'s EdgePropertyType>,
        directed: bool,
    },
}

impl<'s> Source<'s, '_> {
    fn properties(&self) -> Option<&'s EdgePropertyType> {
        match self {
            Source::Root => None,
            Source::Traversal { properties, .. } => *properties,
        }
    }

    fn imports(&self) -> Vec<String> {
        match self {
            Source::Root => Vec::new(),
            Source::Traversal { parent, .. } => vec![parent.to_string()],
        }
    }
}

enum FieldFilter {
    Node(FilterNode),
    Connection(ConnectionFilter),
}

/// Everything that decides which rows a node-valued field returns.
struct Rows<'s, 'a> {
    source: Source<'s, 'a>,
    target: &'a TypeRef,
    candidates: Vec<&'s Entity>,
    filter: Option<FieldFilter>,
    sort: Vec<SortKey>,
    window: PageWindow,
    /// Bind the traversed edge (connections)
    bind_edge: bool,
}

struct BranchMatch {
    edge_var: Option<String>,
    clauses: Vec<Clause>,
}

fn root_list<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    target: &'s TypeRef,
) -> Result<Assembled, TranslatorError> {
    let schema = ctx.schema;
    let scope = NodeScope::for_type(schema, target)?;
    let rows = Rows {
        source: Source::Root,
        target,
        filter: node_filter(schema, selection, &scope)?.map(FieldFilter::Node),
        sort: sort_keys(selection, &scope, None)?,
        window: list_window(ctx.settings, schema.limits(target), selection, true)?,
        candidates: scope.candidates,
        bind_edge: false,
    };

    let polymorphic = rows.candidates.len() > 1;
    let mut branches = Vec::with_capacity(rows.candidates.len());
    let (mut clauses, row) = page_rows(
        ctx,
        &rows,
        Some(ROOT_VARIABLE),
        |ctx, entity, node_var, _, hidden, subqueries| {
            let hidden = with_labels(polymorphic, node_var, hidden);
            let (expr, plans) = project_node(ctx, selection, entity, node_var, hidden, subqueries)?;
            branches.push((entity.name.clone(), plans));
            Ok(expr)
        },
    )?;
    clauses.push(Clause::returning(vec![ProjectionItem::aliased(row, ROOT_VARIABLE)]));

    let shape = NodeShape {
        is_list: false,
        typename: type_resolution(target, &rows.candidates),
        branches,
    };
    Ok((clauses, RootCollect::Rows, FieldShape::Node(shape)))
}

fn root_connection<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    target: &'s TypeRef,
) -> Result<Assembled, TranslatorError> {
    let schema = ctx.schema;
    let scope = NodeScope::for_type(schema, target)?;
    let rows = Rows {
        source: Source::Root,
        target,
        filter: node_filter(schema, selection, &scope)?.map(FieldFilter::Node),
        sort: sort_keys(selection, &scope, None)?,
        window: connection_window(ctx.settings, schema.limits(target), selection, "Query", true)?,
        candidates: scope.candidates,
        bind_edge: false,
    };

    let stem = upper_first(
        selection
            .field
            .strip_suffix(CONNECTION_SUFFIX)
            .unwrap_or(&selection.field),
    );
    let parts = connection(ctx, selection, rows, &stem)?;
    let mut clauses = parts.clauses;
    clauses.push(Clause::returning(vec![ProjectionItem::aliased(
        parts.value,
        ROOT_VARIABLE,
    )]));
    Ok((clauses, RootCollect::FirstRow, FieldShape::Connection(parts.shape)))
}

fn root_aggregate<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    target: &'s TypeRef,
) -> Result<Assembled, TranslatorError> {
    let schema = ctx.schema;
    let scope = NodeScope::for_type(schema, target)?;
    let filter = node_filter(schema, selection, &scope)?.map(FieldFilter::Node);
    let candidates = scope.candidates;

    let (mut clauses, node_var) = match *candidates.as_slice() {
        [entity] => {
            let node_var = ctx.names.node();
            let matched =
                branch_match(ctx, Source::Root, entity, filter.as_ref(), &node_var, false)?;
            (matched.clauses, node_var)
        }
        ref many => {
            let row_var = ctx.names.node();
            let mut branches = Vec::with_capacity(many.len());
            for &entity in many {
                let node_var = ctx.names.node();
                let mut body =
                    branch_match(ctx, Source::Root, entity, filter.as_ref(), &node_var, false)?
                        .clauses;
                body.push(Clause::returning(vec![ProjectionItem::aliased(
                    Expr::var(&node_var),
                    &row_var,
                )]));
                branches.push(body);
            }
            (
                vec![Clause::call(Vec::new(), vec![Clause::Union(branches)])],
                row_var,
            )
        }
    };

    let (map, plans) = aggregate_projection(ctx, selection, &node_var, &candidates, None)?;
    clauses.push(Clause::returning(vec![ProjectionItem::aliased(map, ROOT_VARIABLE)]));
    Ok((clauses, RootCollect::FirstRow, FieldShape::Object(plans)))
}

fn root_custom<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    custom: &'s CustomField,
) -> Result<Assembled, TranslatorError> {
    let mut clauses = statement_clauses(ctx, custom, None, &selection.arguments, ROOT_VARIABLE)?;
    let (row, shape) = custom_row(ctx, selection, custom, ROOT_VARIABLE, false, &mut clauses)?;
    clauses.push(Clause::returning(vec![ProjectionItem::aliased(row, ROOT_VARIABLE)]));

    let collect = if custom.cardinality.is_list() {
        RootCollect::Rows
    } else {
        RootCollect::FirstRow
    };
    Ok((clauses, collect, shape))
}

fn node_filter(
    schema: &SchemaModel,
    selection: &SelectionTree,
    scope: &NodeScope<'_>,
) -> Result<Option<FilterNode>, TranslatorError> {
    match selection.where_arg() {
        Some(value) => Ok(Some(FilterParser::new(schema).parse_node_filter(value, scope)?)),
        None => Ok(None),
    }
}

fn sort_keys(
    selection: &SelectionTree,
    scope: &NodeScope<'_>,
    edge_types: Option<&[&EdgePropertyType]>,
) -> Result<Vec<SortKey>, TranslatorError> {
    match selection.sort_arg() {
        Some(value) => Ok(parse_sort(value, scope, edge_types)?),
        None => Ok(Vec::new()),
    }
}

fn resolve_direction(
    selection: &SelectionTree,
    relationship: &RelationshipField,
) -> Result<bool, TranslatorError> {
    let requested = selection
        .directed()
        .map_err(|e| TranslatorError::from(e).in_field(selection.response_key()))?;
    relationship
        .query_direction
        .resolve(requested)
        .map_err(|reason| {
            TranslatorError::invalid_argument(selection.response_key(), "directed", reason)
        })
}

/// `MATCH` binding `node_var` to `entity` from `source`, restricted by the
/// field filter and the entity's auth rules.
fn branch_match<'s>(
    ctx: &mut CompileContext<'s>,
    source: Source<'s, '_>,
    entity: &'s Entity,
    filter: Option<&FieldFilter>,
    node_var: &str,
    bind_edge: bool,
) -> Result<BranchMatch, TranslatorError> {
    let (pattern, edge_var) = match source {
        Source::Root => (
            Pattern::node(NodePattern::new(node_var, entity.labels.clone())),
            None,
        ),
        Source::Traversal {
            parent,
            relationship,
            directed,
            ..
        } => {
            let edge_var = bind_edge.then(|| ctx.names.node());
            let pattern = traversal_pattern(
                parent,
                relationship,
                directed,
                edge_var.as_deref(),
                node_var,
                entity.labels.clone(),
            );
            (pattern, edge_var)
        }
    };

    let mut preludes = Vec::new();
    let mut parts = Vec::with_capacity(2);
    match filter {
        Some(FieldFilter::Node(node)) => {
            parts.push(compile_node_filter(ctx, node, entity, node_var, &mut preludes)?)
        }
        Some(FieldFilter::Connection(connection)) => parts.push(compile_connection_filter(
            ctx,
            connection,
            entity,
            node_var,
            source.properties(),
            edge_var.as_deref().unwrap_or_default(),
            &mut preludes,
        )?),
        None => {}
    }
    parts.push(compile_auth(ctx, entity, node_var, &mut preludes)?);

    Ok(BranchMatch {
        edge_var,
        clauses: filtered_match(pattern, Condition::and(parts), preludes),
    })
}

fn filtered_match(pattern: Pattern, condition: Condition, preludes: Vec<Clause>) -> Vec<Clause> {
    if preludes.is_empty() {
        return vec![Clause::matching(pattern, condition.into_where())];
    }
    let mut clauses = vec![Clause::matching(pattern, None)];
    clauses.extend(preludes);
    if let Some(condition) = condition.into_where() {
        clauses.push(Clause::With(WithClause {
            where_clause: Some(condition),
            ..WithClause::star()
        }));
    }
    clauses
}

/// Clauses producing the ordered, windowed rows of a node-valued field,
/// and the expression of one row.
///
/// `project` builds the row of one concrete branch from its node and edge
/// variables. It receives the hidden sort entries the row must carry and
/// pushes the subqueries the row needs.
fn page_rows<'s, F>(
    ctx: &mut CompileContext<'s>,
    rows: &Rows<'s, '_>,
    row_var: Option<&str>,
    mut project: F,
) -> Result<(Vec<Clause>, Expr), TranslatorError>
where
    F: FnMut(
        &mut CompileContext<'s>,
        &'s Entity,
        &str,
        Option<&str>,
        Vec<(String, Expr)>,
        &mut Vec<Clause>,
    ) -> Result<Expr, TranslatorError>,
{
    if let [entity] = *rows.candidates.as_slice() {
        let node_var = match row_var {
            Some(var) => var.to_string(),
            None => ctx.names.node(),
        };
        let BranchMatch {
            edge_var,
            mut clauses,
        } = branch_match(
            ctx,
            rows.source,
            entity,
            rows.filter.as_ref(),
            &node_var,
            rows.bind_edge,
        )?;
        let edge = edge_var.as_deref().map(|var| EdgeBinding {
            var,
            properties: rows.source.properties(),
        });
        let sort = compile_sort(ctx, &rows.sort, entity, &node_var, edge)?;
        clauses.extend(sort.preludes);
        clauses.extend(window_clause(
            &mut ctx.params,
            &node_var,
            &rows.window,
            sort.order_by,
        ));
        let row = project(ctx, entity, &node_var, edge_var.as_deref(), Vec::new(), &mut clauses)?;
        return Ok((clauses, row));
    }

    let row_var = match row_var {
        Some(var) => var.to_string(),
        None => ctx.names.value(),
    };
    let shared = shared_keys(&rows.sort, rows.target.name(), &rows.candidates)?;
    let mut branches = Vec::with_capacity(rows.candidates.len());
    for &entity in &rows.candidates {
        let node_var = ctx.names.node();
        let BranchMatch { edge_var, clauses } = branch_match(
            ctx,
            rows.source,
            entity,
            rows.filter.as_ref(),
            &node_var,
            rows.bind_edge,
        )?;

        // every UNION branch imports the parent on its own
        let mut body: Vec<Clause> = rows
            .source
            .imports()
            .into_iter()
            .map(|v| Clause::With(WithClause::items(vec![ProjectionItem::plain(v)])))
            .collect();
        body.extend(clauses);

        let edge = edge_var.as_deref().map(|var| EdgeBinding {
            var,
            properties: rows.source.properties(),
        });
        let hidden = branch_sort_entries(ctx, &shared, entity, &node_var, edge)?;
        let row = project(ctx, entity, &node_var, edge_var.as_deref(), hidden, &mut body)?;
        body.push(Clause::returning(vec![ProjectionItem::aliased(row, &row_var)]));
        branches.push(body);
    }

    let mut clauses = vec![Clause::call(Vec::new(), vec![Clause::Union(branches)])];
    clauses.extend(window_clause(
        &mut ctx.params,
        &row_var,
        &rows.window,
        merged_order(&shared, &row_var),
    ));
    Ok((clauses, Expr::var(row_var)))
}

fn with_labels(
    polymorphic: bool,
    var: &str,
    mut hidden: Vec<(String, Expr)>,
) -> Vec<(String, Expr)> {
    if polymorphic {
        hidden.insert(0, (LABELS_KEY.to_string(), labels_of(var)));
    }
    hidden
}

fn scalar_item(
    ctx: &mut CompileContext<'_>,
    var: &str,
    field: &ScalarField,
    key: &str,
) -> MapProjectionItem {
    if key == field.name && field.alias.is_none() && field.default_value.is_none() {
        MapProjectionItem::Property(field.name.clone())
    } else {
        MapProjectionItem::Entry(key.to_string(), read_property(ctx, var, field))
    }
}

/// Map projection of `entity` bound as `var` for the children of
/// `selection`, followed by the `hidden` entries.
fn project_node<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    entity: &'s Entity,
    var: &str,
    hidden: Vec<(String, Expr)>,
    calls: &mut Vec<Clause>,
) -> Result<(Expr, Vec<FieldPlan>), TranslatorError> {
    let mut items = Vec::new();
    let mut plans = Vec::new();

    for child in selection.selections_for(&entity.name, &entity.implements) {
        let key = child.response_key().to_string();
        if child.is_typename() {
            plans.push(FieldPlan {
                key,
                shape: FieldShape::Typename,
            });
            continue;
        }
        if let Some(field) = entity.scalar_field(&child.field) {
            items.push(scalar_item(ctx, var, field, &key));
            plans.push(FieldPlan {
                key,
                shape: FieldShape::Scalar {
                    kind: field.kind.clone(),
                    is_list: field.is_list,
                },
            });
            continue;
        }

        let (value, shape) = if let Some(relationship) = entity.declares_relationship(&child.field)
        {
            relationship_list(ctx, child, entity, var, relationship, calls)?
        } else if let Some(relationship) = child
            .field
            .strip_suffix(CONNECTION_SUFFIX)
            .and_then(|name| entity.declares_relationship(name))
        {
            relationship_connection(ctx, child, entity, var, relationship, calls)?
        } else if let Some((call, value_var, stats)) =
            relationship_aggregate_call(ctx, child, entity, var)?
        {
            calls.push(call);
            (Expr::var(value_var), FieldShape::Object(stats))
        } else if let Some(custom) = entity.custom_field(&child.field) {
            custom_field(ctx, child, custom, var, calls)?
        } else {
            return Err(SchemaError::field_error_with_context(
                &entity.name,
                &child.field,
                "While projecting selection",
            )
            .into());
        };
        items.push(MapProjectionItem::Entry(key.clone(), value));
        plans.push(FieldPlan { key, shape });
    }

    items.extend(hidden.into_iter().map(|(k, v)| MapProjectionItem::Entry(k, v)));
    Ok((
        Expr::MapProjection(MapProjection {
            variable: var.to_string(),
            items,
        }),
        plans,
    ))
}

/// Projection of a node bound as `var` that may be any of `candidates`.
fn project_any<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    target: &TypeRef,
    candidates: &[&'s Entity],
    var: &str,
    is_list: bool,
    calls: &mut Vec<Clause>,
) -> Result<(Expr, NodeShape), TranslatorError> {
    let polymorphic = candidates.len() > 1;
    let mut branches = Vec::with_capacity(candidates.len());
    let mut when_then = Vec::with_capacity(candidates.len());
    for &entity in candidates {
        let hidden = with_labels(polymorphic, var, Vec::new());
        let (expr, plans) = project_node(ctx, selection, entity, var, hidden, calls)?;
        branches.push((entity.name.clone(), plans));
        when_then.push((label_condition(var, entity).into_expr(), expr));
    }

    let expr = if polymorphic {
        Expr::Case(CaseExpr {
            when_then,
            else_expr: None,
        })
    } else {
        when_then
            .pop()
            .map(|(_, expr)| expr)
            .unwrap_or(Expr::Literal(Literal::Null))
    };
    Ok((
        expr,
        NodeShape {
            is_list,
            typename: type_resolution(target, candidates),
            branches,
        },
    ))
}

fn relationship_list<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    parent: &'s Entity,
    parent_var: &str,
    relationship: &'s RelationshipField,
    calls: &mut Vec<Clause>,
) -> Result<(Expr, FieldShape), TranslatorError> {
    let schema = ctx.schema;
    let directed = resolve_direction(selection, relationship)?;
    let scope = NodeScope::for_type(schema, &relationship.target)?;
    let is_list = relationship.cardinality.is_list();
    let window = if is_list {
        list_window(ctx.settings, schema.limits(&relationship.target), selection, false)?
    } else {
        PageWindow::default()
    };
    log::trace!(
        "relationship `{}.{}` resolves to {} branch(es)",
        parent.name,
        relationship.name,
        scope.candidates.len()
    );

    let expansion = expand(schema, relationship)?;
    let rows = Rows {
        source: Source::Traversal {
            parent: parent_var,
            relationship,
            properties: expansion.properties,
            directed,
        },
        target: &relationship.target,
        filter: node_filter(schema, selection, &scope)?.map(FieldFilter::Node),
        sort: sort_keys(selection, &scope, None)?,
        window,
        candidates: expansion.candidates,
        bind_edge: false,
    };

    let polymorphic = rows.candidates.len() > 1;
    let mut branches = Vec::with_capacity(rows.candidates.len());
    let (mut body, row) = page_rows(
        ctx,
        &rows,
        None,
        |ctx, entity, node_var, _, hidden, subqueries| {
            let hidden = with_labels(polymorphic, node_var, hidden);
            let (expr, plans) = project_node(ctx, selection, entity, node_var, hidden, subqueries)?;
            branches.push((entity.name.clone(), plans));
            Ok(expr)
        },
    )?;
    let result_var = ctx.names.value();
    body.push(Clause::returning(vec![ProjectionItem::aliased(
        collect_values(row, is_list),
        &result_var,
    )]));
    calls.push(Clause::call(vec![parent_var.to_string()], body));

    let shape = NodeShape {
        is_list,
        typename: type_resolution(&relationship.target, &rows.candidates),
        branches,
    };
    Ok((Expr::var(result_var), FieldShape::Node(shape)))
}

fn relationship_connection<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    parent: &'s Entity,
    parent_var: &str,
    relationship: &'s RelationshipField,
    calls: &mut Vec<Clause>,
) -> Result<(Expr, FieldShape), TranslatorError> {
    let schema = ctx.schema;
    let directed = resolve_direction(selection, relationship)?;
    let expansion = expand(schema, relationship)?;
    let properties = expansion.properties;
    let scope = NodeScope::for_type(schema, &relationship.target)?;
    let edge_types: Vec<&EdgePropertyType> = properties.into_iter().collect();

    let filter = match selection.where_arg() {
        Some(value) => Some(FieldFilter::Connection(
            FilterParser::new(schema).parse_connection_filter(
                &relationship.name,
                value,
                &NodeScope::entity(parent),
            )?,
        )),
        None => None,
    };
    let rows = Rows {
        source: Source::Traversal {
            parent: parent_var,
            relationship,
            properties,
            directed,
        },
        target: &relationship.target,
        filter,
        sort: sort_keys(selection, &scope, Some(edge_types.as_slice()))?,
        window: connection_window(
            ctx.settings,
            schema.limits(&relationship.target),
            selection,
            &parent.name,
            false,
        )?,
        candidates: expansion.candidates,
        bind_edge: true,
    };

    let stem = format!("{}{}", parent.name, upper_first(&relationship.name));
    let parts = connection(ctx, selection, rows, &stem)?;
    calls.extend(parts.clauses);
    Ok((parts.value, FieldShape::Connection(parts.shape)))
}

struct ConnectionParts {
    /// Subqueries to run in the scope that owns the connection
    clauses: Vec<Clause>,
    /// `{ edges, totalCount }` map
    value: Expr,
    shape: ConnectionShape,
}

/// Selected entry of an `edges` object, before the node shape is known.
enum EdgeSlot {
    Node(String),
    Properties(String),
    Cursor(String),
    Constant(String, serde_json::Value),
}

fn connection<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    rows: Rows<'s, '_>,
    stem: &str,
) -> Result<ConnectionParts, TranslatorError> {
    let unknown = |field: &str, context: &str| -> TranslatorError {
        SchemaError::field_error_with_context(format!("{}Connection", stem), field, context).into()
    };

    let mut selections = Vec::new();
    let mut edge_layouts: Vec<(String, Vec<EdgeSlot>)> = Vec::new();
    let mut node_selection = SelectionTree::new(EDGE_NODE_KEY);
    let mut properties_selection = SelectionTree::new(EDGE_PROPERTIES_KEY);
    let mut wants_properties = false;
    let mut needs_total = false;

    for child in &selection.selections {
        let key = child.response_key().to_string();
        match child.field.as_str() {
            "totalCount" => {
                needs_total = true;
                selections.push(ConnectionField::TotalCount(key));
            }
            "pageInfo" => {
                needs_total = true;
                let mut fields = Vec::new();
                for info in &child.selections {
                    let k = info.response_key().to_string();
                    fields.push(match info.field.as_str() {
                        "hasNextPage" => PageInfoField::HasNextPage(k),
                        "hasPreviousPage" => PageInfoField::HasPreviousPage(k),
                        "startCursor" => PageInfoField::StartCursor(k),
                        "endCursor" => PageInfoField::EndCursor(k),
                        _ if info.is_typename() => PageInfoField::Constant(k, "PageInfo".into()),
                        other => return Err(unknown(other, "While projecting pageInfo")),
                    });
                }
                selections.push(ConnectionField::PageInfo { key, fields });
            }
            "edges" => {
                let mut slots = Vec::new();
                for part in &child.selections {
                    let k = part.response_key().to_string();
                    match part.field.as_str() {
                        "node" => {
                            node_selection.selections.extend(part.selections.iter().cloned());
                            slots.push(EdgeSlot::Node(k));
                        }
                        "properties" => {
                            wants_properties = true;
                            properties_selection
                                .selections
                                .extend(part.selections.iter().cloned());
                            slots.push(EdgeSlot::Properties(k));
                        }
                        "cursor" => slots.push(EdgeSlot::Cursor(k)),
                        _ if part.is_typename() => slots.push(EdgeSlot::Constant(
                            k,
                            format!("{}Relationship", stem).into(),
                        )),
                        other => return Err(unknown(other, "While projecting edges")),
                    }
                }
                edge_layouts.push((key, slots));
            }
            _ if child.is_typename() => selections.push(ConnectionField::Constant(
                key,
                format!("{}Connection", stem).into(),
            )),
            other => return Err(unknown(other, "While projecting connection")),
        }
    }

    let mut clauses = Vec::new();
    let mut entries = Vec::new();
    let polymorphic = rows.candidates.len() > 1;
    let properties = rows.source.properties();
    let mut node_branches = Vec::with_capacity(rows.candidates.len());
    let mut property_plans: Option<(String, Vec<FieldPlan>)> = None;

    if !edge_layouts.is_empty() {
        let (mut body, row) = page_rows(
            ctx,
            &rows,
            None,
            |ctx, entity, node_var, edge_var, hidden, subqueries| {
                let (node, plans) = project_node(
                    ctx,
                    &node_selection,
                    entity,
                    node_var,
                    with_labels(polymorphic, node_var, Vec::new()),
                    subqueries,
                )?;
                node_branches.push((entity.name.clone(), plans));

                let mut row = vec![(EDGE_NODE_KEY.to_string(), node)];
                if wants_properties {
                    let value = match (properties, edge_var) {
                        (Some(props), Some(edge_var)) => {
                            let (expr, plans) =
                                project_edge(ctx, &properties_selection, props, edge_var)?;
                            property_plans = Some((props.name.clone(), plans));
                            expr
                        }
                        _ => Expr::Literal(Literal::Null),
                    };
                    row.push((EDGE_PROPERTIES_KEY.to_string(), value));
                }
                row.extend(hidden);
                Ok(Expr::Map(row))
            },
        )?;
        let edges_var = ctx.names.value();
        body.push(Clause::returning(vec![ProjectionItem::aliased(
            collect_values(row, true),
            &edges_var,
        )]));
        clauses.push(Clause::call(rows.source.imports(), body));
        entries.push((EDGES_KEY.to_string(), Expr::var(edges_var)));
    }

    if needs_total {
        let mut counts = Vec::with_capacity(rows.candidates.len());
        for &entity in &rows.candidates {
            let node_var = ctx.names.node();
            let mut body = branch_match(
                ctx,
                rows.source,
                entity,
                rows.filter.as_ref(),
                &node_var,
                rows.bind_edge,
            )?
            .clauses;
            let count_var = ctx.names.value();
            body.push(Clause::returning(vec![ProjectionItem::aliased(
                Expr::call("count", vec![Expr::var(&node_var)]),
                &count_var,
            )]));
            clauses.push(Clause::call(rows.source.imports(), body));
            counts.push(Expr::var(count_var));
        }
        let total = counts
            .into_iter()
            .reduce(|a, b| Expr::binary(Operator::Addition, a, b))
            .unwrap_or(Expr::Literal(Literal::Integer(0)));
        entries.push((TOTAL_COUNT_KEY.to_string(), total));
    }

    let node_shape = NodeShape {
        is_list: false,
        typename: type_resolution(rows.target, &rows.candidates),
        branches: node_branches,
    };
    let property_branches: Vec<_> = property_plans.into_iter().collect();
    for (key, slots) in edge_layouts {
        let fields = slots
            .into_iter()
            .map(|slot| match slot {
                EdgeSlot::Node(key) => EdgeField::Node {
                    key,
                    shape: node_shape.clone(),
                },
                EdgeSlot::Properties(key) => EdgeField::Properties {
                    key,
                    branches: property_branches.clone(),
                },
                EdgeSlot::Cursor(key) => EdgeField::Cursor(key),
                EdgeSlot::Constant(key, value) => EdgeField::Constant(key, value),
            })
            .collect();
        selections.push(ConnectionField::Edges { key, fields });
    }

    Ok(ConnectionParts {
        clauses,
        value: Expr::Map(entries),
        shape: ConnectionShape {
            window: rows.window,
            selections,
        },
    })
}

/// Map projection of the edge bound as `var` carrying `properties`.
fn project_edge(
    ctx: &mut CompileContext<'_>,
    selection: &SelectionTree,
    properties: &EdgePropertyType,
    var: &str,
) -> Result<(Expr, Vec<FieldPlan>), TranslatorError> {
    let mut items = Vec::new();
    let mut plans = Vec::new();
    for child in selection.selections_for(&properties.name, &[]) {
        let key = child.response_key().to_string();
        if child.is_typename() {
            plans.push(FieldPlan {
                key,
                shape: FieldShape::Typename,
            });
            continue;
        }
        let field = properties.scalar_field(&child.field).ok_or_else(|| {
            SchemaError::field_error_with_context(
                &properties.name,
                &child.field,
                "While projecting edge properties",
            )
        })?;
        items.push(scalar_item(ctx, var, field, &key));
        plans.push(FieldPlan {
            key,
            shape: FieldShape::Scalar {
                kind: field.kind.clone(),
                is_list: field.is_list,
            },
        });
    }
    items.push(MapProjectionItem::Entry(
        PROPERTIES_TYPE_KEY.to_string(),
        Expr::string(&properties.name),
    ));
    Ok((
        Expr::MapProjection(MapProjection {
            variable: var.to_string(),
            items,
        }),
        plans,
    ))
}

/// One row of a custom field's statement bound as `var`.
fn custom_row<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    custom: &'s CustomField,
    var: &str,
    is_list: bool,
    calls: &mut Vec<Clause>,
) -> Result<(Expr, FieldShape), TranslatorError> {
    match &custom.target {
        CustomTarget::Scalar(kind) => Ok((
            Expr::var(var),
            FieldShape::Scalar {
                kind: kind.clone(),
                is_list,
            },
        )),
        CustomTarget::Entity(name) => {
            let schema = ctx.schema;
            let target = schema.type_ref(name)?;
            let candidates = schema.concrete_entities(&target)?;
            let (expr, shape) =
                project_any(ctx, selection, &target, &candidates, var, is_list, calls)?;
            Ok((expr, FieldShape::Node(shape)))
        }
    }
}

fn custom_field<'s>(
    ctx: &mut CompileContext<'s>,
    selection: &SelectionTree,
    custom: &'s CustomField,
    parent_var: &str,
    calls: &mut Vec<Clause>,
) -> Result<(Expr, FieldShape), TranslatorError> {
    let row_var = ctx.names.node();
    let mut body = statement_clauses(
        ctx,
        custom,
        Some(parent_var),
        &selection.arguments,
        &row_var,
    )?;
    let is_list = custom.cardinality.is_list();
    let (row, shape) = custom_row(ctx, selection, custom, &row_var, is_list, &mut body)?;
    let result_var = ctx.names.value();
    body.push(Clause::returning(vec![ProjectionItem::aliased(
        collect_values(row, is_list),
        &result_var,
    )]));
    calls.push(Clause::call(vec![parent_var.to_string()], body));
    Ok((Expr::var(result_var), shape))
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
