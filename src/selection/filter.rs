//! `where` argument parsing.
//!
//! The raw JSON filter is read against the schema model into a
//! [`FilterNode`] tree. Parsing is schema aware but not branch specific: a
//! node scope lists every concrete entity the filtered value may be, and a
//! key is accepted when at least one of them knows it. Whether a key applies
//! to a given concrete branch is decided later, when the predicate compiler
//! walks the tree for that branch.

use serde_json::{Map, Value};

use super::errors::SelectionError;
use crate::result_shaper::temporal::is_valid_temporal_input;
use crate::schema_model::{
    CustomTarget, EdgePropertyType, Entity, FieldContainer, ScalarKind, SchemaError, SchemaModel,
    TypeRef,
};

pub const AGGREGATE_SUFFIX: &str = "Aggregate";
pub const TYPENAME_FILTER: &str = "typename";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparator {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "eq" | "equals" => Some(Comparator::Eq),
            "lt" => Some(Comparator::Lt),
            "lte" => Some(Comparator::Lte),
            "gt" => Some(Comparator::Gt),
            "gte" => Some(Comparator::Gte),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    In,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    IsNull,
    Includes,
    /// Distance between a point field and `value.point`, compared to
    /// `value.distance`
    Distance(Comparator),
}

impl ComparisonOperator {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "eq" | "equals" => Some(ComparisonOperator::Eq),
            "in" => Some(ComparisonOperator::In),
            "lt" => Some(ComparisonOperator::Lt),
            "lte" => Some(ComparisonOperator::Lte),
            "gt" => Some(ComparisonOperator::Gt),
            "gte" => Some(ComparisonOperator::Gte),
            "contains" => Some(ComparisonOperator::Contains),
            "startsWith" => Some(ComparisonOperator::StartsWith),
            "endsWith" => Some(ComparisonOperator::EndsWith),
            "matches" => Some(ComparisonOperator::Matches),
            "isNull" => Some(ComparisonOperator::IsNull),
            "includes" => Some(ComparisonOperator::Includes),
            _ => None,
        }
    }

    /// Stem used in generated parameter names.
    pub fn key(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::In => "in",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::StartsWith => "startsWith",
            ComparisonOperator::EndsWith => "endsWith",
            ComparisonOperator::Matches => "matches",
            ComparisonOperator::IsNull => "isNull",
            ComparisonOperator::Includes => "includes",
            ComparisonOperator::Distance(_) => "distance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    None,
    Single,
    Some,
}

impl Quantifier {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "all" => Some(Quantifier::All),
            "none" => Some(Quantifier::None),
            "single" => Some(Quantifier::Single),
            "some" => Some(Quantifier::Some),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateTarget {
    Count,
    Node(String),
    Edge(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Average,
    Sum,
    ShortestLength,
    LongestLength,
    AverageLength,
}

impl AggregateFunction {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            "average" => Some(AggregateFunction::Average),
            "sum" => Some(AggregateFunction::Sum),
            "shortestLength" => Some(AggregateFunction::ShortestLength),
            "longestLength" => Some(AggregateFunction::LongestLength),
            "averageLength" => Some(AggregateFunction::AverageLength),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Average => "average",
            AggregateFunction::Sum => "sum",
            AggregateFunction::ShortestLength => "shortestLength",
            AggregateFunction::LongestLength => "longestLength",
            AggregateFunction::AverageLength => "averageLength",
        }
    }

    /// Whether the function operates on string length rather than value.
    pub fn is_length_based(self) -> bool {
        matches!(
            self,
            AggregateFunction::ShortestLength
                | AggregateFunction::LongestLength
                | AggregateFunction::AverageLength
        )
    }

    fn accepts(self, kind: &ScalarKind) -> bool {
        match self {
            AggregateFunction::Count => false,
            AggregateFunction::Min | AggregateFunction::Max => {
                kind.is_numeric() || kind.is_temporal() || kind.is_duration() || kind.is_string_like()
            }
            AggregateFunction::Average | AggregateFunction::Sum => {
                kind.is_numeric() || kind.is_duration()
            }
            AggregateFunction::ShortestLength
            | AggregateFunction::LongestLength
            | AggregateFunction::AverageLength => kind.is_string_like(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: Value,
    /// The field is resolved by a custom Cypher statement
    pub custom: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipFilter {
    pub relationship: String,
    pub quantifier: Quantifier,
    pub node_filter: Option<FilterNode>,
    pub edge_filter: Option<FilterNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateComparison {
    pub relationship: String,
    pub target: AggregateTarget,
    pub function: AggregateFunction,
    pub comparator: Comparator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Comparison(Comparison),
    Logical {
        op: LogicalOp,
        children: Vec<FilterNode>,
    },
    RelationshipQuantifier(Box<RelationshipFilter>),
    AggregateComparison(AggregateComparison),
    /// Applies `filter` only to values of `type_name` (an entity or an
    /// edge-property-type); other values are unconstrained by it
    Narrow {
        type_name: String,
        filter: Box<FilterNode>,
    },
    /// Restricts polymorphic values to the listed concrete types
    Typename(Vec<String>),
}

impl FilterNode {
    pub fn and(mut children: Vec<FilterNode>) -> FilterNode {
        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        FilterNode::Logical {
            op: LogicalOp::And,
            children,
        }
    }

    pub fn not(child: FilterNode) -> FilterNode {
        FilterNode::Logical {
            op: LogicalOp::Not,
            children: vec![child],
        }
    }
}

/// `where` of a relationship connection field: node and edge conditions
/// combined with the usual logical operators.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionFilter {
    Node(FilterNode),
    Edge(FilterNode),
    Logical {
        op: LogicalOp,
        children: Vec<ConnectionFilter>,
    },
}

impl ConnectionFilter {
    fn and(mut children: Vec<ConnectionFilter>) -> ConnectionFilter {
        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        ConnectionFilter::Logical {
            op: LogicalOp::And,
            children,
        }
    }
}

/// The concrete entities a node filter may apply to.
#[derive(Debug, Clone)]
pub struct NodeScope<'s> {
    pub type_name: String,
    pub candidates: Vec<&'s Entity>,
    /// Union scopes only accept filters keyed by member type
    pub keyed_only: bool,
}

impl<'s> NodeScope<'s> {
    pub fn for_type(schema: &'s SchemaModel, target: &TypeRef) -> Result<Self, SchemaError> {
        Ok(NodeScope {
            type_name: target.name().to_string(),
            candidates: schema.concrete_entities(target)?,
            keyed_only: matches!(target, TypeRef::Union(_)),
        })
    }

    pub fn entity(entity: &'s Entity) -> Self {
        NodeScope {
            type_name: entity.name.clone(),
            candidates: vec![entity],
            keyed_only: false,
        }
    }

    fn candidate_names(&self) -> Vec<&str> {
        self.candidates.iter().map(|e| e.name.as_str()).collect()
    }

    fn member(&self, name: &str) -> Option<&'s Entity> {
        self.candidates.iter().copied().find(|e| e.name == name)
    }
}

struct EdgeScope<'s> {
    relationship: String,
    types: Vec<&'s EdgePropertyType>,
}

/// Kind and list-ness of whatever a comparison key resolves to.
struct FieldSpec<'a> {
    type_name: &'a str,
    name: &'a str,
    kind: &'a ScalarKind,
    is_list: bool,
}

pub struct FilterParser<'s> {
    schema: &'s SchemaModel,
}

impl<'s> FilterParser<'s> {
    pub fn new(schema: &'s SchemaModel) -> Self {
        FilterParser { schema }
    }

    /// Parse a node-level `where` object.
    pub fn parse_node_filter(
        &self,
        value: &Value,
        scope: &NodeScope<'s>,
    ) -> Result<FilterNode, SelectionError> {
        let object = expect_object(value, &scope.type_name, "where")?;
        let mut children = Vec::with_capacity(object.len());

        for (key, val) in object {
            let node = match key.as_str() {
                "AND" | "OR" => {
                    let parts = expect_array(val, &scope.type_name, key)?
                        .iter()
                        .map(|v| self.parse_node_filter(v, scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    FilterNode::Logical {
                        op: if key == "AND" { LogicalOp::And } else { LogicalOp::Or },
                        children: parts,
                    }
                }
                "NOT" => FilterNode::not(self.parse_node_filter(val, scope)?),
                TYPENAME_FILTER => self.parse_typename_filter(val, scope)?,
                _ => self.parse_node_key(key, val, scope)?,
            };
            children.push(node);
        }

        Ok(FilterNode::and(children))
    }

    /// Parse the `where` of `<relationship>Connection` selected on `scope`.
    pub fn parse_connection_filter(
        &self,
        relationship: &str,
        value: &Value,
        scope: &NodeScope<'s>,
    ) -> Result<ConnectionFilter, SelectionError> {
        let (target_scope, edge_scope) = self.relationship_scopes(relationship, scope)?;
        self.connection_filter(relationship, value, &target_scope, &edge_scope)
    }

    fn connection_filter(
        &self,
        relationship: &str,
        value: &Value,
        target_scope: &NodeScope<'s>,
        edge_scope: &EdgeScope<'s>,
    ) -> Result<ConnectionFilter, SelectionError> {
        let object = expect_object(value, relationship, "where")?;
        let mut children = Vec::with_capacity(object.len());
        for (key, val) in object {
            let filter = match key.as_str() {
                "node" => ConnectionFilter::Node(self.parse_node_filter(val, target_scope)?),
                "edge" => ConnectionFilter::Edge(self.parse_edge_filter(val, edge_scope)?),
                "AND" | "OR" => ConnectionFilter::Logical {
                    op: if key == "AND" { LogicalOp::And } else { LogicalOp::Or },
                    children: expect_array(val, relationship, key)?
                        .iter()
                        .map(|v| self.connection_filter(relationship, v, target_scope, edge_scope))
                        .collect::<Result<Vec<_>, _>>()?,
                },
                "NOT" => ConnectionFilter::Logical {
                    op: LogicalOp::Not,
                    children: vec![self.connection_filter(
                        relationship,
                        val,
                        target_scope,
                        edge_scope,
                    )?],
                },
                other => {
                    return Err(SelectionError::filter(
                        relationship,
                        other,
                        "connection filters are keyed by node, edge, AND, OR or NOT",
                    ))
                }
            };
            children.push(filter);
        }
        Ok(ConnectionFilter::and(children))
    }

    fn parse_typename_filter(
        &self,
        value: &Value,
        scope: &NodeScope<'s>,
    ) -> Result<FilterNode, SelectionError> {
        let names = expect_array(value, &scope.type_name, TYPENAME_FILTER)?
            .iter()
            .map(|v| {
                v.as_str()
                    .filter(|name| scope.member(name).is_some())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        SelectionError::filter(
                            &scope.type_name,
                            TYPENAME_FILTER,
                            format!("{} is not a member type", v),
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterNode::Typename(names))
    }

    fn parse_node_key(
        &self,
        key: &str,
        value: &Value,
        scope: &NodeScope<'s>,
    ) -> Result<FilterNode, SelectionError> {
        if scope.candidates.len() > 1 {
            if let Some(member) = scope.member(key) {
                let narrowed = self.parse_node_filter(value, &NodeScope::entity(member))?;
                return Ok(FilterNode::Narrow {
                    type_name: member.name.clone(),
                    filter: Box::new(narrowed),
                });
            }
        }

        if scope.keyed_only {
            return Err(SelectionError::filter(
                &scope.type_name,
                key,
                "filters on a union must be keyed by member type",
            ));
        }

        if let Some(field) = scope
            .candidates
            .iter()
            .find_map(|e| e.scalar_field(key).map(|f| (e, f)))
            .map(|(e, f)| FieldSpec {
                type_name: &e.name,
                name: &f.name,
                kind: &f.kind,
                is_list: f.is_list,
            })
        {
            return self.parse_comparisons(&field, value, false);
        }

        if let Some(spec) = scope.candidates.iter().find_map(|e| {
            e.custom_field(key).and_then(|c| match &c.target {
                CustomTarget::Scalar(kind) => Some(FieldSpec {
                    type_name: &e.name,
                    name: &c.name,
                    kind,
                    is_list: c.cardinality.is_list(),
                }),
                CustomTarget::Entity(_) => None,
            })
        }) {
            return self.parse_comparisons(&spec, value, true);
        }

        if scope
            .candidates
            .iter()
            .any(|e| e.declares_relationship(key).is_some())
        {
            return self.parse_quantifiers(key, value, scope);
        }

        if let Some(relationship) = key.strip_suffix(AGGREGATE_SUFFIX) {
            if scope
                .candidates
                .iter()
                .any(|e| e.declares_relationship(relationship).is_some())
            {
                return self.parse_aggregate_filter(relationship, value, scope);
            }
        }

        if scope.candidates.len() > 1 {
            Err(SelectionError::polymorphic_branch(
                key,
                &scope.candidate_names(),
            ))
        } else {
            Err(SchemaError::field_error_with_context(
                &scope.type_name,
                key,
                "While parsing `where`",
            )
            .into())
        }
    }

    fn parse_quantifiers(
        &self,
        relationship: &str,
        value: &Value,
        scope: &NodeScope<'s>,
    ) -> Result<FilterNode, SelectionError> {
        let object = expect_object(value, &scope.type_name, relationship)?;
        let (target_scope, edge_scope) = self.relationship_scopes(relationship, scope)?;
        let mut children = Vec::new();

        for (key, inner) in object {
            let quantifier = Quantifier::parse(key).ok_or_else(|| {
                SelectionError::filter(
                    &scope.type_name,
                    relationship,
                    format!("unknown quantifier `{}` (expected all, none, single or some)", key),
                )
            })?;
            let inner = expect_object(inner, &scope.type_name, relationship)?;

            let mut node_filter = None;
            let mut edge_filter = None;
            for (part, filter) in inner {
                match part.as_str() {
                    "node" => node_filter = Some(self.parse_node_filter(filter, &target_scope)?),
                    "edge" => edge_filter = Some(self.parse_edge_filter(filter, &edge_scope)?),
                    other => {
                        return Err(SelectionError::filter(
                            &scope.type_name,
                            relationship,
                            format!("unexpected key `{}` (expected node or edge)", other),
                        ))
                    }
                }
            }

            children.push(FilterNode::RelationshipQuantifier(Box::new(
                RelationshipFilter {
                    relationship: relationship.to_string(),
                    quantifier,
                    node_filter,
                    edge_filter,
                },
            )));
        }

        Ok(FilterNode::and(children))
    }

    /// Target node scope and the edge-property-types the relationship may
    /// carry across every candidate declaring it.
    fn relationship_scopes(
        &self,
        relationship: &str,
        scope: &NodeScope<'s>,
    ) -> Result<(NodeScope<'s>, EdgeScope<'s>), SelectionError> {
        let fields: Vec<_> = scope
            .candidates
            .iter()
            .filter_map(|e| e.declares_relationship(relationship))
            .collect();
        let first = fields.first().ok_or_else(|| SchemaError::UnknownRelationship {
            type_name: scope.type_name.clone(),
            relationship: relationship.to_string(),
        })?;

        let target_scope = NodeScope::for_type(self.schema, &first.target)?;

        let mut types: Vec<&'s EdgePropertyType> = Vec::new();
        for field in &fields {
            if let Some(name) = &field.properties {
                let props = self.schema.edge_properties(name)?;
                if !types.iter().any(|t| t.name == props.name) {
                    types.push(props);
                }
            }
        }

        Ok((
            target_scope,
            EdgeScope {
                relationship: relationship.to_string(),
                types,
            },
        ))
    }

    fn parse_edge_filter(
        &self,
        value: &Value,
        scope: &EdgeScope<'s>,
    ) -> Result<FilterNode, SelectionError> {
        let object = expect_object(value, &scope.relationship, "edge")?;
        let mut children = Vec::with_capacity(object.len());

        for (key, val) in object {
            let node = match key.as_str() {
                "AND" | "OR" => {
                    let parts = expect_array(val, &scope.relationship, key)?
                        .iter()
                        .map(|v| self.parse_edge_filter(v, scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    FilterNode::Logical {
                        op: if key == "AND" { LogicalOp::And } else { LogicalOp::Or },
                        children: parts,
                    }
                }
                "NOT" => FilterNode::not(self.parse_edge_filter(val, scope)?),
                _ => self.parse_edge_key(key, val, scope)?,
            };
            children.push(node);
        }

        Ok(FilterNode::and(children))
    }

    fn parse_edge_key(
        &self,
        key: &str,
        value: &Value,
        scope: &EdgeScope<'s>,
    ) -> Result<FilterNode, SelectionError> {
        if let Some(props) = scope.types.iter().find(|t| t.name == key) {
            let narrowed = self.parse_edge_filter(
                value,
                &EdgeScope {
                    relationship: scope.relationship.clone(),
                    types: vec![*props],
                },
            )?;
            return Ok(FilterNode::Narrow {
                type_name: props.name.clone(),
                filter: Box::new(narrowed),
            });
        }

        if let Some(spec) = scope.types.iter().find_map(|t| {
            t.scalar_field(key).map(|f| FieldSpec {
                type_name: &t.name,
                name: &f.name,
                kind: &f.kind,
                is_list: f.is_list,
            })
        }) {
            return self.parse_comparisons(&spec, value, false);
        }

        match scope.types.len() {
            0 => Err(SelectionError::filter(
                &scope.relationship,
                key,
                "relationship carries no edge properties",
            )),
            1 => Err(SchemaError::field_error_with_context(
                &scope.types[0].name,
                key,
                "While parsing edge `where`",
            )
            .into()),
            _ => {
                let names: Vec<&str> = scope.types.iter().map(|t| t.name.as_str()).collect();
                Err(SelectionError::polymorphic_branch(key, &names))
            }
        }
    }

    fn parse_aggregate_filter(
        &self,
        relationship: &str,
        value: &Value,
        scope: &NodeScope<'s>,
    ) -> Result<FilterNode, SelectionError> {
        let context = format!("{}{}", relationship, AGGREGATE_SUFFIX);
        let object = expect_object(value, &scope.type_name, &context)?;
        let (target_scope, edge_scope) = self.relationship_scopes(relationship, scope)?;
        let mut children = Vec::new();

        for (key, val) in object {
            match key.as_str() {
                "AND" | "OR" => {
                    let parts = expect_array(val, &scope.type_name, key)?
                        .iter()
                        .map(|v| self.parse_aggregate_filter(relationship, v, scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    children.push(FilterNode::Logical {
                        op: if key == "AND" { LogicalOp::And } else { LogicalOp::Or },
                        children: parts,
                    });
                }
                "NOT" => children.push(FilterNode::not(self.parse_aggregate_filter(
                    relationship,
                    val,
                    scope,
                )?)),
                "count" => {
                    for (comparator, v) in comparator_map(val, &scope.type_name, &context)? {
                        let count = v.as_u64().ok_or_else(|| {
                            SelectionError::filter(
                                &scope.type_name,
                                &context,
                                "count must be compared with a non-negative integer",
                            )
                        })?;
                        children.push(FilterNode::AggregateComparison(AggregateComparison {
                            relationship: relationship.to_string(),
                            target: AggregateTarget::Count,
                            function: AggregateFunction::Count,
                            comparator,
                            value: Value::from(count),
                        }));
                    }
                }
                "node" => {
                    let fields = expect_object(val, &scope.type_name, &context)?;
                    for (field, ops) in fields {
                        let spec = target_scope
                            .candidates
                            .iter()
                            .find_map(|e| {
                                e.scalar_field(field).map(|f| FieldSpec {
                                    type_name: &e.name,
                                    name: &f.name,
                                    kind: &f.kind,
                                    is_list: f.is_list,
                                })
                            })
                            .ok_or_else(|| {
                                SchemaError::field_error_with_context(
                                    &target_scope.type_name,
                                    field,
                                    format!("While parsing `{}`", context),
                                )
                            })?;
                        children.extend(self.parse_aggregate_ops(
                            relationship,
                            AggregateTarget::Node(field.clone()),
                            &spec,
                            ops,
                        )?);
                    }
                }
                "edge" => {
                    let fields = expect_object(val, &scope.type_name, &context)?;
                    for (field, ops) in fields {
                        let spec = edge_scope
                            .types
                            .iter()
                            .find_map(|t| {
                                t.scalar_field(field).map(|f| FieldSpec {
                                    type_name: &t.name,
                                    name: &f.name,
                                    kind: &f.kind,
                                    is_list: f.is_list,
                                })
                            })
                            .ok_or_else(|| {
                                SelectionError::filter(
                                    &context,
                                    field,
                                    "no edge-property-type of the relationship declares this field",
                                )
                            })?;
                        children.extend(self.parse_aggregate_ops(
                            relationship,
                            AggregateTarget::Edge(field.clone()),
                            &spec,
                            ops,
                        )?);
                    }
                }
                other => {
                    return Err(SelectionError::filter(
                        &scope.type_name,
                        &context,
                        format!("unexpected key `{}`", other),
                    ))
                }
            }
        }

        Ok(FilterNode::and(children))
    }

    fn parse_aggregate_ops(
        &self,
        relationship: &str,
        target: AggregateTarget,
        spec: &FieldSpec<'_>,
        value: &Value,
    ) -> Result<Vec<FilterNode>, SelectionError> {
        let functions = expect_object(value, spec.type_name, spec.name)?;
        let mut out = Vec::new();

        for (key, comparators) in functions {
            let function = AggregateFunction::parse(key)
                .filter(|f| f.accepts(spec.kind) && !spec.is_list)
                .ok_or_else(|| {
                    SelectionError::filter(
                        spec.type_name,
                        spec.name,
                        format!("aggregate `{}` is not available for {}", key, spec.kind),
                    )
                })?;

            for (comparator, v) in comparator_map(comparators, spec.type_name, spec.name)? {
                let value = if function.is_length_based()
                    || (function == AggregateFunction::Average && spec.kind.is_numeric())
                {
                    if !v.is_number() {
                        return Err(SelectionError::filter(
                            spec.type_name,
                            spec.name,
                            format!("`{}` must be compared with a number", key),
                        ));
                    }
                    v.clone()
                } else {
                    self.scalar_value(spec, v)?
                };
                out.push(FilterNode::AggregateComparison(AggregateComparison {
                    relationship: relationship.to_string(),
                    target: target.clone(),
                    function,
                    comparator,
                    value,
                }));
            }
        }

        Ok(out)
    }

    fn parse_comparisons(
        &self,
        spec: &FieldSpec<'_>,
        value: &Value,
        custom: bool,
    ) -> Result<FilterNode, SelectionError> {
        let operators = expect_object(value, spec.type_name, spec.name)?;
        let mut children = Vec::with_capacity(operators.len());

        let comparison = |operator, value| {
            FilterNode::Comparison(Comparison {
                field: spec.name.to_string(),
                operator,
                value,
                custom,
            })
        };

        for (key, operand) in operators {
            if key == "distance" {
                if !spec.kind.is_spatial() || spec.is_list {
                    return Err(self.unsupported(spec, key));
                }
                let distance = expect_object(operand, spec.type_name, spec.name)?;
                let point = distance.get("point").ok_or_else(|| {
                    SelectionError::filter(spec.type_name, spec.name, "distance requires `point`")
                })?;
                let point = self.scalar_value(spec, point)?;
                for (k, v) in distance.iter().filter(|(k, _)| k.as_str() != "point") {
                    let comparator = Comparator::parse(k).ok_or_else(|| self.unsupported(spec, k))?;
                    if !v.is_number() {
                        return Err(SelectionError::filter(
                            spec.type_name,
                            spec.name,
                            "distance must be compared with a number",
                        ));
                    }
                    let mut bound = Map::new();
                    bound.insert("point".to_string(), point.clone());
                    bound.insert("distance".to_string(), v.clone());
                    children.push(comparison(
                        ComparisonOperator::Distance(comparator),
                        Value::Object(bound),
                    ));
                }
                continue;
            }

            let operator =
                ComparisonOperator::parse(key).ok_or_else(|| self.unsupported(spec, key))?;

            let node = match operator {
                ComparisonOperator::Eq if operand.is_null() => {
                    comparison(ComparisonOperator::IsNull, Value::Bool(true))
                }
                ComparisonOperator::Eq if spec.is_list => {
                    let items = expect_array(operand, spec.type_name, spec.name)?;
                    comparison(operator, self.scalar_list(spec, items)?)
                }
                ComparisonOperator::Eq => comparison(operator, self.scalar_value(spec, operand)?),
                ComparisonOperator::In => {
                    if spec.is_list || spec.kind.is_spatial() {
                        return Err(self.unsupported(spec, key));
                    }
                    let items = expect_array(operand, spec.type_name, spec.name)?;
                    comparison(operator, self.scalar_list(spec, items)?)
                }
                ComparisonOperator::Lt
                | ComparisonOperator::Lte
                | ComparisonOperator::Gt
                | ComparisonOperator::Gte => {
                    if spec.is_list || !spec.kind.is_ordered() {
                        return Err(self.unsupported(spec, key));
                    }
                    comparison(operator, self.scalar_value(spec, operand)?)
                }
                ComparisonOperator::Contains
                | ComparisonOperator::StartsWith
                | ComparisonOperator::EndsWith
                | ComparisonOperator::Matches => {
                    if spec.is_list || !spec.kind.is_string_like() {
                        return Err(self.unsupported(spec, key));
                    }
                    let text = operand.as_str().ok_or_else(|| {
                        SelectionError::filter(spec.type_name, spec.name, "expected a string")
                    })?;
                    comparison(operator, Value::String(text.to_string()))
                }
                ComparisonOperator::IsNull => {
                    let flag = operand.as_bool().ok_or_else(|| {
                        SelectionError::filter(spec.type_name, spec.name, "isNull expects a boolean")
                    })?;
                    comparison(operator, Value::Bool(flag))
                }
                ComparisonOperator::Includes => {
                    if !spec.is_list {
                        return Err(self.unsupported(spec, key));
                    }
                    comparison(operator, self.scalar_value(spec, operand)?)
                }
                ComparisonOperator::Distance(_) => return Err(self.unsupported(spec, key)),
            };
            children.push(node);
        }

        Ok(FilterNode::and(children))
    }

    fn unsupported(&self, spec: &FieldSpec<'_>, operator: &str) -> SelectionError {
        let shape = if spec.is_list { "list of " } else { "" };
        SelectionError::filter(
            spec.type_name,
            spec.name,
            format!(
                "operator `{}` is not supported for {}{}",
                operator, shape, spec.kind
            ),
        )
    }

    fn scalar_list(&self, spec: &FieldSpec<'_>, items: &[Value]) -> Result<Value, SelectionError> {
        items
            .iter()
            .map(|v| self.scalar_value(spec, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    /// Check a literal against the field kind, normalising where the store
    /// expects a different JSON shape.
    fn scalar_value(&self, spec: &FieldSpec<'_>, value: &Value) -> Result<Value, SelectionError> {
        let invalid = |expected: &str| {
            SelectionError::filter(
                spec.type_name,
                spec.name,
                format!("expected {}, got {}", expected, value),
            )
        };

        match spec.kind {
            ScalarKind::Id => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) if n.is_i64() => Ok(Value::String(n.to_string())),
                _ => Err(invalid("an ID")),
            },
            ScalarKind::String => value.is_string().then(|| value.clone()).ok_or_else(|| invalid("a string")),
            ScalarKind::Int => value
                .as_i64()
                .filter(|i| i32::try_from(*i).is_ok())
                .map(Value::from)
                .ok_or_else(|| invalid("a 32-bit integer")),
            ScalarKind::Float => value.is_number().then(|| value.clone()).ok_or_else(|| invalid("a number")),
            ScalarKind::BigInt => match value {
                Value::Number(n) if n.is_i64() => Ok(value.clone()),
                Value::String(s) => s
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| invalid("a 64-bit integer")),
                _ => Err(invalid("a 64-bit integer")),
            },
            ScalarKind::Boolean => value.is_boolean().then(|| value.clone()).ok_or_else(|| invalid("a boolean")),
            ScalarKind::Enum(name) => {
                let allowed = self.schema.enum_values(name).unwrap_or(&[]);
                value
                    .as_str()
                    .filter(|s| allowed.iter().any(|a| a == s))
                    .map(|_| value.clone())
                    .ok_or_else(|| invalid(&format!("a value of enum {}", name)))
            }
            kind if kind.is_temporal() || kind.is_duration() => value
                .as_str()
                .filter(|s| is_valid_temporal_input(kind, s))
                .map(|_| value.clone())
                .ok_or_else(|| invalid(&format!("an ISO-8601 {}", kind))),
            ScalarKind::Point => point_value(value, "longitude", "latitude", "height")
                .ok_or_else(|| invalid("a point {longitude, latitude, height?}")),
            ScalarKind::CartesianPoint => point_value(value, "x", "y", "z")
                .ok_or_else(|| invalid("a point {x, y, z?}")),
            _ => Ok(value.clone()),
        }
    }
}

fn point_value(value: &Value, a: &str, b: &str, c: &str) -> Option<Value> {
    let object = value.as_object()?;
    let mut out = Map::new();
    for key in [a, b] {
        out.insert(key.to_string(), Value::from(object.get(key)?.as_f64()?));
    }
    if let Some(third) = object.get(c) {
        out.insert(c.to_string(), Value::from(third.as_f64()?));
    }
    if let Some(srid) = object.get("srid") {
        out.insert("srid".to_string(), Value::from(srid.as_u64()?));
    }
    Some(Value::Object(out))
}

fn expect_object<'v>(
    value: &'v Value,
    type_name: &str,
    field: &str,
) -> Result<&'v Map<String, Value>, SelectionError> {
    value
        .as_object()
        .ok_or_else(|| SelectionError::filter(type_name, field, "expected an object"))
}

fn expect_array<'v>(
    value: &'v Value,
    type_name: &str,
    field: &str,
) -> Result<&'v Vec<Value>, SelectionError> {
    value
        .as_array()
        .ok_or_else(|| SelectionError::filter(type_name, field, "expected a list"))
}

fn comparator_map<'v>(
    value: &'v Value,
    type_name: &str,
    field: &str,
) -> Result<Vec<(Comparator, &'v Value)>, SelectionError> {
    expect_object(value, type_name, field)?
        .iter()
        .map(|(k, v)| {
            Comparator::parse(k).map(|c| (c, v)).ok_or_else(|| {
                SelectionError::filter(type_name, field, format!("unknown comparator `{}`", k))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_model::test_fixtures::movies_schema;
    use serde_json::json;

    fn parse(schema: &SchemaModel, type_name: &str, value: Value) -> Result<FilterNode, SelectionError> {
        let target = schema.type_ref(type_name).unwrap();
        let scope = NodeScope::for_type(schema, &target).unwrap();
        FilterParser::new(schema).parse_node_filter(&value, &scope)
    }

    #[test]
    fn test_single_comparison() {
        let schema = movies_schema();
        let node = parse(&schema, "Movie", json!({"title": {"eq": "Heat"}})).unwrap();
        assert_eq!(
            node,
            FilterNode::Comparison(Comparison {
                field: "title".into(),
                operator: ComparisonOperator::Eq,
                value: json!("Heat"),
                custom: false,
            })
        );
    }

    #[test]
    fn test_equals_alias_and_null_equality() {
        let schema = movies_schema();
        let node = parse(&schema, "Movie", json!({"title": {"equals": null}})).unwrap();
        assert!(matches!(
            node,
            FilterNode::Comparison(Comparison { operator: ComparisonOperator::IsNull, .. })
        ));
    }

    #[test]
    fn test_multiple_keys_become_conjunction_in_order() {
        let schema = movies_schema();
        let node = parse(
            &schema,
            "Movie",
            json!({"title": {"startsWith": "The"}, "rating": {"gt": 7.5, "lte": 9}}),
        )
        .unwrap();
        match node {
            FilterNode::Logical { op: LogicalOp::And, children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(
                    &children[1],
                    FilterNode::Logical { op: LogicalOp::And, children } if children.len() == 2
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_filters_and_not() {
        let schema = movies_schema();
        assert_eq!(
            parse(&schema, "Movie", json!({})).unwrap(),
            FilterNode::Logical { op: LogicalOp::And, children: vec![] }
        );
        assert_eq!(
            parse(&schema, "Movie", json!({"NOT": {}})).unwrap(),
            FilterNode::not(FilterNode::Logical { op: LogicalOp::And, children: vec![] })
        );
        assert_eq!(
            parse(&schema, "Movie", json!({"OR": []})).unwrap(),
            FilterNode::Logical { op: LogicalOp::Or, children: vec![] }
        );
    }

    #[test]
    fn test_unsupported_operator_for_kind() {
        let schema = movies_schema();
        let err = parse(&schema, "Movie", json!({"rating": {"contains": "7"}})).unwrap_err();
        assert!(matches!(err, SelectionError::Filter { .. }));

        let err = parse(&schema, "Movie", json!({"tags": {"gt": "a"}})).unwrap_err();
        assert!(matches!(err, SelectionError::Filter { .. }));
    }

    #[test]
    fn test_unknown_field_is_schema_error() {
        let schema = movies_schema();
        let err = parse(&schema, "Movie", json!({"ratng": {"eq": 1}})).unwrap_err();
        assert!(matches!(err, SelectionError::Schema(SchemaError::UnknownField { .. })));
    }

    #[test]
    fn test_unknown_field_on_interface_is_polymorphic_branch_error() {
        let schema = movies_schema();
        let err = parse(&schema, "Production", json!({"nope": {"eq": 1}})).unwrap_err();
        assert!(matches!(err, SelectionError::PolymorphicBranch { .. }));
    }

    #[test]
    fn test_field_on_some_implementations_is_accepted() {
        let schema = movies_schema();
        assert!(parse(&schema, "Production", json!({"episodes": {"gt": 3}})).is_ok());
    }

    #[test]
    fn test_union_filters_must_be_keyed() {
        let schema = movies_schema();
        let err = parse(&schema, "Search", json!({"title": {"eq": "x"}})).unwrap_err();
        assert!(matches!(err, SelectionError::Filter { .. }));

        let node = parse(&schema, "Search", json!({"Movie": {"title": {"eq": "x"}}})).unwrap();
        assert!(matches!(node, FilterNode::Narrow { ref type_name, .. } if type_name == "Movie"));
    }

    #[test]
    fn test_quantifier_with_node_and_edge() {
        let schema = movies_schema();
        let node = parse(
            &schema,
            "Movie",
            json!({"actors": {"all": {"node": {"name": {"startsWith": "K"}}, "edge": {"screenTime": {"gt": 10}}}}}),
        )
        .unwrap();
        match node {
            FilterNode::RelationshipQuantifier(rel) => {
                assert_eq!(rel.quantifier, Quantifier::All);
                assert!(rel.node_filter.is_some());
                assert!(rel.edge_filter.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_polymorphic_edge_filter_keys() {
        let schema = movies_schema();
        // `episodeNr` exists only on StarredIn; accepted on the interface
        let ok = parse(
            &schema,
            "Production",
            json!({"actors": {"some": {"edge": {"episodeNr": {"eq": 1}}}}}),
        );
        assert!(ok.is_ok());

        let keyed = parse(
            &schema,
            "Production",
            json!({"actors": {"some": {"edge": {"ActedIn": {"screenTime": {"gt": 5}}}}}}),
        )
        .unwrap();
        match keyed {
            FilterNode::RelationshipQuantifier(rel) => assert!(matches!(
                rel.edge_filter,
                Some(FilterNode::Narrow { ref type_name, .. }) if type_name == "ActedIn"
            )),
            other => panic!("unexpected {:?}", other),
        }

        let err = parse(
            &schema,
            "Production",
            json!({"actors": {"some": {"edge": {"nope": {"eq": 1}}}}}),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::PolymorphicBranch { .. }));
    }

    #[test]
    fn test_connection_filter() {
        let schema = movies_schema();
        let movie = schema.entity("Movie").unwrap();
        let filter = FilterParser::new(&schema)
            .parse_connection_filter(
                "actors",
                &json!({"node": {"name": {"eq": "Keanu"}}, "NOT": {"edge": {"role": {"eq": "Neo"}}}}),
                &NodeScope::entity(movie),
            )
            .unwrap();
        match filter {
            ConnectionFilter::Logical { op, children } => {
                assert_eq!(op, LogicalOp::And);
                assert!(matches!(children[0], ConnectionFilter::Node(_)));
                assert!(matches!(
                    children[1],
                    ConnectionFilter::Logical { op: LogicalOp::Not, .. }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = FilterParser::new(&schema).parse_connection_filter(
            "actors",
            &json!({"name": {"eq": "Keanu"}}),
            &NodeScope::entity(movie),
        );
        assert!(matches!(err, Err(SelectionError::Filter { .. })));
    }

    #[test]
    fn test_aggregate_filter() {
        let schema = movies_schema();
        let node = parse(
            &schema,
            "Movie",
            json!({"actorsAggregate": {"count": {"gt": 2}, "edge": {"role": {"shortestLength": {"eq": 4}}}}}),
        )
        .unwrap();
        match node {
            FilterNode::Logical { op: LogicalOp::And, children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(
                    &children[1],
                    FilterNode::AggregateComparison(AggregateComparison {
                        function: AggregateFunction::ShortestLength,
                        target: AggregateTarget::Edge(f),
                        ..
                    }) if f == "role"
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_length_aggregate_rejected_for_numbers() {
        let schema = movies_schema();
        let err = parse(
            &schema,
            "Movie",
            json!({"actorsAggregate": {"edge": {"screenTime": {"shortestLength": {"eq": 4}}}}}),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::Filter { .. }));
    }

    #[test]
    fn test_temporal_and_enum_values_are_validated() {
        let schema = movies_schema();
        assert!(parse(&schema, "Movie", json!({"released": {"gt": "2020-01-01T00:00:00Z"}})).is_ok());
        assert!(parse(&schema, "Movie", json!({"released": {"gt": "yesterday"}})).is_err());
        assert!(parse(&schema, "Movie", json!({"runtime": {"lt": "PT2H"}})).is_ok());
        assert!(parse(&schema, "Movie", json!({"genre": {"eq": "ACTION"}})).is_ok());
        assert!(parse(&schema, "Movie", json!({"genre": {"eq": "OPERA"}})).is_err());
    }

    #[test]
    fn test_bigint_strings_are_normalised() {
        let schema = movies_schema();
        let node = parse(&schema, "Movie", json!({"views": {"gt": "9007199254740993"}})).unwrap();
        match node {
            FilterNode::Comparison(c) => assert_eq!(c.value, json!(9007199254740993_i64)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_distance_filter() {
        let schema = movies_schema();
        let node = parse(
            &schema,
            "Movie",
            json!({"location": {"distance": {"point": {"longitude": 1.0, "latitude": 2.0}, "lt": 1000}}}),
        )
        .unwrap();
        match node {
            FilterNode::Comparison(c) => {
                assert_eq!(c.operator, ComparisonOperator::Distance(Comparator::Lt));
                assert_eq!(c.value["distance"], json!(1000));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_custom_scalar_field_filter() {
        let schema = movies_schema();
        let node = parse(&schema, "Movie", json!({"score": {"gte": 0.5}})).unwrap();
        assert!(matches!(node, FilterNode::Comparison(Comparison { custom: true, .. })));
    }

    #[test]
    fn test_typename_filter() {
        let schema = movies_schema();
        let node = parse(&schema, "Production", json!({"typename": ["Series"]})).unwrap();
        assert_eq!(node, FilterNode::Typename(vec!["Series".into()]));
        assert!(parse(&schema, "Production", json!({"typename": ["Actor"]})).is_err());
    }
}
