//! Cypher statement tree produced by the translator.
//!
//! Only the subset the translator emits is modelled. Anything the tree cannot
//! express (user supplied `@cypher` statements) travels as [`Clause::Raw`].

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    In,
    Contains,
    StartsWith,
    EndsWith,
    RegexMatch,
    And,
    Or,
    Not,
    IsNull,
    IsNotNull,
    Addition,
    Multiplication,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<Expr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
}

/// Entry of a map projection: `.prop` shorthand or `key: expr`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum MapProjectionItem {
    Property(String),
    Entry(String, Expr),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MapProjection {
    pub variable: String,
    pub items: Vec<MapProjectionItem>,
}

/// `reduce(acc = init, x IN list | expression)`
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReduceExpr {
    pub accumulator: String,
    pub initial_value: Box<Expr>,
    pub variable: String,
    pub list: Box<Expr>,
    pub expression: Box<Expr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CaseExpr {
    pub when_then: Vec<(Expr, Expr)>,
    pub else_expr: Option<Box<Expr>>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Expr {
    Variable(String),
    Parameter(String),
    Literal(Literal),
    /// `base.key`
    Property(Box<Expr>, String),
    Operator(OperatorApplication),
    Function(FunctionCall),
    Map(Vec<(String, Expr)>),
    MapProjection(MapProjection),
    List(Vec<Expr>),
    /// `variable:LabelA:LabelB`
    HasLabels(String, Vec<String>),
    /// `EXISTS { ... }`
    Exists(Box<Subquery>),
    /// `COUNT { ... }`
    Count(Box<Subquery>),
    Reduce(ReduceExpr),
    Case(CaseExpr),
    Raw(String),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Expr::Parameter(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }

    pub fn property(base: Expr, key: impl Into<String>) -> Self {
        Expr::Property(Box::new(base), key.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function(FunctionCall {
            name: name.into(),
            args,
            distinct: false,
        })
    }

    pub fn binary(operator: Operator, left: Expr, right: Expr) -> Self {
        Expr::Operator(OperatorApplication {
            operator,
            operands: vec![left, right],
        })
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Operator(OperatorApplication {
            operator: Operator::Not,
            operands: vec![inner],
        })
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::binary(Operator::Equal, left, right)
    }

    /// Conjunction of `exprs`; `None` when the list is empty.
    pub fn and_all(mut exprs: Vec<Expr>) -> Option<Expr> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::Operator(OperatorApplication {
                operator: Operator::And,
                operands: exprs,
            })),
        }
    }

    /// Disjunction of `exprs`; `None` when the list is empty.
    pub fn or_all(mut exprs: Vec<Expr>) -> Option<Expr> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::Operator(OperatorApplication {
                operator: Operator::Or,
                operands: exprs,
            })),
        }
    }
}

/// A braced sub-statement (`EXISTS { }`, `COUNT { }`).
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Subquery {
    pub clauses: Vec<Clause>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum PatternDirection {
    Outgoing,
    Incoming,
    Either,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
}

impl NodePattern {
    pub fn new(variable: impl Into<String>, labels: Vec<String>) -> Self {
        NodePattern {
            variable: Some(variable.into()),
            labels,
        }
    }

    /// Bare reference to an already bound variable.
    pub fn bound(variable: impl Into<String>) -> Self {
        NodePattern {
            variable: Some(variable.into()),
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub direction: PatternDirection,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub start: NodePattern,
    pub segments: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(node: NodePattern) -> Self {
        Pattern {
            start: node,
            segments: Vec::new(),
        }
    }

    pub fn hop(start: NodePattern, rel: RelationshipPattern, end: NodePattern) -> Self {
        Pattern {
            start,
            segments: vec![(rel, end)],
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl ProjectionItem {
    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        ProjectionItem {
            expr,
            alias: Some(alias.into()),
        }
    }

    pub fn plain(variable: impl Into<String>) -> Self {
        ProjectionItem {
            expr: Expr::Variable(variable.into()),
            alias: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Projection {
    /// `*`
    All,
    Items(Vec<ProjectionItem>),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MatchClause {
    pub optional: bool,
    pub pattern: Pattern,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WithClause {
    pub projection: Projection,
    pub distinct: bool,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
    pub where_clause: Option<Expr>,
}

impl WithClause {
    pub fn star() -> Self {
        WithClause {
            projection: Projection::All,
            distinct: false,
            order_by: Vec::new(),
            skip: None,
            limit: None,
            where_clause: None,
        }
    }

    pub fn items(items: Vec<ProjectionItem>) -> Self {
        WithClause {
            projection: Projection::Items(items),
            ..WithClause::star()
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CallClause {
    /// Variables imported with a leading `WITH`; empty for uncorrelated calls
    pub imports: Vec<String>,
    pub body: Vec<Clause>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReturnClause {
    pub items: Vec<ProjectionItem>,
    pub distinct: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Clause {
    Match(MatchClause),
    With(WithClause),
    Call(CallClause),
    /// Branches joined by `UNION`; each branch imports its own variables
    Union(Vec<Vec<Clause>>),
    Unwind { expr: Expr, alias: String },
    Return(ReturnClause),
    Raw(String),
}

impl Clause {
    pub fn matching(pattern: Pattern, where_clause: Option<Expr>) -> Self {
        Clause::Match(MatchClause {
            optional: false,
            pattern,
            where_clause,
        })
    }

    pub fn call(imports: Vec<String>, body: Vec<Clause>) -> Self {
        Clause::Call(CallClause { imports, body })
    }

    pub fn returning(items: Vec<ProjectionItem>) -> Self {
        Clause::Return(ReturnClause {
            items,
            distinct: false,
        })
    }
}
