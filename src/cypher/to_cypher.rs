use super::ast::{
    CallClause, CaseExpr, Clause, Expr, FunctionCall, Literal, MapProjection, MapProjectionItem,
    MatchClause, NodePattern, Operator, OperatorApplication, OrderItem, Pattern,
    PatternDirection, Projection, ProjectionItem, ReduceExpr, RelationshipPattern, ReturnClause,
    SortDirection, Subquery, WithClause,
};

const INDENT: &str = "    ";

/// Render a tree node as Cypher text.
pub trait ToCypher {
    fn to_cypher(&self) -> String;
}

/// Quote an identifier with backticks unless it is a plain name.
///
/// # Examples
/// ```
/// use cypherql::cypher::to_cypher::escape_identifier;
///
/// assert_eq!(escape_identifier("this0"), "this0");
/// assert_eq!(escape_identifier("first name"), "`first name`");
/// assert_eq!(escape_identifier("a`b"), "`a``b`");
/// ```
pub fn escape_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn indent_block(text: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", INDENT, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a clause sequence, one clause per line.
pub fn render_clauses(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(|c| c.to_cypher())
        .collect::<Vec<_>>()
        .join("\n")
}

impl ToCypher for Literal {
    fn to_cypher(&self) -> String {
        match self {
            Literal::Null => "null".to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => format!("{:?}", f),
            Literal::String(s) => quote_string(s),
        }
    }
}

impl Operator {
    fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::In => "IN",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS WITH",
            Operator::EndsWith => "ENDS WITH",
            Operator::RegexMatch => "=~",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Addition => "+",
            Operator::Multiplication => "*",
        }
    }
}

/// Wrap compound boolean operands so operator precedence never matters.
fn operand(expr: &Expr) -> String {
    match expr {
        Expr::Operator(OperatorApplication { operator, operands })
            if matches!(operator, Operator::And | Operator::Or) && operands.len() > 1 =>
        {
            format!("({})", expr.to_cypher())
        }
        Expr::Operator(OperatorApplication {
            operator: Operator::Addition | Operator::Multiplication,
            ..
        }) => format!("({})", expr.to_cypher()),
        _ => expr.to_cypher(),
    }
}

impl ToCypher for OperatorApplication {
    fn to_cypher(&self) -> String {
        match self.operator {
            Operator::And | Operator::Or => {
                if self.operands.is_empty() {
                    // vacuous conjunction holds, vacuous disjunction does not
                    return (self.operator == Operator::And).to_string();
                }
                self.operands
                    .iter()
                    .map(operand)
                    .collect::<Vec<_>>()
                    .join(&format!(" {} ", self.operator.symbol()))
            }
            Operator::Not => {
                let inner = self
                    .operands
                    .first()
                    .map(|e| e.to_cypher())
                    .unwrap_or_else(|| "true".to_string());
                format!("NOT ({})", inner)
            }
            Operator::IsNull | Operator::IsNotNull => {
                let inner = self.operands.first().map(operand).unwrap_or_default();
                format!("{} {}", inner, self.operator.symbol())
            }
            _ => self
                .operands
                .iter()
                .map(operand)
                .collect::<Vec<_>>()
                .join(&format!(" {} ", self.operator.symbol())),
        }
    }
}

impl ToCypher for FunctionCall {
    fn to_cypher(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|a| a.to_cypher())
            .collect::<Vec<_>>()
            .join(", ");
        if self.distinct {
            format!("{}(DISTINCT {})", self.name, args)
        } else {
            format!("{}({})", self.name, args)
        }
    }
}

impl ToCypher for MapProjection {
    fn to_cypher(&self) -> String {
        let items = self
            .items
            .iter()
            .map(|item| match item {
                MapProjectionItem::Property(p) => format!(".{}", escape_identifier(p)),
                MapProjectionItem::Entry(k, v) => {
                    format!("{}: {}", escape_identifier(k), v.to_cypher())
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {{ {} }}", escape_identifier(&self.variable), items)
    }
}

impl ToCypher for ReduceExpr {
    fn to_cypher(&self) -> String {
        format!(
            "reduce({} = {}, {} IN {} | {})",
            escape_identifier(&self.accumulator),
            self.initial_value.to_cypher(),
            escape_identifier(&self.variable),
            self.list.to_cypher(),
            self.expression.to_cypher()
        )
    }
}

impl ToCypher for CaseExpr {
    fn to_cypher(&self) -> String {
        let mut out = String::from("CASE");
        for (when, then) in &self.when_then {
            out.push_str(&format!(" WHEN {} THEN {}", when.to_cypher(), then.to_cypher()));
        }
        if let Some(e) = &self.else_expr {
            out.push_str(&format!(" ELSE {}", e.to_cypher()));
        }
        out.push_str(" END");
        out
    }
}

impl ToCypher for Subquery {
    fn to_cypher(&self) -> String {
        let body = self
            .clauses
            .iter()
            .map(|c| c.to_cypher())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{{ {} }}", body)
    }
}

impl ToCypher for Expr {
    fn to_cypher(&self) -> String {
        match self {
            Expr::Variable(v) => escape_identifier(v),
            Expr::Parameter(p) => format!("${}", p),
            Expr::Literal(l) => l.to_cypher(),
            Expr::Property(base, key) => {
                format!("{}.{}", operand(base), escape_identifier(key))
            }
            Expr::Operator(op) => op.to_cypher(),
            Expr::Function(f) => f.to_cypher(),
            Expr::Map(entries) => {
                let items = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", escape_identifier(k), v.to_cypher()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {} }}", items)
            }
            Expr::MapProjection(m) => m.to_cypher(),
            Expr::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(|i| i.to_cypher())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Expr::HasLabels(var, labels) => format!(
                "{}{}",
                escape_identifier(var),
                labels
                    .iter()
                    .map(|l| format!(":{}", escape_identifier(l)))
                    .collect::<String>()
            ),
            Expr::Exists(sub) => format!("EXISTS {}", sub.to_cypher()),
            Expr::Count(sub) => format!("COUNT {}", sub.to_cypher()),
            Expr::Reduce(r) => r.to_cypher(),
            Expr::Case(c) => c.to_cypher(),
            Expr::Raw(s) => s.clone(),
        }
    }
}

impl ToCypher for NodePattern {
    fn to_cypher(&self) -> String {
        let var = self
            .variable
            .as_deref()
            .map(escape_identifier)
            .unwrap_or_default();
        let labels: String = self
            .labels
            .iter()
            .map(|l| format!(":{}", escape_identifier(l)))
            .collect();
        format!("({}{})", var, labels)
    }
}

impl ToCypher for RelationshipPattern {
    fn to_cypher(&self) -> String {
        let var = self
            .variable
            .as_deref()
            .map(escape_identifier)
            .unwrap_or_default();
        let types = if self.types.is_empty() {
            String::new()
        } else {
            format!(
                ":{}",
                self.types
                    .iter()
                    .map(|t| escape_identifier(t))
                    .collect::<Vec<_>>()
                    .join("|")
            )
        };
        let body = format!("[{}{}]", var, types);
        match self.direction {
            PatternDirection::Outgoing => format!("-{}->", body),
            PatternDirection::Incoming => format!("<-{}-", body),
            PatternDirection::Either => format!("-{}-", body),
        }
    }
}

impl ToCypher for Pattern {
    fn to_cypher(&self) -> String {
        let mut out = self.start.to_cypher();
        for (rel, node) in &self.segments {
            out.push_str(&rel.to_cypher());
            out.push_str(&node.to_cypher());
        }
        out
    }
}

impl ToCypher for OrderItem {
    fn to_cypher(&self) -> String {
        let dir = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        format!("{} {}", self.expr.to_cypher(), dir)
    }
}

impl ToCypher for ProjectionItem {
    fn to_cypher(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.expr.to_cypher(), escape_identifier(alias)),
            None => self.expr.to_cypher(),
        }
    }
}

impl ToCypher for Projection {
    fn to_cypher(&self) -> String {
        match self {
            Projection::All => "*".to_string(),
            Projection::Items(items) => items
                .iter()
                .map(|i| i.to_cypher())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl ToCypher for MatchClause {
    fn to_cypher(&self) -> String {
        let keyword = if self.optional { "OPTIONAL MATCH" } else { "MATCH" };
        match &self.where_clause {
            Some(w) => format!("{} {} WHERE {}", keyword, self.pattern.to_cypher(), w.to_cypher()),
            None => format!("{} {}", keyword, self.pattern.to_cypher()),
        }
    }
}

impl ToCypher for WithClause {
    fn to_cypher(&self) -> String {
        let mut out = String::from("WITH ");
        if self.distinct {
            out.push_str("DISTINCT ");
        }
        out.push_str(&self.projection.to_cypher());
        if !self.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_str(
                &self
                    .order_by
                    .iter()
                    .map(|o| o.to_cypher())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        if let Some(skip) = &self.skip {
            out.push_str(&format!(" SKIP {}", skip.to_cypher()));
        }
        if let Some(limit) = &self.limit {
            out.push_str(&format!(" LIMIT {}", limit.to_cypher()));
        }
        if let Some(w) = &self.where_clause {
            out.push_str(&format!(" WHERE {}", w.to_cypher()));
        }
        out
    }
}

impl ToCypher for CallClause {
    fn to_cypher(&self) -> String {
        let mut body = Vec::new();
        if !self.imports.is_empty() {
            body.push(format!(
                "WITH {}",
                self.imports
                    .iter()
                    .map(|i| escape_identifier(i))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        body.push(render_clauses(&self.body));
        format!("CALL {{\n{}\n}}", indent_block(&body.join("\n")))
    }
}

impl ToCypher for ReturnClause {
    fn to_cypher(&self) -> String {
        let items = self
            .items
            .iter()
            .map(|i| i.to_cypher())
            .collect::<Vec<_>>()
            .join(", ");
        if self.distinct {
            format!("RETURN DISTINCT {}", items)
        } else {
            format!("RETURN {}", items)
        }
    }
}

impl ToCypher for Clause {
    fn to_cypher(&self) -> String {
        match self {
            Clause::Match(m) => m.to_cypher(),
            Clause::With(w) => w.to_cypher(),
            Clause::Call(c) => c.to_cypher(),
            Clause::Union(branches) => branches
                .iter()
                .map(|b| render_clauses(b))
                .collect::<Vec<_>>()
                .join("\nUNION\n"),
            Clause::Unwind { expr, alias } => {
                format!("UNWIND {} AS {}", expr.to_cypher(), escape_identifier(alias))
            }
            Clause::Return(r) => r.to_cypher(),
            Clause::Raw(s) => s.clone(),
        }
    }
}
