//! Splicing of user supplied Cypher statements.
//!
//! A custom field's statement runs inside its own `CALL` block with the
//! owning node visible as `this`. Declared arguments referenced as `$name`
//! are rewritten to request-unique parameter names so two uses of the same
//! field never collide.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::errors::TranslatorError;
use super::CompileContext;
use crate::cypher::ast::{Clause, Expr, FunctionCall, ProjectionItem, WithClause};
use crate::cypher::naming::ROOT_VARIABLE;
use crate::cypher::to_cypher::escape_identifier;
use crate::schema_model::CustomField;

lazy_static! {
    static ref PARAMETER_REF: Regex =
        Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid parameter pattern");
    static ref RETURN_CLAUSE: Regex = Regex::new(r"(?i)\bRETURN\b").expect("valid return pattern");
}

/// Rewrite `$arg` references to the bound parameter names in `bindings`.
/// References to undeclared names are left untouched.
pub fn rewrite_parameters(statement: &str, bindings: &HashMap<String, String>) -> String {
    PARAMETER_REF
        .replace_all(statement, |caps: &Captures| match bindings.get(&caps[1]) {
            Some(bound) => format!("${}", bound),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn check_statement(custom: &CustomField) -> Result<(), TranslatorError> {
    if custom.statement.trim().is_empty() {
        return Err(TranslatorError::CustomStatement {
            field: custom.name.clone(),
            reason: "statement is empty".to_string(),
        });
    }
    if !RETURN_CLAUSE.is_match(&custom.statement) {
        return Err(TranslatorError::CustomStatement {
            field: custom.name.clone(),
            reason: format!("statement must RETURN `{}`", custom.column_name),
        });
    }
    Ok(())
}

/// Clauses that run the statement and bind its value column to `value_var`,
/// one row per returned value.
///
/// With `scope` the statement is correlated to that node; without it the
/// statement is a root query.
pub fn statement_clauses(
    ctx: &mut CompileContext<'_>,
    custom: &CustomField,
    scope: Option<&str>,
    arguments: &Map<String, Value>,
    value_var: &str,
) -> Result<Vec<Clause>, TranslatorError> {
    check_statement(custom)?;

    let param_scope = scope.unwrap_or(ROOT_VARIABLE);
    let mut bindings = HashMap::new();
    for name in &custom.arguments {
        let value = arguments.get(name).cloned().unwrap_or(Value::Null);
        let bound = ctx
            .params
            .bind(param_scope, &format!("{}_{}", custom.name, name), value);
        bindings.insert(name.clone(), bound);
    }
    for name in arguments.keys() {
        if !custom.arguments.contains(name) {
            log::warn!("ignoring undeclared argument `{}` on `{}`", name, custom.name);
        }
    }

    let statement = Clause::Raw(rewrite_parameters(&custom.statement, &bindings));
    let call = match scope {
        Some(var) => {
            let mut body = Vec::new();
            if var != ROOT_VARIABLE {
                body.push(Clause::With(WithClause::items(vec![ProjectionItem::aliased(
                    Expr::var(var),
                    ROOT_VARIABLE,
                )])));
            }
            body.push(statement);
            Clause::call(vec![var.to_string()], body)
        }
        None => Clause::call(Vec::new(), vec![statement]),
    };

    Ok(vec![
        call,
        Clause::With(WithClause::items(vec![ProjectionItem::aliased(
            Expr::Raw(escape_identifier(&custom.column_name)),
            value_var,
        )])),
    ])
}

/// `collect(x)` for list fields, `head(collect(x))` for single ones.
pub fn collect_values(expr: Expr, is_list: bool) -> Expr {
    let collected = Expr::Function(FunctionCall {
        name: "collect".to_string(),
        args: vec![expr],
        distinct: false,
    });
    if is_list {
        collected
    } else {
        Expr::call("head", vec![collected])
    }
}

/// A `CALL` computing a scalar custom field of the node bound to `var`.
///
/// Returns the clause and the variable holding the value afterwards.
pub fn scalar_value_call(
    ctx: &mut CompileContext<'_>,
    custom: &CustomField,
    var: &str,
) -> Result<(Clause, String), TranslatorError> {
    let row_var = ctx.names.node();
    let result_var = ctx.names.value();
    let mut body = statement_clauses(ctx, custom, Some(var), &Map::new(), &row_var)?;
    body.push(Clause::returning(vec![ProjectionItem::aliased(
        collect_values(Expr::var(&row_var), custom.cardinality.is_list()),
        &result_var,
    )]));
    Ok((Clause::call(vec![var.to_string()], body), result_var))
}
