//! Merging of pre-evaluated authorization predicates.
//!
//! Token verification happens upstream; by the time a request reaches the
//! translator every rule is a plain filter over one entity (or interface).
//! `filter` rules restrict rows silently. `validate` rules abort the
//! statement with the forbidden marker when a matched node fails them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::TranslatorError;
use super::predicate::{compile_node_filter, Condition};
use super::CompileContext;
use crate::cypher::ast::{Clause, Expr, Literal};
use crate::schema_model::{Entity, SchemaError, SchemaModel};
use crate::selection::{FilterParser, NodeScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Filter,
    Validate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRule {
    /// Entity or interface the rule applies to
    pub entity: String,
    pub mode: AuthMode,
    #[serde(rename = "where")]
    pub predicate: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthPredicates {
    #[serde(default)]
    pub rules: Vec<AuthRule>,
}

impl AuthPredicates {
    pub fn new(rules: Vec<AuthRule>) -> Self {
        AuthPredicates { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule must name a known entity or interface.
    pub fn validate(&self, schema: &SchemaModel) -> Result<(), TranslatorError> {
        for rule in &self.rules {
            if schema.entity_opt(&rule.entity).is_none()
                && schema.interface_opt(&rule.entity).is_none()
            {
                return Err(SchemaError::UnknownType {
                    type_name: rule.entity.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn rules_for<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a AuthRule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.entity == entity.name || entity.implements.contains(&r.entity))
    }
}

/// Compile every rule that applies to `entity` bound as `var`.
///
/// The result is meant to be ANDed into the `WHERE` of the match that binds
/// `var`.
pub fn compile_auth<'s>(
    ctx: &mut CompileContext<'s>,
    entity: &'s Entity,
    var: &str,
    preludes: &mut Vec<Clause>,
) -> Result<Condition, TranslatorError> {
    let auth = ctx.auth;
    let schema = ctx.schema;
    let mut parts = Vec::new();

    for rule in auth.rules_for(entity) {
        let filter = FilterParser::new(schema)
            .parse_node_filter(&rule.predicate, &NodeScope::entity(entity))?;
        let condition = compile_node_filter(ctx, &filter, entity, var, preludes)?;
        match rule.mode {
            AuthMode::Filter => parts.push(condition),
            AuthMode::Validate => {
                if condition == Condition::Always {
                    continue;
                }
                log::debug!("validate rule on `{}` bound to `{}`", rule.entity, var);
                parts.push(Condition::Expr(Expr::call(
                    "apoc.util.validatePredicate",
                    vec![
                        condition.negate().into_expr(),
                        Expr::string(ctx.settings.forbidden_marker.clone()),
                        Expr::List(vec![Expr::Literal(Literal::Integer(0))]),
                    ],
                )));
            }
        }
    }
    Ok(Condition::and(parts))
}
