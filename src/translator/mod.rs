//! Selection-to-Cypher compiler.
//!
//! [`translate`] is the entry point: it resolves the root field against the
//! schema model and hands the tree to the assembler, which in turn calls the
//! predicate, sort, aggregation, pagination and polymorphism stages. One
//! request compiles to one [`CompiledQuery`]; no state survives between
//! requests apart from the read-only schema model.

pub mod aggregation;
pub mod assembler;
pub mod auth;
pub mod custom_cypher;
pub mod errors;
pub mod pagination;
pub mod polymorphism;
pub mod predicate;
pub mod sort;

use serde::Serialize;

use crate::cypher::ast::Clause;
use crate::cypher::{render_clauses, ParamCollector, ParamMap, VariableNamer};
use crate::result_shaper::RootPlan;
use crate::schema_model::SchemaModel;
use crate::selection::SelectionTree;

pub use auth::{AuthMode, AuthPredicates, AuthRule};
pub use errors::TranslatorError;

pub const DEFAULT_FORBIDDEN_MARKER: &str = "CYPHERQL_FORBIDDEN";

/// Compiler knobs taken from the runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorSettings {
    /// Page size for top-level lists of types that declare no default
    pub default_limit: Option<u64>,
    /// Ceiling for every requested page size
    pub max_limit: Option<u64>,
    /// Embed a filter/sort signature in cursors
    pub cursor_signing: bool,
    /// Message raised by failed validate-mode authorization rules
    pub forbidden_marker: String,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        TranslatorSettings {
            default_limit: None,
            max_limit: None,
            cursor_signing: true,
            forbidden_marker: DEFAULT_FORBIDDEN_MARKER.to_string(),
        }
    }
}

/// Per-request compilation state.
pub struct CompileContext<'s> {
    pub schema: &'s SchemaModel,
    pub auth: &'s AuthPredicates,
    pub settings: &'s TranslatorSettings,
    pub params: ParamCollector,
    pub names: VariableNamer,
}

impl<'s> CompileContext<'s> {
    pub fn new(
        schema: &'s SchemaModel,
        auth: &'s AuthPredicates,
        settings: &'s TranslatorSettings,
    ) -> Self {
        CompileContext {
            schema,
            auth,
            settings,
            params: ParamCollector::new(),
            names: VariableNamer::new(),
        }
    }
}

/// The terminal artifact of a compilation.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery {
    pub cypher: String,
    pub params: ParamMap,
    #[serde(skip)]
    pub clauses: Vec<Clause>,
    #[serde(skip)]
    pub plan: RootPlan,
}

/// Compile a root selection into one parameterized statement.
pub fn translate(
    schema: &SchemaModel,
    selection: &SelectionTree,
    auth: &AuthPredicates,
    settings: &TranslatorSettings,
) -> Result<CompiledQuery, TranslatorError> {
    auth.validate(schema)?;

    let mut ctx = CompileContext::new(schema, auth, settings);
    let (clauses, plan) = assembler::assemble(&mut ctx, selection)?;
    let cypher = render_clauses(&clauses);
    log::debug!("compiled `{}`:\n{}", selection.field, cypher);

    Ok(CompiledQuery {
        cypher,
        params: ctx.params.into_map(),
        clauses,
        plan,
    })
}
