//! cypherql - typed graph selections compiled to Cypher
//!
//! This crate turns a selection request against a declared graph schema into
//! a single parameterized Cypher statement, and shapes the store's records
//! back into the requested response:
//! - Schema model loaded from YAML
//! - Filters, sorts, aggregates and relay-style connections
//! - Interface and union fields compiled as `UNION` branches
//! - Result shaping with temporal, spatial and duration normalisation

pub mod config;
pub mod cypher;
pub mod executor;
pub mod result_shaper;
pub mod schema_model;
pub mod selection;
pub mod translator;
pub mod utils;

pub use executor::{Executor, ExecutorError, GraphStore, StoreError};
pub use schema_model::SchemaModel;
pub use selection::SelectionTree;
pub use translator::{translate, AuthPredicates, CompiledQuery, TranslatorError, TranslatorSettings};
