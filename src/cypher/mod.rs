//! Cypher output: statement tree, text rendering, parameter and variable
//! naming.

pub mod ast;
pub mod naming;
pub mod params;
pub mod to_cypher;

pub use ast::{Clause, Expr};
pub use naming::VariableNamer;
pub use params::{ParamCollector, ParamMap};
pub use to_cypher::{render_clauses, ToCypher};
