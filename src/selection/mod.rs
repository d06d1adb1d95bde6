//! Request input model: the selection tree and its typed arguments.
//!
//! A request arrives as JSON shaped like the requested response:
//!
//! ```json
//! {
//!   "field": "movies",
//!   "arguments": { "where": { "title": { "eq": "Heat" } }, "sort": [{ "title": "ASC" }] },
//!   "selections": [
//!     { "field": "title" },
//!     { "field": "actors", "arguments": { "first": 2 }, "selections": [{ "field": "name" }] }
//!   ]
//! }
//! ```
//!
//! `where` and `sort` stay raw JSON here and are read against the schema by
//! [`filter::FilterParser`] and [`sort::parse_sort`] when the translator
//! reaches the field.

pub mod errors;
pub mod filter;
pub mod sort;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use errors::SelectionError;
pub use filter::{
    AggregateFunction, AggregateTarget, ComparisonOperator, Comparator, ConnectionFilter, FilterNode,
    FilterParser, LogicalOp, NodeScope, Quantifier,
};
pub use sort::{parse_sort, SortKey, SortTarget};

pub const TYPENAME_FIELD: &str = "__typename";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionTree {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Type condition for selections under a polymorphic field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub arguments: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<SelectionTree>,
}

impl SelectionTree {
    pub fn new(field: impl Into<String>) -> Self {
        SelectionTree {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn with_selections(mut self, selections: Vec<SelectionTree>) -> Self {
        self.selections = selections;
        self
    }

    pub fn on_type(mut self, type_name: impl Into<String>) -> Self {
        self.on = Some(type_name.into());
        self
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Key the field's value is returned under.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }

    pub fn is_typename(&self) -> bool {
        self.field == TYPENAME_FIELD
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    pub fn where_arg(&self) -> Option<&Value> {
        self.argument("where")
    }

    pub fn sort_arg(&self) -> Option<&Value> {
        self.argument("sort")
    }

    /// Non-negative integer argument (`first`, `limit`, `offset`).
    pub fn u64_argument(&self, name: &str) -> Result<Option<u64>, SelectionError> {
        match self.argument(name) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                SelectionError::invalid_argument(name, "expected a non-negative integer")
            }),
        }
    }

    /// Raw `after` cursor; it is decoded (and possibly rejected) later.
    pub fn after(&self) -> Result<Option<&str>, SelectionError> {
        match self.argument("after") {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(SelectionError::invalid_argument(
                "after",
                "expected a cursor string",
            )),
        }
    }

    pub fn directed(&self) -> Result<Option<bool>, SelectionError> {
        match self.argument("directed") {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| SelectionError::invalid_argument("directed", "expected a boolean")),
        }
    }

    /// First direct child selecting `field`.
    pub fn child(&self, field: &str) -> Option<&SelectionTree> {
        self.selections.iter().find(|s| s.field == field)
    }

    /// Children that apply to a concrete type: unconditioned selections plus
    /// those whose type condition names the type or one of its interfaces.
    pub fn selections_for<'a>(
        &'a self,
        type_name: &'a str,
        interfaces: &'a [String],
    ) -> impl Iterator<Item = &'a SelectionTree> + 'a {
        self.selections.iter().filter(move |s| match &s.on {
            None => true,
            Some(on) => on == type_name || interfaces.iter().any(|i| i == on),
        })
    }
}
