//! Parameter collection for a single compiled statement.
//!
//! Every literal a request supplies is bound as a `$name` parameter; nothing
//! user-provided is ever spliced into the statement text. Names are built
//! from the scope variable and a descriptive stem (`this1_title_eq`) and get
//! a numeric suffix when a name is already taken, so nested scopes never
//! collide.

use serde_json::{Map, Value};

pub type ParamMap = Map<String, Value>;

/// Whether `name` is usable verbatim as a Cypher parameter name.
pub fn is_valid_parameter_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// Replace anything that cannot appear in a parameter name with `_`.
fn sanitize(stem: &str) -> String {
    let mut out: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'p');
    }
    out
}

#[derive(Debug, Default, Clone)]
pub struct ParamCollector {
    params: ParamMap,
}

impl ParamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under a name derived from `scope` and `stem` and return
    /// the name actually used.
    pub fn bind(&mut self, scope: &str, stem: &str, value: Value) -> String {
        let base = if stem.is_empty() {
            sanitize(scope)
        } else {
            sanitize(&format!("{}_{}", scope, stem))
        };
        let mut name = base.clone();
        let mut n = 1;
        while self.params.contains_key(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        log::trace!("bound parameter ${}", name);
        self.params.insert(name.clone(), value);
        name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_map(self) -> ParamMap {
        self.params
    }
}
