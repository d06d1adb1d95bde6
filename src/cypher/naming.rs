//! Statement variable naming.
//!
//! All generated variables come from one counter per compilation so a
//! statement never reuses a name across nested scopes, and compiling the
//! same request twice yields the same names.
//!
//! Naming convention:
//! - `this` for the root node
//! - `this{n}` for nodes and relationships bound in nested scopes
//! - `var{n}` for values returned from subqueries

pub const ROOT_VARIABLE: &str = "this";

#[derive(Debug, Default, Clone)]
pub struct VariableNamer {
    counter: usize,
}

impl VariableNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next pattern variable, e.g. `this3`.
    ///
    /// # Examples
    /// ```
    /// use cypherql::cypher::naming::VariableNamer;
    ///
    /// let mut names = VariableNamer::new();
    /// assert_eq!(names.node(), "this0");
    /// assert_eq!(names.value(), "var1");
    /// assert_eq!(names.node(), "this2");
    /// ```
    pub fn node(&mut self) -> String {
        format!("{}{}", ROOT_VARIABLE, self.next())
    }

    /// Next subquery value variable, e.g. `var4`.
    pub fn value(&mut self) -> String {
        format!("var{}", self.next())
    }

    fn next(&mut self) -> usize {
        let n = self.counter;
        self.counter += 1;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_shared_between_kinds() {
        let mut names = VariableNamer::new();
        let produced = vec![names.node(), names.node(), names.value(), names.node()];
        assert_eq!(produced, vec!["this0", "this1", "var2", "this3"]);
    }

    #[test]
    fn test_fresh_namers_are_deterministic() {
        let run = || {
            let mut names = VariableNamer::new();
            (0..4).map(|_| names.node()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
