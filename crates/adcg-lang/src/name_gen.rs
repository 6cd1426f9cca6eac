//! Naming policies for generated variables.
//!
//! A policy maps independent indices, dependent positions, temporary slots
//! and temporary-array offsets to the names a backend writes. Names must be
//! deterministic and distinct for distinct live bindings within one
//! emission pass.

/// Naming rules consumed by the language backends.
///
/// Only the four base names are required; the indexed forms default to
/// array subscripts on those bases.
pub trait VariableNameGenerator {
    fn independent_base(&self) -> &str;
    fn dependent_base(&self) -> &str;
    fn temporary_base(&self) -> &str;
    fn temporary_array_base(&self) -> &str;

    fn independent(&self, index: usize) -> String {
        format!("{}[{}]", self.independent_base(), index)
    }

    fn dependent(&self, position: usize) -> String {
        format!("{}[{}]", self.dependent_base(), position)
    }

    fn temporary(&self, index: usize) -> String {
        format!("{}[{}]", self.temporary_base(), index)
    }

    fn temporary_array_element(&self, offset: usize) -> String {
        format!("{}[{}]", self.temporary_array_base(), offset)
    }

    /// Independent element at a runtime index expression.
    fn independent_at(&self, index: &str) -> String {
        format!("{}[{}]", self.independent_base(), index)
    }

    /// Dependent element at a runtime index expression.
    fn dependent_at(&self, index: &str) -> String {
        format!("{}[{}]", self.dependent_base(), index)
    }

    fn loop_index(&self, depth: usize) -> String {
        const INDICES: [&str; 4] = ["j", "k", "m", "n"];
        INDICES
            .get(depth)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("j{}", depth))
    }

    fn loop_local(&self, index: usize) -> String {
        format!("l{}", index)
    }

    /// `true` if `second` directly follows `first` in the same independent array.
    fn is_consecutive_in_independent_array(&self, first: usize, second: usize) -> bool {
        first + 1 == second
    }

    fn is_in_same_independent_array(&self, _first: usize, _second: usize) -> bool {
        true
    }

    fn is_in_dependent_array(&self, _position: usize) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultNameGenerator {
    independent: String,
    dependent: String,
    temporary: String,
    temporary_array: String,
}

impl DefaultNameGenerator {
    pub fn new(
        independent: impl Into<String>,
        dependent: impl Into<String>,
        temporary: impl Into<String>,
        temporary_array: impl Into<String>,
    ) -> Self {
        Self {
            independent: independent.into(),
            dependent: dependent.into(),
            temporary: temporary.into(),
            temporary_array: temporary_array.into(),
        }
    }
}

impl Default for DefaultNameGenerator {
    fn default() -> Self {
        Self::new("x", "y", "v", "array")
    }
}

impl VariableNameGenerator for DefaultNameGenerator {
    fn independent_base(&self) -> &str {
        &self.independent
    }

    fn dependent_base(&self) -> &str {
        &self.dependent
    }

    fn temporary_base(&self) -> &str {
        &self.temporary
    }

    fn temporary_array_base(&self) -> &str {
        &self.temporary_array
    }
}

/// Explicit names for some independents and dependents; every other index
/// falls back to the array scheme of the wrapped default generator.
///
/// A custom-named variable is a standalone scalar, so it is never part of
/// an array for the adjacency and membership queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomNameGenerator {
    independent_names: Vec<String>,
    dependent_names: Vec<String>,
    base: DefaultNameGenerator,
}

impl CustomNameGenerator {
    pub fn new(independent_names: Vec<String>, dependent_names: Vec<String>) -> Self {
        Self::with_base(independent_names, dependent_names, DefaultNameGenerator::default())
    }

    pub fn with_base(
        independent_names: Vec<String>,
        dependent_names: Vec<String>,
        base: DefaultNameGenerator,
    ) -> Self {
        Self {
            independent_names,
            dependent_names,
            base,
        }
    }

    fn custom_independent(&self, index: usize) -> Option<&str> {
        custom(&self.independent_names, index)
    }

    fn custom_dependent(&self, position: usize) -> Option<&str> {
        custom(&self.dependent_names, position)
    }
}

fn custom(names: &[String], index: usize) -> Option<&str> {
    names
        .get(index)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

impl VariableNameGenerator for CustomNameGenerator {
    fn independent_base(&self) -> &str {
        self.base.independent_base()
    }

    fn dependent_base(&self) -> &str {
        self.base.dependent_base()
    }

    fn temporary_base(&self) -> &str {
        self.base.temporary_base()
    }

    fn temporary_array_base(&self) -> &str {
        self.base.temporary_array_base()
    }

    fn independent(&self, index: usize) -> String {
        match self.custom_independent(index) {
            Some(name) => name.to_string(),
            None => self.base.independent(index),
        }
    }

    fn dependent(&self, position: usize) -> String {
        match self.custom_dependent(position) {
            Some(name) => name.to_string(),
            None => self.base.dependent(position),
        }
    }

    fn is_consecutive_in_independent_array(&self, first: usize, second: usize) -> bool {
        self.is_in_same_independent_array(first, second) && first + 1 == second
    }

    fn is_in_same_independent_array(&self, first: usize, second: usize) -> bool {
        self.custom_independent(first).is_none() && self.custom_independent(second).is_none()
    }

    fn is_in_dependent_array(&self, position: usize) -> bool {
        self.custom_dependent(position).is_none()
    }
}

/// Subscripted names for LaTeX output, `x_{0}`, `y_{1}`, `v_{2}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatexNameGenerator;

impl VariableNameGenerator for LatexNameGenerator {
    fn independent_base(&self) -> &str {
        "x"
    }

    fn dependent_base(&self) -> &str {
        "y"
    }

    fn temporary_base(&self) -> &str {
        "v"
    }

    fn temporary_array_base(&self) -> &str {
        "a"
    }

    fn independent(&self, index: usize) -> String {
        self.independent_at(&index.to_string())
    }

    fn dependent(&self, position: usize) -> String {
        self.dependent_at(&position.to_string())
    }

    fn temporary(&self, index: usize) -> String {
        format!("v_{{{}}}", index)
    }

    fn temporary_array_element(&self, offset: usize) -> String {
        format!("a_{{{}}}", offset)
    }

    fn independent_at(&self, index: &str) -> String {
        format!("x_{{{}}}", index)
    }

    fn dependent_at(&self, index: &str) -> String {
        format!("y_{{{}}}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_names() {
        let names = DefaultNameGenerator::default();

        assert_eq!(names.independent(2), "x[2]");
        assert_eq!(names.dependent(0), "y[0]");
        assert_eq!(names.temporary(5), "v[5]");
        assert_eq!(names.temporary_array_element(3), "array[3]");
        assert_eq!(names.independent_at("2 * j + 1"), "x[2 * j + 1]");
        assert_eq!(names.loop_index(1), "k");
        assert_eq!(names.loop_index(6), "j6");
        assert_eq!(names.loop_local(0), "l0");
    }

    #[rstest]
    #[case(0, "alpha")]
    #[case(1, "x[1]")]
    #[case(2, "gamma")]
    #[case(9, "x[9]")]
    fn test_custom_independent(#[case] index: usize, #[case] expected: &str) {
        let names = CustomNameGenerator::new(
            vec!["alpha".to_string(), String::new(), "gamma".to_string()],
            vec![],
        );
        assert_eq!(names.independent(index), expected);
    }

    #[rstest]
    #[case(0, 1, false)]
    #[case(3, 4, true)]
    #[case(1, 2, false)]
    #[case(1, 3, false)]
    #[case(5, 6, true)]
    fn test_custom_consecutive(#[case] first: usize, #[case] second: usize, #[case] expected: bool) {
        let names = CustomNameGenerator::new(vec!["alpha".to_string(), String::new(), "gamma".to_string()], vec![]);
        assert_eq!(names.is_consecutive_in_independent_array(first, second), expected);
    }

    #[test]
    fn test_custom_dependent_membership() {
        let names = CustomNameGenerator::new(vec![], vec!["f".to_string()]);

        assert_eq!(names.dependent(0), "f");
        assert_eq!(names.dependent(1), "y[1]");
        assert!(!names.is_in_dependent_array(0));
        assert!(names.is_in_dependent_array(1));
    }

    #[test]
    fn test_latex_names() {
        let names = LatexNameGenerator;

        assert_eq!(names.independent(1), "x_{1}");
        assert_eq!(names.dependent(0), "y_{0}");
        assert_eq!(names.temporary(2), "v_{2}");
        assert_eq!(names.temporary_array_element(4), "a_{4}");
    }
}
