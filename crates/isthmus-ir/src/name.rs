//! Qualified declaration names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A namespace path plus an identifier, e.g. `test.record.PrimitiveTypes`.
///
/// The dotted form is globally unique across the IR and is the join key for
/// every per-target view of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: Vec<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// A name in the root namespace.
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(Vec::new(), name)
    }

    /// Parse a dotted name; a leading `.` (absolute marker) is ignored.
    pub fn parse(dotted: &str) -> Self {
        let trimmed = dotted.strip_prefix('.').unwrap_or(dotted);
        let mut parts: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        let name = parts.pop().unwrap_or_default();
        Self {
            namespace: parts,
            name,
        }
    }

    /// The dotted registry key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{segment}.")?;
        }
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let name = QualifiedName::parse("test.record.primitive_types");
        assert_eq!(name.namespace, vec!["test", "record"]);
        assert_eq!(name.name, "primitive_types");
        assert_eq!(name.key(), "test.record.primitive_types");
    }

    #[test]
    fn absolute_marker_is_stripped() {
        assert_eq!(QualifiedName::parse(".a.b"), QualifiedName::new(vec!["a".into()], "b"));
    }

    #[test]
    fn root_name_has_no_dots() {
        assert_eq!(QualifiedName::root("calculator").to_string(), "calculator");
    }
}
