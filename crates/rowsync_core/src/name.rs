//! Table identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a table: a name plus an optional schema.
///
/// Two names are equal when both the table name and the schema name match
/// case-insensitively. A missing schema and an empty schema are the same.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableName {
    /// Table name.
    pub name: String,
    /// Schema name, if the engine supports schemas.
    pub schema: Option<String>,
}

impl TableName {
    /// Creates a table name without a schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    /// Creates a table name qualified by a schema.
    pub fn with_schema(name: impl Into<String>, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        Self {
            name: name.into(),
            schema: if schema.is_empty() { None } else { Some(schema) },
        }
    }

    /// Returns the schema name, with an empty string for "no schema".
    pub fn schema_or_empty(&self) -> &str {
        self.schema.as_deref().unwrap_or("")
    }

    /// Returns true if this name identifies `name` in `schema`.
    pub fn matches(&self, name: &str, schema: Option<&str>) -> bool {
        eq_ignore_case(&self.name, name)
            && eq_ignore_case(self.schema_or_empty(), schema.unwrap_or(""))
    }
}

impl PartialEq for TableName {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.name, other.schema.as_deref())
    }
}

impl Eq for TableName {}

impl Hash for TableName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_lowercase().hash(state);
        self.schema_or_empty().to_lowercase().hash(state);
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.schema.as_deref() {
            Some(schema) if !schema.is_empty() => write!(f, "{}.{}", schema, self.name),
            _ => f.write_str(&self.name),
        }
    }
}

/// Case-insensitive comparison over the full Unicode range.
pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn case_insensitive_equality() {
        let a = TableName::with_schema("Customers", "dbo");
        let b = TableName::with_schema("CUSTOMERS", "DBO");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn empty_schema_equals_missing_schema() {
        assert_eq!(TableName::new("T1"), TableName::with_schema("t1", ""));
        assert!(TableName::new("T1").matches("t1", Some("")));
        assert!(TableName::new("T1").matches("t1", None));
        assert!(!TableName::new("T1").matches("t1", Some("sales")));
    }

    #[test]
    fn display_includes_schema() {
        assert_eq!(TableName::with_schema("Orders", "sales").to_string(), "sales.Orders");
        assert_eq!(TableName::new("Orders").to_string(), "Orders");
    }
}
