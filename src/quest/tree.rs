//! Path-addressable configuration tree
//!
//! Wraps a parsed TOML document so values can be looked up with dotted paths
//! such as `options.cooldown.time`.

use toml::{Table, Value};

/// A parsed definition file
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    root: Table,
}

impl ConfigTree {
    /// Parse preprocessed text. Key order is preserved.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let root: Table = toml::from_str(text)?;
        Ok(Self { root })
    }

    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    /// True if the path names a table
    pub fn is_section(&self, path: &str) -> bool {
        self.section(path).is_some()
    }

    pub fn section(&self, path: &str) -> Option<&Table> {
        self.get(path)?.as_table()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_int(&self, path: &str, default: i64) -> i64 {
        self.get(path).and_then(Value::as_integer).unwrap_or(default)
    }

    /// Read a list of strings. A bare string counts as a one-element list and
    /// non-string entries are skipped.
    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            Some(value) => string_list(value),
            None => Vec::new(),
        }
    }
}

/// Lenient conversion of a value to a list of strings
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
rewards = ["give {player} diamond 1", 5]

[options]
repeatable = true
requires = "other"

[options.cooldown]
enabled = true
time = 30

[tasks.b]
type = "crafting"

[tasks.a]
type = "brewing"
"#;

    #[test]
    fn test_dotted_lookup() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        assert!(tree.get_bool("options.repeatable", false));
        assert!(tree.get_bool("options.cooldown.enabled", false));
        assert_eq!(tree.get_int("options.cooldown.time", 10), 30);
        assert_eq!(tree.get_int("options.sort-order", 1), 1);
        assert_eq!(tree.get_str("tasks.b.type"), Some("crafting"));
        assert!(tree.get("options.repeatable.deeper").is_none());
    }

    #[test]
    fn test_sections() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        assert!(tree.is_section("tasks"));
        assert!(tree.is_section("tasks.a"));
        assert!(!tree.is_section("rewards"));
        assert!(!tree.is_section("missing"));
    }

    #[test]
    fn test_string_lists_are_lenient() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        assert_eq!(tree.get_string_list("rewards"), vec!["give {player} diamond 1"]);
        assert_eq!(tree.get_string_list("options.requires"), vec!["other"]);
        assert!(tree.get_string_list("startstring").is_empty());
    }

    #[test]
    fn test_task_order_is_preserved() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        let ids: Vec<&str> = tree.section("tasks").unwrap().keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_malformed_input() {
        assert!(ConfigTree::parse("[tasks\nfoo = ").is_err());
    }
}
