//! Validation helpers shared by task types

use std::sync::OnceLock;

use regex::Regex;
use toml::Value;

use crate::quest::definition::Task;
use crate::quest::items::QUEST_ITEM_KEY;
use crate::quest::problem::{ConfigProblem, ProblemKind};
use crate::quest::tree::string_list;

static MATERIAL_REGEX: OnceLock<Regex> = OnceLock::new();

fn material_regex() -> &'static Regex {
    MATERIAL_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_:]+$").expect("material pattern is valid"))
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Require a field. Returns true if it is present.
pub fn validate_exists(
    path: &str,
    value: Option<&Value>,
    problems: &mut Vec<ConfigProblem>,
    field: &str,
    type_tag: &str,
) -> bool {
    if value.is_some() {
        return true;
    }
    problems.push(
        ConfigProblem::error(
            ProblemKind::TaskMissingField,
            format!("Required field '{}' is missing for task type '{}'", field, type_tag),
        )
        .at(path),
    );
    false
}

/// Check an integer field. Returns true if the value is acceptable.
pub fn validate_int(
    path: &str,
    value: Option<&Value>,
    problems: &mut Vec<ConfigProblem>,
    allow_missing: bool,
    greater_than_zero: bool,
    field: &str,
) -> bool {
    let Some(value) = value else {
        return allow_missing;
    };

    match value.as_integer() {
        None => {
            problems.push(
                ConfigProblem::error(
                    ProblemKind::TaskMalformedField,
                    format!("Expected an integer for '{}', but got '{}' instead", field, describe(value)),
                )
                .at(path),
            );
            false
        }
        Some(n) if greater_than_zero && n <= 0 => {
            problems.push(
                ConfigProblem::error(
                    ProblemKind::TaskMalformedField,
                    format!("Value for field '{}' must be greater than 0", field),
                )
                .at(path),
            );
            false
        }
        Some(n) if n > i64::from(u32::MAX) => {
            problems.push(
                ConfigProblem::error(
                    ProblemKind::TaskMalformedField,
                    format!("Value for field '{}' is too large", field),
                )
                .at(path),
            );
            false
        }
        Some(_) => true,
    }
}

/// Check a string or list-of-strings field
pub fn validate_string_list(
    path: &str,
    value: Option<&Value>,
    problems: &mut Vec<ConfigProblem>,
    allow_missing: bool,
    field: &str,
) -> bool {
    let Some(value) = value else {
        return allow_missing;
    };

    let ok = match value {
        Value::String(_) => true,
        Value::Array(items) => items.iter().all(Value::is_str),
        _ => false,
    };
    if !ok {
        problems.push(
            ConfigProblem::error(
                ProblemKind::TaskMalformedField,
                format!("Expected a list of strings for '{}', but got '{}' instead", field, describe(value)),
            )
            .at(path),
        );
    }
    ok
}

/// Check an item field: a material id, a section with a `type` material and
/// optional `name`, `lore` and `data`, or a `quest-item` reference. Whether the
/// referenced quest item exists is checked by the loader.
pub fn validate_item(
    path: &str,
    value: Option<&Value>,
    problems: &mut Vec<ConfigProblem>,
    allow_missing: bool,
    field: &str,
) -> bool {
    let Some(value) = value else {
        return allow_missing;
    };

    match value {
        Value::String(material) => validate_material(path, material, problems),
        Value::Table(section) if section.contains_key(QUEST_ITEM_KEY) => match section.get(QUEST_ITEM_KEY) {
            Some(Value::String(_)) => true,
            other => {
                let got = other.map(describe).unwrap_or_default();
                problems.push(
                    ConfigProblem::error(
                        ProblemKind::TaskMalformedField,
                        format!("Expected a quest item id for '{}.{}', but got '{}' instead", field, QUEST_ITEM_KEY, got),
                    )
                    .at(format!("{}.{}", path, QUEST_ITEM_KEY)),
                );
                false
            }
        },
        Value::Table(section) => {
            let type_path = format!("{}.type", path);
            match section.get("type") {
                Some(Value::String(material)) => {
                    let mut ok = validate_material(&type_path, material, problems);
                    ok &= validate_int(&format!("{}.data", path), section.get("data"), problems, true, false, "data");
                    ok &= validate_string_list(&format!("{}.lore", path), section.get("lore"), problems, true, "lore");
                    ok
                }
                Some(other) => {
                    problems.push(
                        ConfigProblem::error(
                            ProblemKind::TaskMalformedField,
                            format!("Expected a material for '{}.type', but got '{}' instead", field, describe(other)),
                        )
                        .at(type_path),
                    );
                    false
                }
                None => {
                    problems.push(
                        ConfigProblem::error(
                            ProblemKind::TaskMissingField,
                            format!("Required field 'type' is missing for item '{}'", field),
                        )
                        .at(type_path),
                    );
                    false
                }
            }
        }
        other => {
            problems.push(
                ConfigProblem::error(
                    ProblemKind::TaskMalformedField,
                    format!("Expected an item for '{}', but got '{}' instead", field, describe(other)),
                )
                .at(path),
            );
            false
        }
    }
}

fn validate_material(path: &str, material: &str, problems: &mut Vec<ConfigProblem>) -> bool {
    if material_regex().is_match(material) {
        return true;
    }
    problems.push(
        ConfigProblem::error(
            ProblemKind::UnknownMaterial,
            format!("Material '{}' does not exist", material),
        )
        .at(path),
    );
    false
}

/// World restriction. A task without `worlds` is valid everywhere.
pub fn validate_world(world: &str, task: &Task) -> bool {
    match task.config_value("worlds") {
        None => true,
        Some(value) => string_list(value).iter().any(|w| w == world),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn test_validate_exists() {
        let mut problems = Vec::new();
        assert!(validate_exists("tasks.a.amount", Some(&int(1)), &mut problems, "amount", "crafting"));
        assert!(!validate_exists("tasks.a.amount", None, &mut problems, "amount", "crafting"));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::TaskMissingField);
        assert_eq!(problems[0].location.as_deref(), Some("tasks.a.amount"));
    }

    #[test]
    fn test_validate_int() {
        let mut problems = Vec::new();
        assert!(validate_int("p", Some(&int(3)), &mut problems, false, true, "amount"));
        assert!(validate_int("p", None, &mut problems, true, false, "data"));
        assert!(problems.is_empty());

        assert!(!validate_int("p", Some(&int(0)), &mut problems, false, true, "amount"));
        assert!(!validate_int("p", Some(&Value::String("five".into())), &mut problems, false, true, "amount"));
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.kind == ProblemKind::TaskMalformedField));
        assert!(problems[1].description.contains("five"));
    }

    #[test]
    fn test_validate_item() {
        let mut problems = Vec::new();
        assert!(validate_item("p", Some(&Value::String("DIAMOND_PICKAXE".into())), &mut problems, false, "item"));

        let section: toml::Table = toml::from_str("type = \"STONE\"\ndata = 1\nlore = [\"a\"]").unwrap();
        assert!(validate_item("p", Some(&Value::Table(section)), &mut problems, false, "item"));
        assert!(problems.is_empty());

        assert!(!validate_item("p", Some(&Value::String("not a material".into())), &mut problems, false, "item"));
        assert_eq!(problems[0].kind, ProblemKind::UnknownMaterial);

        let missing_type: toml::Table = toml::from_str("name = \"x\"").unwrap();
        assert!(!validate_item("p", Some(&Value::Table(missing_type)), &mut problems, false, "item"));
        assert_eq!(problems[1].kind, ProblemKind::TaskMissingField);
        assert_eq!(problems[1].location.as_deref(), Some("p.type"));
    }

    #[test]
    fn test_validate_quest_item_reference() {
        let mut problems = Vec::new();
        let reference: toml::Table = toml::from_str("quest-item = \"blade\"").unwrap();
        assert!(validate_item("p", Some(&Value::Table(reference)), &mut problems, false, "item"));
        assert!(problems.is_empty());

        let numeric: toml::Table = toml::from_str("quest-item = 4").unwrap();
        assert!(!validate_item("p", Some(&Value::Table(numeric)), &mut problems, false, "item"));
        assert_eq!(problems[0].kind, ProblemKind::TaskMalformedField);
        assert_eq!(problems[0].location.as_deref(), Some("p.quest-item"));
    }

    #[test]
    fn test_validate_world() {
        let mut task = Task::new("a", "crafting");
        assert!(validate_world("nether", &task));

        task.set_config_value("worlds", Value::Array(vec![Value::String("world".into())]));
        assert!(validate_world("world", &task));
        assert!(!validate_world("nether", &task));

        task.set_config_value("worlds", Value::String("nether".into()));
        assert!(validate_world("nether", &task));
    }
}
