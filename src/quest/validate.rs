//! Structural validation of a parsed quest file
//!
//! Problems accumulate instead of short-circuiting so that one load pass
//! reports everything wrong with a file.

use toml::Value;

use super::problem::ConfigProblem;
use super::tree::ConfigTree;
use crate::tasktype::TaskTypeRegistry;

/// Quest ids are file stems and must be non-empty and alphanumeric
pub fn is_valid_quest_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(char::is_alphanumeric)
}

/// Check everything wrong with a quest file before building the quest
pub fn validate_quest(id: &str, tree: &ConfigTree, task_types: &TaskTypeRegistry) -> Vec<ConfigProblem> {
    let mut problems = Vec::new();

    if !is_valid_quest_id(id) {
        problems.push(ConfigProblem::invalid_quest_id(id));
    }

    if let Some(time) = tree.get("options.cooldown.time") {
        let minutes = time.as_integer().filter(|n| u32::try_from(*n).is_ok());
        if minutes.is_none() {
            problems.push(ConfigProblem::malformed_option(
                format!("Cooldown time must be a whole number of minutes from 0, but got '{}' instead", time),
                "options.cooldown.time",
            ));
        }
    }

    let Some(tasks) = tree.section("tasks") else {
        problems.push(ConfigProblem::no_tasks());
        return problems;
    };

    let mut valid_tasks = 0;
    for (task_id, entry) in tasks {
        let task_root = format!("tasks.{}", task_id);

        let Value::Table(section) = entry else {
            problems.push(ConfigProblem::task_not_section(task_id, &task_root));
            continue;
        };

        let Some(type_tag) = section.get("type").and_then(Value::as_str) else {
            problems.push(ConfigProblem::no_task_type(&task_root));
            continue;
        };

        match task_types.get(type_tag) {
            Some(task_type) => {
                problems.extend(task_type.validate_config(&task_root, section));
                valid_tasks += 1;
            }
            None => {
                problems.push(ConfigProblem::unknown_task_type(type_tag, &task_root));
            }
        }
    }

    if valid_tasks == 0 {
        problems.push(ConfigProblem::no_tasks());
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::problem::{ProblemKind, ProblemSeverity, has_blocking_error};

    fn validate(id: &str, text: &str) -> Vec<ConfigProblem> {
        let tree = ConfigTree::parse(text).unwrap();
        validate_quest(id, &tree, &TaskTypeRegistry::with_builtin_types())
    }

    fn kinds(problems: &[ConfigProblem]) -> Vec<(ProblemKind, ProblemSeverity)> {
        problems.iter().map(|p| (p.kind, p.severity)).collect()
    }

    #[test]
    fn test_quest_id_rules() {
        assert!(is_valid_quest_id("miner1"));
        assert!(!is_valid_quest_id(""));
        assert!(!is_valid_quest_id("first_quest"));
        assert!(!is_valid_quest_id("a b"));
    }

    #[test]
    fn test_valid_quest_has_no_problems() {
        let problems = validate("kills", "[tasks.kill]\ntype = \"playerkilling\"\namount = 3\n");
        assert!(problems.is_empty());
    }

    #[test]
    fn test_invalid_id_does_not_stop_validation() {
        let problems = validate("bad-id", "[tasks.kill]\ntype = \"foo\"\n");
        assert_eq!(
            kinds(&problems),
            vec![
                (ProblemKind::InvalidQuestId, ProblemSeverity::Error),
                (ProblemKind::UnknownTaskType, ProblemSeverity::Warning),
                (ProblemKind::NoTasks, ProblemSeverity::Error),
            ]
        );
        let invalid_ids = problems.iter().filter(|p| p.kind == ProblemKind::InvalidQuestId).count();
        assert_eq!(invalid_ids, 1);
    }

    #[test]
    fn test_negative_cooldown_is_warning() {
        let problems = validate(
            "cool",
            "[options.cooldown]\nenabled = true\ntime = -5\n[tasks.kill]\ntype = \"playerkilling\"\namount = 3\n",
        );
        assert_eq!(kinds(&problems), vec![(ProblemKind::MalformedOption, ProblemSeverity::Warning)]);
        assert_eq!(problems[0].location.as_deref(), Some("options.cooldown.time"));
        assert!(problems[0].description.contains("-5"));

        let problems = validate("cool", "[options.cooldown]\ntime = \"soon\"\n[tasks.kill]\ntype = \"playerkilling\"\n");
        assert_eq!(problems[0].kind, ProblemKind::MalformedOption);
    }

    #[test]
    fn test_missing_tasks_section() {
        let problems = validate("empty", "[options]\nrepeatable = true\n");
        assert_eq!(kinds(&problems), vec![(ProblemKind::NoTasks, ProblemSeverity::Error)]);
    }

    #[test]
    fn test_empty_tasks_section() {
        let problems = validate("empty", "[tasks]\n");
        assert_eq!(kinds(&problems), vec![(ProblemKind::NoTasks, ProblemSeverity::Error)]);
    }

    #[test]
    fn test_malformed_tasks_are_skipped() {
        let problems = validate(
            "mixed",
            r#"
[tasks]
flat = 5

[tasks.untyped]
amount = 3

[tasks.kill]
type = "playerkilling"
amount = 3
"#,
        );
        assert_eq!(
            kinds(&problems),
            vec![
                (ProblemKind::TaskMalformedNotSection, ProblemSeverity::Warning),
                (ProblemKind::NoTaskType, ProblemSeverity::Warning),
            ]
        );
        assert!(!has_blocking_error(&problems));
        assert_eq!(problems[0].location.as_deref(), Some("tasks.flat"));
        assert_eq!(problems[1].location.as_deref(), Some("tasks.untyped"));
    }

    #[test]
    fn test_type_problems_are_collected() {
        let problems = validate("craft", "[tasks.c]\ntype = \"crafting\"\nitem = \"STICK\"\n");
        assert_eq!(
            kinds(&problems),
            vec![(ProblemKind::TaskMissingField, ProblemSeverity::Error)]
        );
        assert_eq!(problems[0].location.as_deref(), Some("tasks.c.amount"));
    }
}
