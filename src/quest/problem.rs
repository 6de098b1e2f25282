//! Config Problems
//!
//! Severity-tagged diagnostics produced while loading quest definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// How serious a problem is. Errors block quest construction unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemSeverity {
    Error,
    Warning,
}

impl ProblemSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemSeverity::Error => "ERROR",
            ProblemSeverity::Warning => "WARNING",
        }
    }
}

/// Machine-readable problem code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemKind {
    MalformedInput,
    InvalidQuestId,
    NoTasks,
    TaskMalformedNotSection,
    NoTaskType,
    UnknownTaskType,
    TaskMissingField,
    TaskMalformedField,
    UnknownMaterial,
    UnknownQuestItem,
    MalformedOption,
    UnknownCategory,
    UnknownTaskReference,
    UnknownRequirement,
}

/// A single diagnostic tied to a location inside a definition file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigProblem {
    pub severity: ProblemSeverity,
    pub kind: ProblemKind,
    pub description: String,
    /// Dotted config path the problem refers to, if any
    pub location: Option<String>,
}

impl ConfigProblem {
    pub fn error(kind: ProblemKind, description: impl Into<String>) -> Self {
        Self {
            severity: ProblemSeverity::Error,
            kind,
            description: description.into(),
            location: None,
        }
    }

    pub fn warning(kind: ProblemKind, description: impl Into<String>) -> Self {
        Self {
            severity: ProblemSeverity::Warning,
            kind,
            description: description.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == ProblemSeverity::Error
    }

    // Canned problems shared by the loader and the validator

    pub fn malformed_input(reason: &str) -> Self {
        Self::error(
            ProblemKind::MalformedInput,
            format!("Malformed TOML file, cannot read config: {}", reason),
        )
    }

    pub fn invalid_quest_id(id: &str) -> Self {
        Self::error(
            ProblemKind::InvalidQuestId,
            format!("ID '{}' is invalid, must be alphanumeric, unique and with no spaces", id),
        )
    }

    pub fn no_tasks() -> Self {
        Self::error(ProblemKind::NoTasks, "Quest contains no valid tasks").at("tasks")
    }

    pub fn task_not_section(task_id: &str, root: &str) -> Self {
        Self::warning(
            ProblemKind::TaskMalformedNotSection,
            format!("Task '{}' is not a configuration section (has no fields)", task_id),
        )
        .at(root)
    }

    pub fn no_task_type(root: &str) -> Self {
        Self::warning(ProblemKind::NoTaskType, "Task type not specified").at(root)
    }

    pub fn unknown_task_type(type_tag: &str, root: &str) -> Self {
        Self::warning(
            ProblemKind::UnknownTaskType,
            format!("Task type '{}' does not exist", type_tag),
        )
        .at(root)
    }

    pub fn unknown_quest_item(item_id: &str, location: &str) -> Self {
        Self::warning(
            ProblemKind::UnknownQuestItem,
            format!("Quest item '{}' does not exist", item_id),
        )
        .at(location)
    }

    pub fn malformed_option(description: impl Into<String>, location: &str) -> Self {
        Self::warning(ProblemKind::MalformedOption, description).at(location)
    }

    pub fn unknown_category(category: &str) -> Self {
        Self::warning(
            ProblemKind::UnknownCategory,
            format!("Category '{}' does not exist", category),
        )
        .at("options.category")
    }

    pub fn unknown_task_reference(task_id: &str, location: &str) -> Self {
        Self::warning(
            ProblemKind::UnknownTaskReference,
            format!("Attempt to reference unknown task '{}'", task_id),
        )
        .at(location)
    }

    pub fn unknown_requirement(quest_id: &str) -> Self {
        Self::warning(
            ProblemKind::UnknownRequirement,
            format!("Quest requirement '{}' does not exist", quest_id),
        )
        .at("options.requires")
    }
}

impl fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.as_str(), self.description)?;
        if let Some(ref location) = self.location {
            write!(f, " (at {})", location)?;
        }
        Ok(())
    }
}

/// Problems for one load pass, keyed by file path relative to the quests root
pub type Diagnostics = BTreeMap<String, Vec<ConfigProblem>>;

/// True if any problem in the list blocks construction
pub fn has_blocking_error(problems: &[ConfigProblem]) -> bool {
    problems.iter().any(ConfigProblem::is_error)
}
