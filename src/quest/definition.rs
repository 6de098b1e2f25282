//! Quest Definition Structures
//!
//! Resolved quests, tasks and categories. These are built by the loader from
//! validated definition files and never change until the next reload.

use std::collections::HashMap;

use serde::Serialize;
use toml::{Table, Value};

/// Key/value configuration of a single task
pub type TaskConfig = Table;

/// A single objective inside a quest
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    /// Task type tag (e.g. "crafting")
    #[serde(rename = "type")]
    pub type_tag: String,
    /// File-local values merged with the type's global defaults
    pub config: TaskConfig,
}

impl Task {
    pub fn new(id: &str, type_tag: &str) -> Self {
        Self {
            id: id.to_string(),
            type_tag: type_tag.to_string(),
            config: TaskConfig::new(),
        }
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub fn set_config_value(&mut self, key: &str, value: Value) {
        self.config.insert(key.to_string(), value);
    }

    /// Amount of progress needed to complete this task
    pub fn target(&self) -> Option<u32> {
        self.config
            .get("amount")
            .and_then(Value::as_integer)
            .and_then(|amount| u32::try_from(amount).ok())
    }
}

/// Presentation strings, rendered elsewhere
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayInfo {
    pub name: Option<String>,
    pub lore_normal: Vec<String>,
    pub lore_started: Vec<String>,
}

/// Quest behaviour flags
#[derive(Debug, Clone, Serialize)]
pub struct QuestOptions {
    pub repeatable: bool,
    pub cooldown_enabled: bool,
    /// Cooldown in minutes
    pub cooldown_minutes: u32,
    pub permission_required: bool,
    pub autostart: bool,
    pub sort_order: i64,
}

impl Default for QuestOptions {
    fn default() -> Self {
        Self {
            repeatable: false,
            cooldown_enabled: false,
            cooldown_minutes: 10,
            permission_required: false,
            autostart: false,
            sort_order: 1,
        }
    }
}

/// A fully resolved quest definition
#[derive(Debug, Clone, Serialize)]
pub struct Quest {
    pub id: String,
    /// Tasks in authoring order
    pub tasks: Vec<Task>,
    pub category: Option<String>,
    /// Quest ids that must be completed before this one can start
    pub requirements: Vec<String>,
    /// Commands run by the host on completion
    pub rewards: Vec<String>,
    pub reward_string: Vec<String>,
    pub start_string: Vec<String>,
    pub start_commands: Vec<String>,
    pub placeholders: HashMap<String, String>,
    pub options: QuestOptions,
    pub display: DisplayInfo,
}

impl Quest {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tasks: Vec::new(),
            category: None,
            requirements: Vec::new(),
            rewards: Vec::new(),
            reward_string: Vec::new(),
            start_string: Vec::new(),
            start_commands: Vec::new(),
            placeholders: HashMap::new(),
            options: QuestOptions::default(),
            display: DisplayInfo::default(),
        }
    }

    /// Add a task, replacing any earlier task with the same id
    pub fn register_task(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn has_task(&self, id: &str) -> bool {
        self.get_task(id).is_some()
    }

    pub fn tasks_of_type<'a>(&'a self, type_tag: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.type_tag == type_tag)
    }
}

/// A named grouping of quests
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: String,
    pub display: DisplayInfo,
    pub permission_required: bool,
    /// Ids of quests that declared this category
    pub quest_ids: Vec<String>,
}

impl Category {
    pub fn new(id: &str, permission_required: bool) -> Self {
        Self {
            id: id.to_string(),
            display: DisplayInfo::default(),
            permission_required,
            quest_ids: Vec::new(),
        }
    }

    pub fn register_quest_id(&mut self, quest_id: &str) {
        if !self.quest_ids.iter().any(|id| id == quest_id) {
            self.quest_ids.push(quest_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_target() {
        let mut task = Task::new("craft", "crafting");
        assert_eq!(task.target(), None);

        task.set_config_value("amount", Value::Integer(5));
        assert_eq!(task.target(), Some(5));

        task.set_config_value("amount", Value::Integer(-1));
        assert_eq!(task.target(), None);
    }

    #[test]
    fn test_tasks_of_type() {
        let mut quest = Quest::new("test");
        quest.register_task(Task::new("a", "crafting"));
        quest.register_task(Task::new("b", "brewing"));
        quest.register_task(Task::new("c", "crafting"));

        let ids: Vec<&str> = quest.tasks_of_type("crafting").map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(quest.has_task("b"));
        assert!(!quest.has_task("d"));
    }

    #[test]
    fn test_category_quest_ids_unique() {
        let mut category = Category::new("shop", false);
        category.register_quest_id("a");
        category.register_quest_id("a");
        assert_eq!(category.quest_ids, vec!["a"]);
    }
}
