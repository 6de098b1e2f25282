//! Task Types
//!
//! A task type is a pluggable objective kind. Each one validates the config of
//! tasks declared with its tag and turns domain events into task progress.
//! Types live in a [`TaskTypeRegistry`] keyed by tag.

pub mod brewing;
pub mod crafting;
pub mod playerkilling;
pub mod utils;

use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::quest::definition::{Quest, Task, TaskConfig};
use crate::quest::events::{QuestEvent, Trigger};
use crate::quest::problem::ConfigProblem;

pub use brewing::BrewingTaskType;
pub use crafting::CraftingTaskType;
pub use playerkilling::PlayerKillingTaskType;

/// Describes one config key a task type understands
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ConfigValue {
    pub key: &'static str,
    pub required: bool,
    pub description: &'static str,
}

impl ConfigValue {
    pub const fn new(key: &'static str, required: bool, description: &'static str) -> Self {
        Self {
            key,
            required,
            description,
        }
    }
}

/// Capability interface every task type implements
pub trait TaskType: Send {
    /// Unique tag used in definition files
    fn type_tag(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Config keys understood by this type
    fn config_values(&self) -> &[ConfigValue] {
        &[]
    }

    /// Check the config of one task. `root` is the task's path (e.g. `tasks.mine`)
    /// and is used as the prefix for problem locations.
    fn validate_config(&self, root: &str, config: &TaskConfig) -> Vec<ConfigProblem>;

    /// Called after every load pass. Derived caches must be dropped here.
    fn on_ready(&mut self) {}

    /// Called when a participant leaves. Per-participant state must be dropped here.
    fn forget_participant(&mut self, _participant: Uuid) {}

    /// Decide whether this type reacts to an event and who gets credit for it
    fn observe(&mut self, event: &QuestEvent) -> Option<Trigger>;

    /// Progress the event contributes to one task of this type. Zero means the
    /// event does not match the task.
    fn increment(&mut self, event: &QuestEvent, quest: &Quest, task: &Task) -> u32;
}

/// A registered task type and the quests that use it
pub struct RegisteredType {
    pub task_type: Box<dyn TaskType>,
    /// Ids of loaded quests with at least one task of this type
    pub quest_ids: Vec<String>,
}

/// Registry of task types keyed by tag
#[derive(Default)]
pub struct TaskTypeRegistry {
    types: Vec<RegisteredType>,
    index: HashMap<String, usize>,
}

impl TaskTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in task type
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CraftingTaskType::new()));
        registry.register(Box::new(BrewingTaskType::new()));
        registry.register(Box::new(PlayerKillingTaskType::new()));
        registry
    }

    /// Add a task type. Returns false if the tag is already taken.
    pub fn register(&mut self, task_type: Box<dyn TaskType>) -> bool {
        let tag = task_type.type_tag().to_string();
        if self.index.contains_key(&tag) {
            warn!("Task type '{}' is already registered, ignoring", tag);
            return false;
        }
        debug!("Registered task type: {}", tag);
        self.index.insert(tag, self.types.len());
        self.types.push(RegisteredType {
            task_type,
            quest_ids: Vec::new(),
        });
        true
    }

    pub fn get(&self, tag: &str) -> Option<&dyn TaskType> {
        self.index
            .get(tag)
            .map(|&i| self.types[i].task_type.as_ref())
    }

    /// Registered types in registration order
    pub fn types(&self) -> impl Iterator<Item = &dyn TaskType> {
        self.types.iter().map(|t| t.task_type.as_ref())
    }

    /// Forget which quests use which type (start of a load pass)
    pub fn reset(&mut self) {
        for entry in &mut self.types {
            entry.quest_ids.clear();
        }
    }

    /// Record a loaded quest against every type its tasks use
    pub fn register_quest_tasks(&mut self, quest: &Quest) {
        for task in &quest.tasks {
            if let Some(&i) = self.index.get(&task.type_tag) {
                let quest_ids = &mut self.types[i].quest_ids;
                if !quest_ids.contains(&quest.id) {
                    quest_ids.push(quest.id.clone());
                }
            }
        }
    }

    pub fn registered_quests(&self, tag: &str) -> &[String] {
        self.index
            .get(tag)
            .map(|&i| self.types[i].quest_ids.as_slice())
            .unwrap_or(&[])
    }

    /// Ready signal after a load pass
    pub fn ready(&mut self) {
        for entry in &mut self.types {
            entry.task_type.on_ready();
        }
    }

    pub fn forget_participant(&mut self, participant: Uuid) {
        for entry in &mut self.types {
            entry.task_type.forget_participant(participant);
        }
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut RegisteredType> {
        self.types.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let registry = TaskTypeRegistry::with_builtin_types();
        let tags: Vec<&str> = registry.types().map(|t| t.type_tag()).collect();
        assert_eq!(tags, vec!["crafting", "brewing", "playerkilling"]);
        assert!(registry.types().all(|t| !t.config_values().is_empty()));
        assert!(registry.get("crafting").is_some());
        assert!(registry.get("foo").is_none());
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut registry = TaskTypeRegistry::with_builtin_types();
        assert!(!registry.register(Box::new(CraftingTaskType::new())));
        assert_eq!(registry.types().count(), 3);
    }

    #[test]
    fn test_register_quest_tasks_and_reset() {
        let mut registry = TaskTypeRegistry::with_builtin_types();
        let mut quest = Quest::new("q");
        quest.register_task(Task::new("a", "crafting"));
        quest.register_task(Task::new("b", "crafting"));
        quest.register_task(Task::new("c", "unknown"));

        registry.register_quest_tasks(&quest);
        assert_eq!(registry.registered_quests("crafting"), ["q".to_string()]);
        assert!(registry.registered_quests("brewing").is_empty());
        assert!(registry.registered_quests("unknown").is_empty());

        registry.reset();
        assert!(registry.registered_quests("crafting").is_empty());
    }
}
