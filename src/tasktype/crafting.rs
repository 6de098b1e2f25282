//! Crafting task type: craft a specific item.

use std::collections::HashMap;

use super::{ConfigValue, TaskType, utils};
use crate::quest::definition::{Quest, Task, TaskConfig};
use crate::quest::events::{QuestEvent, Trigger};
use crate::quest::items::ItemDescriptor;
use crate::quest::problem::ConfigProblem;

const CONFIG_VALUES: &[ConfigValue] = &[
    ConfigValue::new("item", true, "Item to be crafted: a material, an item section or a quest item reference."),
    ConfigValue::new("amount", true, "Amount of items to be crafted."),
    ConfigValue::new("data", false, "Data value of the item."),
    ConfigValue::new("worlds", false, "Permitted worlds the player must be in."),
];

pub struct CraftingTaskType {
    /// Item descriptors keyed by (quest id, task id)
    item_cache: HashMap<(String, String), ItemDescriptor>,
}

impl CraftingTaskType {
    pub fn new() -> Self {
        Self {
            item_cache: HashMap::new(),
        }
    }

    fn descriptor(&mut self, quest: &Quest, task: &Task) -> Option<&ItemDescriptor> {
        let key = (quest.id.clone(), task.id.clone());
        if !self.item_cache.contains_key(&key) {
            let descriptor = ItemDescriptor::from_task(task)?;
            self.item_cache.insert(key.clone(), descriptor);
        }
        self.item_cache.get(&key)
    }

    pub fn cached_items(&self) -> usize {
        self.item_cache.len()
    }
}

impl Default for CraftingTaskType {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskType for CraftingTaskType {
    fn type_tag(&self) -> &'static str {
        "crafting"
    }

    fn description(&self) -> &'static str {
        "Craft a specific item."
    }

    fn config_values(&self) -> &[ConfigValue] {
        CONFIG_VALUES
    }

    fn validate_config(&self, root: &str, config: &TaskConfig) -> Vec<ConfigProblem> {
        let mut problems = Vec::new();
        let item_path = format!("{}.item", root);
        if utils::validate_exists(&item_path, config.get("item"), &mut problems, "item", self.type_tag()) {
            utils::validate_item(&item_path, config.get("item"), &mut problems, false, "item");
        }
        let amount_path = format!("{}.amount", root);
        if utils::validate_exists(&amount_path, config.get("amount"), &mut problems, "amount", self.type_tag()) {
            utils::validate_int(&amount_path, config.get("amount"), &mut problems, false, true, "amount");
        }
        utils::validate_int(&format!("{}.data", root), config.get("data"), &mut problems, true, false, "data");
        utils::validate_string_list(&format!("{}.worlds", root), config.get("worlds"), &mut problems, true, "worlds");
        problems
    }

    fn on_ready(&mut self) {
        self.item_cache.clear();
    }

    fn observe(&mut self, event: &QuestEvent) -> Option<Trigger> {
        match event {
            QuestEvent::ItemCrafted { participant, world, .. } => Some(Trigger {
                participant: *participant,
                world: world.clone(),
            }),
            _ => None,
        }
    }

    fn increment(&mut self, event: &QuestEvent, quest: &Quest, task: &Task) -> u32 {
        let QuestEvent::ItemCrafted { item, amount, .. } = event else {
            return 0;
        };
        match self.descriptor(quest, task) {
            Some(descriptor) if descriptor.matches(item) => *amount,
            _ => 0,
        }
    }
}
