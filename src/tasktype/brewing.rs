//! Brewing task type: brew potions.
//!
//! Brewing finishes without a player attached, so the type remembers who last
//! opened each brewing stand and credits them when it finishes.

use std::collections::HashMap;

use uuid::Uuid;

use super::{ConfigValue, TaskType, utils};
use crate::quest::definition::{Quest, Task, TaskConfig};
use crate::quest::events::{BlockLocation, QuestEvent, Trigger};
use crate::quest::problem::ConfigProblem;

const CONFIG_VALUES: &[ConfigValue] = &[
    ConfigValue::new("amount", true, "Amount of potions to be brewed."),
    ConfigValue::new("worlds", false, "Permitted worlds the player must be in."),
];

/// Potion slots in a brewing stand
const POTION_SLOTS: u32 = 3;

pub struct BrewingTaskType {
    brewing_stands: HashMap<BlockLocation, Uuid>,
}

impl BrewingTaskType {
    pub fn new() -> Self {
        Self {
            brewing_stands: HashMap::new(),
        }
    }
}

impl Default for BrewingTaskType {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskType for BrewingTaskType {
    fn type_tag(&self) -> &'static str {
        "brewing"
    }

    fn description(&self) -> &'static str {
        "Brew a potion."
    }

    fn config_values(&self) -> &[ConfigValue] {
        CONFIG_VALUES
    }

    fn validate_config(&self, root: &str, config: &TaskConfig) -> Vec<ConfigProblem> {
        let mut problems = Vec::new();
        let amount_path = format!("{}.amount", root);
        if utils::validate_exists(&amount_path, config.get("amount"), &mut problems, "amount", self.type_tag()) {
            utils::validate_int(&amount_path, config.get("amount"), &mut problems, false, true, "amount");
        }
        utils::validate_string_list(&format!("{}.worlds", root), config.get("worlds"), &mut problems, true, "worlds");
        problems
    }

    fn observe(&mut self, event: &QuestEvent) -> Option<Trigger> {
        match event {
            QuestEvent::BrewingStandOpened { participant, location } => {
                self.brewing_stands.insert(location.clone(), *participant);
                None
            }
            QuestEvent::PotionBrewed { location, .. } => {
                let participant = self.brewing_stands.get(location)?;
                Some(Trigger {
                    participant: *participant,
                    world: location.world.clone(),
                })
            }
            _ => None,
        }
    }

    fn forget_participant(&mut self, participant: Uuid) {
        self.brewing_stands.retain(|_, opener| *opener != participant);
    }

    fn increment(&mut self, event: &QuestEvent, _quest: &Quest, _task: &Task) -> u32 {
        match event {
            QuestEvent::PotionBrewed { filled_slots, .. } => (*filled_slots).min(POTION_SLOTS),
            _ => 0,
        }
    }
}
