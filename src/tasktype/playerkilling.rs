//! Player killing task type: kill a set amount of players.

use super::{ConfigValue, TaskType, utils};
use crate::quest::definition::{Quest, Task, TaskConfig};
use crate::quest::events::{QuestEvent, Trigger};
use crate::quest::problem::ConfigProblem;

const CONFIG_VALUES: &[ConfigValue] = &[
    ConfigValue::new("amount", true, "Amount of players to be killed."),
    ConfigValue::new("worlds", false, "Permitted worlds the player must be in."),
];

#[derive(Default)]
pub struct PlayerKillingTaskType;

impl PlayerKillingTaskType {
    pub fn new() -> Self {
        Self
    }
}

impl TaskType for PlayerKillingTaskType {
    fn type_tag(&self) -> &'static str {
        "playerkilling"
    }

    fn description(&self) -> &'static str {
        "Kill a set amount of players."
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
            // Suicides don't count
            QuestEvent::PlayerKilled { killer, victim, world } if killer != victim => Some(Trigger {
                participant: *killer,
                world: world.clone(),
            }),
            _ => None,
        }
    }

    fn increment(&mut self, event: &QuestEvent, _quest: &Quest, _task: &Task) -> u32 {
        match event {
            QuestEvent::PlayerKilled { .. } => 1,
            _ => 0,
        }
    }
}
