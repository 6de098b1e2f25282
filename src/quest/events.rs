//! Quest Event Types
//!
//! Domain events delivered by the host that can advance task progress, and
//! the records the engine hands back after applying them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An item as described by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Material id (e.g. "DIAMOND_PICKAXE")
    pub material: String,
    /// Legacy data/durability value
    #[serde(default)]
    pub data: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lore: Vec<String>,
}

impl ItemStack {
    pub fn of(material: &str) -> Self {
        Self {
            material: material.to_string(),
            data: None,
            name: None,
            lore: Vec::new(),
        }
    }
}

/// A block position in a world
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockLocation {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Events that can trigger task progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestEvent {
    /// Participant took crafted items out of a crafting grid
    ItemCrafted {
        participant: Uuid,
        world: String,
        item: ItemStack,
        /// Number of items produced by this craft
        amount: u32,
    },

    /// Participant killed another player
    PlayerKilled {
        killer: Uuid,
        victim: Uuid,
        world: String,
    },

    /// Participant opened a brewing stand
    BrewingStandOpened {
        participant: Uuid,
        location: BlockLocation,
    },

    /// A brewing stand finished brewing
    PotionBrewed {
        location: BlockLocation,
        /// Number of potion slots that held a potion (0-3)
        filled_slots: u32,
    },
}

impl QuestEvent {
    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            QuestEvent::ItemCrafted { .. } => "item_crafted",
            QuestEvent::PlayerKilled { .. } => "player_killed",
            QuestEvent::BrewingStandOpened { .. } => "brewing_stand_opened",
            QuestEvent::PotionBrewed { .. } => "potion_brewed",
        }
    }
}

/// The participant an event is credited to, as resolved by a task type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub participant: Uuid,
    /// World the participant was in, checked against a task's `worlds`
    pub world: String,
}

/// Result of applying an event to one task
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub participant: Uuid,
    pub quest_id: String,
    pub task_id: String,
    pub progress: u32,
    pub target: u32,
    /// Whether the task was completed by this update
    pub task_completed: bool,
}

/// A quest that was completed while applying an event
#[derive(Debug, Clone, Serialize)]
pub struct QuestCompletion {
    pub participant: Uuid,
    pub quest_id: String,
    /// Reward commands for the host to run
    pub rewards: Vec<String>,
    /// Text shown to the participant
    pub reward_string: Vec<String>,
}

/// Everything that changed while applying one event
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventOutcome {
    pub updates: Vec<ProgressUpdate>,
    pub completions: Vec<QuestCompletion>,
}

impl EventOutcome {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.completions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = r#"{
            "type": "item_crafted",
            "participant": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "world": "world",
            "item": { "material": "STICK" },
            "amount": 4
        }"#;
        let event: QuestEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type(), "item_crafted");
        match event {
            QuestEvent::ItemCrafted { item, amount, .. } => {
                assert_eq!(item, ItemStack::of("STICK"));
                assert_eq!(amount, 4);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
