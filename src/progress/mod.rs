//! Participant Progress
//!
//! Progress records, their JSON persistence, and the engine that applies
//! domain events to them.

pub mod engine;
pub mod state;
pub mod store;

pub use engine::{QuestStart, StartQuestError, apply_event, cancel_quest, start_autostart_quests, start_quest};
pub use state::{QuestProgress, QuestProgressFile, TaskProgress};
pub use store::{ProgressStore, StoreError};
