//! Quest System Module
//!
//! Quests are defined in TOML files under the quests directory. Loading turns
//! them into an in-memory catalog and a per-file diagnostics report.

pub mod definition;
pub mod events;
pub mod items;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod problem;
pub mod tree;
pub mod validate;

pub use definition::{Category, DisplayInfo, Quest, QuestOptions, Task};
pub use events::{EventOutcome, QuestEvent};
pub use items::{ItemDescriptor, QuestItem, QuestItemRegistry};
pub use loader::{QuestLoader, load_quests};
pub use manager::QuestManager;
pub use problem::{ConfigProblem, Diagnostics, ProblemKind, ProblemSeverity};
