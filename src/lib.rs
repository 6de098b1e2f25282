//! Quests Server
//!
//! Data-driven quest engine: loads quest definitions from a directory of TOML
//! files, reports what is wrong with them, and tracks participant progress as
//! domain events arrive.

pub mod config;
pub mod http;
pub mod progress;
pub mod quest;
pub mod service;
pub mod tasktype;
pub mod watcher;
