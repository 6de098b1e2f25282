//! Quest State Tracking
//!
//! Per-participant progress records. A [`QuestProgressFile`] belongs to one
//! participant and is persisted independently of the loaded quests, so it may
//! hold entries for quests that no longer exist. Those are kept as-is.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quest::definition::Quest;

/// Progress on a single task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Unset means no progress yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(default)]
    pub completed: bool,
}

impl TaskProgress {
    pub fn value(&self) -> u32 {
        self.progress.unwrap_or(0)
    }

    /// Add progress towards `target` and return true if newly completed.
    /// Completed records are left untouched.
    pub fn add_progress(&mut self, amount: u32, target: u32) -> bool {
        if self.completed {
            return false;
        }
        let updated = self.value().saturating_add(amount);
        if updated >= target {
            self.progress = Some(target);
            self.completed = true;
            true
        } else {
            self.progress = Some(updated);
            false
        }
    }

    pub fn reset(&mut self) {
        self.progress = None;
        self.completed = false;
    }
}

/// Progress on one quest for one participant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestProgress {
    pub started: bool,
    pub started_at: Option<DateTime<Utc>>,
    /// Completed in the current or a previous cycle
    pub completed: bool,
    pub completed_before: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Progress on each task (keyed by task id)
    pub tasks: HashMap<String, TaskProgress>,
}

impl QuestProgress {
    pub fn task_progress(&self, task_id: &str) -> Option<&TaskProgress> {
        self.tasks.get(task_id)
    }

    /// Get task progress, creating an empty record if needed
    pub fn task_progress_mut(&mut self, task_id: &str) -> &mut TaskProgress {
        self.tasks.entry(task_id.to_string()).or_default()
    }

    /// True if every task of the quest is completed
    pub fn all_tasks_complete(&self, quest: &Quest) -> bool {
        quest.tasks.iter().all(|task| {
            self.task_progress(&task.id)
                .is_some_and(|progress| progress.completed)
        })
    }

    /// Begin a new cycle
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.started = true;
        self.started_at = Some(now);
        self.reset_tasks();
    }

    /// End the cycle as completed
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.started = false;
        self.completed = true;
        self.completed_before = true;
        self.completed_at = Some(now);
        self.reset_tasks();
    }

    /// End the cycle without completing it
    pub fn cancel(&mut self) {
        self.started = false;
        self.reset_tasks();
    }

    pub fn reset_tasks(&mut self) {
        self.tasks.clear();
    }
}

/// All quest progress for a single participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestProgressFile {
    pub participant: Uuid,
    /// Keyed by quest id
    #[serde(default)]
    pub quests: HashMap<String, QuestProgress>,
}

impl QuestProgressFile {
    pub fn new(participant: Uuid) -> Self {
        Self {
            participant,
            quests: HashMap::new(),
        }
    }

    pub fn quest_progress(&self, quest_id: &str) -> Option<&QuestProgress> {
        self.quests.get(quest_id)
    }

    /// Get quest progress, creating an empty record if needed
    pub fn quest_progress_mut(&mut self, quest_id: &str) -> &mut QuestProgress {
        self.quests.entry(quest_id.to_string()).or_default()
    }

    pub fn has_started(&self, quest_id: &str) -> bool {
        self.quest_progress(quest_id).is_some_and(|p| p.started)
    }

    pub fn has_completed_before(&self, quest_id: &str) -> bool {
        self.quest_progress(quest_id).is_some_and(|p| p.completed_before)
    }

    /// Ids of quests currently in progress
    pub fn started_quests(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .quests
            .iter()
            .filter(|(_, p)| p.started)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}
