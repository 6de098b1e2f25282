//! Progress Update Engine
//!
//! Applies domain events to participant progress. The algorithm is the same for
//! every task type; types only decide who an event is credited to and how much
//! progress it is worth for a given task.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::state::QuestProgressFile;
use super::store::ProgressStore;
use crate::quest::definition::Quest;
use crate::quest::events::{EventOutcome, ProgressUpdate, QuestCompletion, QuestEvent};
use crate::quest::manager::QuestManager;
use crate::tasktype::{TaskTypeRegistry, utils};

/// Why a quest could not be started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartQuestError {
    #[error("quest '{0}' does not exist")]
    UnknownQuest(String),

    #[error("quest '{0}' is already started")]
    AlreadyStarted(String),

    #[error("quest '{0}' has already been completed and is not repeatable")]
    AlreadyCompleted(String),

    #[error("quest '{quest_id}' is on cooldown for another {remaining_secs} seconds")]
    OnCooldown { quest_id: String, remaining_secs: i64 },

    #[error("quest '{quest_id}' requires '{missing}' to be completed first")]
    RequirementsNotMet { quest_id: String, missing: String },
}

/// Text and commands the host runs when a quest starts
#[derive(Debug, Clone, Serialize)]
pub struct QuestStart {
    pub participant: Uuid,
    pub quest_id: String,
    pub start_string: Vec<String>,
    pub start_commands: Vec<String>,
}

/// Apply one domain event to every relevant progress record
pub fn apply_event(
    event: &QuestEvent,
    manager: &QuestManager,
    task_types: &mut TaskTypeRegistry,
    store: &mut ProgressStore,
    now: DateTime<Utc>,
) -> EventOutcome {
    let mut outcome = EventOutcome::default();
    let mut touched: Vec<(Uuid, String)> = Vec::new();

    for entry in task_types.entries_mut() {
        let type_tag = entry.task_type.type_tag();
        let Some(trigger) = entry.task_type.observe(event) else {
            continue;
        };
        let Some(file) = store.get_mut(&trigger.participant) else {
            debug!("{} event for {} who has no loaded progress", event.event_type(), trigger.participant);
            continue;
        };

        for quest_id in &entry.quest_ids {
            let Some(quest) = manager.get(quest_id) else {
                continue;
            };
            if !file.has_started(quest_id) {
                continue;
            }

            for task in quest.tasks_of_type(type_tag) {
                if !utils::validate_world(&trigger.world, task) {
                    continue;
                }
                let Some(target) = task.target() else {
                    continue;
                };

                let task_progress = file.quest_progress_mut(quest_id).task_progress_mut(&task.id);
                if task_progress.completed {
                    continue;
                }

                let increment = entry.task_type.increment(event, &quest, task);
                if increment == 0 {
                    continue;
                }

                let task_completed = task_progress.add_progress(increment, target);
                debug!(
                    "{}: {}/{} progress {}/{}",
                    trigger.participant,
                    quest_id,
                    task.id,
                    task_progress.value(),
                    target
                );

                outcome.updates.push(ProgressUpdate {
                    participant: trigger.participant,
                    quest_id: quest_id.clone(),
                    task_id: task.id.clone(),
                    progress: task_progress.value(),
                    target,
                    task_completed,
                });
                touched.push((trigger.participant, quest_id.clone()));
            }
        }
    }

    let mut seen = HashSet::new();
    for (participant, quest_id) in touched {
        if !seen.insert((participant, quest_id.clone())) {
            continue;
        }
        let (Some(file), Some(quest)) = (store.get_mut(&participant), manager.get(&quest_id)) else {
            continue;
        };
        if let Some(completion) = complete_if_ready(file, &quest, now) {
            outcome.completions.push(completion);
        }
    }

    outcome
}

/// Complete the quest if it is started and every task is done
pub fn complete_if_ready(
    file: &mut QuestProgressFile,
    quest: &Quest,
    now: DateTime<Utc>,
) -> Option<QuestCompletion> {
    let progress = file.quest_progress(&quest.id)?;
    if !progress.started || !progress.all_tasks_complete(quest) {
        return None;
    }
    Some(complete_quest(file, quest, now))
}

/// Finish the current cycle of a quest and reset its task progress
pub fn complete_quest(file: &mut QuestProgressFile, quest: &Quest, now: DateTime<Utc>) -> QuestCompletion {
    file.quest_progress_mut(&quest.id).complete(now);
    debug!("{} completed quest {}", file.participant, quest.id);
    QuestCompletion {
        participant: file.participant,
        quest_id: quest.id.clone(),
        rewards: quest.rewards.clone(),
        reward_string: quest.reward_string.clone(),
    }
}

/// Check whether a participant may start a quest right now
pub fn can_start_quest(
    file: &QuestProgressFile,
    manager: &QuestManager,
    quest_id: &str,
    now: DateTime<Utc>,
) -> Result<(), StartQuestError> {
    let quest = manager
        .get(quest_id)
        .ok_or_else(|| StartQuestError::UnknownQuest(quest_id.to_string()))?;

    if let Some(progress) = file.quest_progress(quest_id) {
        if progress.started {
            return Err(StartQuestError::AlreadyStarted(quest_id.to_string()));
        }
        if progress.completed_before && !quest.options.repeatable {
            return Err(StartQuestError::AlreadyCompleted(quest_id.to_string()));
        }
        if quest.options.cooldown_enabled && progress.completed_before {
            if let Some(completed_at) = progress.completed_at {
                let ready_at = completed_at + Duration::minutes(i64::from(quest.options.cooldown_minutes));
                if now < ready_at {
                    return Err(StartQuestError::OnCooldown {
                        quest_id: quest_id.to_string(),
                        remaining_secs: (ready_at - now).num_seconds(),
                    });
                }
            }
        }
    }

    if let Some(missing) = quest
        .requirements
        .iter()
        .find(|req| !file.has_completed_before(req))
    {
        return Err(StartQuestError::RequirementsNotMet {
            quest_id: quest_id.to_string(),
            missing: missing.clone(),
        });
    }

    Ok(())
}

/// Start a quest, beginning a fresh cycle
pub fn start_quest(
    file: &mut QuestProgressFile,
    manager: &QuestManager,
    quest_id: &str,
    now: DateTime<Utc>,
) -> Result<QuestStart, StartQuestError> {
    can_start_quest(file, manager, quest_id, now)?;
    let quest = manager
        .get(quest_id)
        .ok_or_else(|| StartQuestError::UnknownQuest(quest_id.to_string()))?;

    file.quest_progress_mut(quest_id).start(now);
    debug!("{} started quest {}", file.participant, quest_id);

    Ok(QuestStart {
        participant: file.participant,
        quest_id: quest_id.to_string(),
        start_string: quest.start_string.clone(),
        start_commands: quest.start_commands.clone(),
    })
}

/// Drop out of a started quest. Returns false if it was not started.
pub fn cancel_quest(file: &mut QuestProgressFile, quest_id: &str) -> bool {
    match file.quests.get_mut(quest_id) {
        Some(progress) if progress.started => {
            progress.cancel();
            true
        }
        _ => false,
    }
}

/// Start every autostart quest the participant is eligible for
pub fn start_autostart_quests(
    file: &mut QuestProgressFile,
    manager: &QuestManager,
    now: DateTime<Utc>,
) -> Vec<QuestStart> {
    manager
        .autostart_quests()
        .iter()
        .filter_map(|quest| match start_quest(file, manager, &quest.id, now) {
            Ok(start) => Some(start),
            Err(e) => {
                debug!("Not autostarting {} for {}: {}", quest.id, file.participant, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::definition::Task;
    use crate::quest::events::{BlockLocation, ItemStack};
    use toml::Value;

    fn task(id: &str, type_tag: &str, amount: i64) -> Task {
        let mut task = Task::new(id, type_tag);
        task.set_config_value("amount", Value::Integer(amount));
        task
    }

    fn crafting_task(id: &str, material: &str, amount: i64) -> Task {
        let mut task = task(id, "crafting", amount);
        task.set_config_value("item", Value::String(material.to_string()));
        task
    }

    struct Harness {
        manager: QuestManager,
        task_types: TaskTypeRegistry,
        store: ProgressStore,
        participant: Uuid,
    }

    impl Harness {
        fn new(quests: Vec<Quest>) -> Self {
            let mut manager = QuestManager::new();
            let mut task_types = TaskTypeRegistry::with_builtin_types();
            for quest in quests {
                task_types.register_quest_tasks(&quest);
                manager.register_quest(quest);
            }
            let mut store = ProgressStore::in_memory();
            let participant = Uuid::new_v4();
            store.load(participant).unwrap();
            Self {
                manager,
                task_types,
                store,
                participant,
            }
        }

        fn file(&mut self) -> &mut QuestProgressFile {
            self.store.get_mut(&self.participant).unwrap()
        }

        fn start(&mut self, quest_id: &str) -> Result<QuestStart, StartQuestError> {
            let participant = self.participant;
            let file = self.store.get_mut(&participant).unwrap();
            start_quest(file, &self.manager, quest_id, Utc::now())
        }

        fn craft(&mut self, material: &str, amount: u32) -> EventOutcome {
            let event = QuestEvent::ItemCrafted {
                participant: self.participant,
                world: "world".to_string(),
                item: ItemStack::of(material),
                amount,
            };
            apply_event(&event, &self.manager, &mut self.task_types, &mut self.store, Utc::now())
        }

        fn progress(&self, quest_id: &str, task_id: &str) -> Option<(Option<u32>, bool)> {
            self.store
                .get(&self.participant)?
                .quest_progress(quest_id)?
                .task_progress(task_id)
                .map(|p| (p.progress, p.completed))
        }
    }

    fn craft_quest(id: &str, tasks: Vec<Task>) -> Quest {
        let mut quest = Quest::new(id);
        for task in tasks {
            quest.register_task(task);
        }
        quest
    }

    #[test]
    fn test_progress_clamps_at_target() {
        let mut harness = Harness::new(vec![craft_quest(
            "sticks",
            vec![crafting_task("craft", "STICK", 5), crafting_task("other", "STONE", 1)],
        )]);
        harness.start("sticks").unwrap();

        let outcome = harness.craft("STICK", 2);
        assert_eq!(outcome.updates.len(), 1);
        assert_eq!(harness.progress("sticks", "craft"), Some((Some(2), false)));

        let outcome = harness.craft("STICK", 4);
        assert!(outcome.updates[0].task_completed);
        assert_eq!(outcome.updates[0].progress, 5);
        assert_eq!(harness.progress("sticks", "craft"), Some((Some(5), true)));

        // Completed tasks no longer change
        let outcome = harness.craft("STICK", 3);
        assert!(outcome.is_empty());
        assert_eq!(harness.progress("sticks", "craft"), Some((Some(5), true)));
    }

    #[test]
    fn test_unstarted_quest_ignored() {
        let mut harness = Harness::new(vec![craft_quest("sticks", vec![crafting_task("craft", "STICK", 5)])]);
        let outcome = harness.craft("STICK", 2);
        assert!(outcome.is_empty());
        assert_eq!(harness.progress("sticks", "craft"), None);
    }

    #[test]
    fn test_unknown_participant_is_noop() {
        let mut harness = Harness::new(vec![craft_quest("sticks", vec![crafting_task("craft", "STICK", 5)])]);
        harness.start("sticks").unwrap();
        let event = QuestEvent::ItemCrafted {
            participant: Uuid::new_v4(),
            world: "world".to_string(),
            item: ItemStack::of("STICK"),
            amount: 5,
        };
        let outcome = apply_event(&event, &harness.manager, &mut harness.task_types, &mut harness.store, Utc::now());
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_world_restriction() {
        let mut restricted = crafting_task("craft", "STICK", 5);
        restricted.set_config_value("worlds", Value::Array(vec![Value::String("nether".into())]));
        let mut harness = Harness::new(vec![craft_quest("sticks", vec![restricted])]);
        harness.start("sticks").unwrap();

        assert!(harness.craft("STICK", 2).is_empty());
    }

    #[test]
    fn test_quest_completes_when_all_tasks_done() {
        let mut quest = craft_quest("sticks", vec![crafting_task("craft", "STICK", 2)]);
        quest.rewards = vec!["give {player} diamond 1".to_string()];
        let mut harness = Harness::new(vec![quest]);
        harness.start("sticks").unwrap();

        let outcome = harness.craft("STICK", 2);
        assert_eq!(outcome.completions.len(), 1);
        assert_eq!(outcome.completions[0].rewards, vec!["give {player} diamond 1"]);

        let progress = harness.file().quest_progress("sticks").unwrap().clone();
        assert!(!progress.started);
        assert!(progress.completed_before);
        assert!(progress.tasks.is_empty());

        // Not repeatable
        assert_eq!(
            harness.start("sticks").unwrap_err(),
            StartQuestError::AlreadyCompleted("sticks".to_string())
        );
    }

    #[test]
    fn test_cooldown_blocks_restart() {
        let mut quest = craft_quest("sticks", vec![crafting_task("craft", "STICK", 1)]);
        quest.options.repeatable = true;
        quest.options.cooldown_enabled = true;
        quest.options.cooldown_minutes = 10;
        let mut harness = Harness::new(vec![quest]);
        harness.start("sticks").unwrap();
        harness.craft("STICK", 1);

        let participant = harness.participant;
        let file = harness.store.get_mut(&participant).unwrap();
        let later = Utc::now() + Duration::minutes(5);
        assert!(matches!(
            start_quest(file, &harness.manager, "sticks", later),
            Err(StartQuestError::OnCooldown { .. })
        ));

        let much_later = Utc::now() + Duration::minutes(11);
        assert!(start_quest(file, &harness.manager, "sticks", much_later).is_ok());
    }

    #[test]
    fn test_requirements_checked_on_start() {
        let first = craft_quest("first", vec![crafting_task("craft", "STICK", 1)]);
        let mut second = craft_quest("second", vec![crafting_task("craft", "STONE", 1)]);
        second.requirements = vec!["first".to_string()];
        let mut harness = Harness::new(vec![first, second]);

        assert!(matches!(
            harness.start("second"),
            Err(StartQuestError::RequirementsNotMet { .. })
        ));
        harness.start("first").unwrap();
        harness.craft("STICK", 1);
        assert!(harness.start("second").is_ok());
        assert_eq!(harness.start("second").unwrap_err(), StartQuestError::AlreadyStarted("second".to_string()));
        assert_eq!(harness.start("nope").unwrap_err(), StartQuestError::UnknownQuest("nope".to_string()));
    }

    #[test]
    fn test_brewing_event_credits_stand_opener() {
        let mut harness = Harness::new(vec![craft_quest("brew", vec![task("potions", "brewing", 4)])]);
        harness.start("brew").unwrap();

        let location = BlockLocation {
            world: "world".to_string(),
            x: 0,
            y: 70,
            z: 0,
        };
        let opened = QuestEvent::BrewingStandOpened {
            participant: harness.participant,
            location: location.clone(),
        };
        let brewed = QuestEvent::PotionBrewed {
            location,
            filled_slots: 3,
        };
        let now = Utc::now();
        apply_event(&opened, &harness.manager, &mut harness.task_types, &mut harness.store, now);
        apply_event(&brewed, &harness.manager, &mut harness.task_types, &mut harness.store, now);
        assert_eq!(harness.progress("brew", "potions"), Some((Some(3), false)));

        let outcome = apply_event(&brewed, &harness.manager, &mut harness.task_types, &mut harness.store, now);
        assert_eq!(outcome.updates[0].progress, 4);
        assert_eq!(outcome.completions.len(), 1);
    }

    #[test]
    fn test_autostart() {
        let mut auto = craft_quest("auto", vec![crafting_task("craft", "STICK", 1)]);
        auto.options.autostart = true;
        let manual = craft_quest("manual", vec![crafting_task("craft", "STICK", 1)]);
        let mut harness = Harness::new(vec![auto, manual]);

        let participant = harness.participant;
        let file = harness.store.get_mut(&participant).unwrap();
        let started = start_autostart_quests(file, &harness.manager, Utc::now());
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].quest_id, "auto");
        assert_eq!(harness.file().started_quests(), vec!["auto"]);
    }

    #[test]
    fn test_cancel_resets_progress() {
        let mut harness = Harness::new(vec![craft_quest("sticks", vec![crafting_task("craft", "STICK", 5)])]);
        harness.start("sticks").unwrap();
        harness.craft("STICK", 2);

        assert!(cancel_quest(harness.file(), "sticks"));
        assert!(!cancel_quest(harness.file(), "sticks"));
        assert_eq!(harness.progress("sticks", "craft"), None);
    }
}
