//! Quest Service
//!
//! Owns everything the server holds between requests: the operator config,
//! the quest catalog, the task-type registry, loaded participant progress and
//! the diagnostics of the last load pass. The HTTP layer and the hot-reload
//! loop only ever reach quest state through this type.

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, QuestsConfig};
use crate::progress::engine::{self, QuestStart, StartQuestError};
use crate::progress::state::QuestProgressFile;
use crate::progress::store::{ProgressStore, StoreError};
use crate::quest::events::{EventOutcome, QuestEvent};
use crate::quest::loader::QuestLoader;
use crate::quest::manager::QuestManager;
use crate::quest::problem::{Diagnostics, ProblemSeverity};
use crate::tasktype::TaskTypeRegistry;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("participant {0} has not joined")]
    NotJoined(Uuid),

    #[error("quest '{0}' is not started")]
    NotStarted(String),

    #[error(transparent)]
    Start(#[from] StartQuestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Number of (errors, warnings) in a diagnostics report
pub fn count_problems(diagnostics: &Diagnostics) -> (usize, usize) {
    diagnostics
        .values()
        .flatten()
        .fold((0, 0), |(errors, warnings), problem| match problem.severity {
            ProblemSeverity::Error => (errors + 1, warnings),
            ProblemSeverity::Warning => (errors, warnings + 1),
        })
}

pub struct QuestService {
    /// Re-read on every reload when set
    config_path: Option<PathBuf>,
    config: QuestsConfig,
    manager: QuestManager,
    task_types: TaskTypeRegistry,
    store: ProgressStore,
    diagnostics: Diagnostics,
}

impl QuestService {
    /// Create a service with the built-in task types. Nothing is loaded until
    /// [`QuestService::load`] is called.
    pub fn new(config: QuestsConfig) -> Self {
        let store = ProgressStore::new(&config.server.progress_dir);
        Self::with_store(config, store)
    }

    pub fn with_store(config: QuestsConfig, store: ProgressStore) -> Self {
        Self {
            config_path: None,
            config,
            manager: QuestManager::new(),
            task_types: TaskTypeRegistry::with_builtin_types(),
            store,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Read the operator config (defaults if the file is missing) and build
    /// a service around it
    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let config = QuestsConfig::load_or_default(path)?;
        let mut service = Self::new(config);
        service.config_path = Some(path.to_path_buf());
        Ok(service)
    }

    pub fn config(&self) -> &QuestsConfig {
        &self.config
    }

    pub fn manager(&self) -> &QuestManager {
        &self.manager
    }

    pub fn task_types(&self) -> &TaskTypeRegistry {
        &self.task_types
    }

    /// Problems reported by the last load pass
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn quests_dir(&self) -> &Path {
        &self.config.server.quests_dir
    }

    /// Run a load pass with the current config and signal every task type
    /// that the catalog is ready
    pub fn load(&mut self) -> &Diagnostics {
        let root = self.config.server.quests_dir.clone();
        let diagnostics = QuestLoader::new(&self.config, &mut self.manager, &mut self.task_types).load_quests(&root);
        self.task_types.ready();

        let (errors, warnings) = count_problems(&diagnostics);
        if errors > 0 || warnings > 0 {
            warn!(
                "Quest load reported {} error(s) and {} warning(s) across {} file(s)",
                errors,
                warnings,
                diagnostics.len()
            );
        }
        for (path, problems) in &diagnostics {
            for problem in problems {
                warn!("{}: {}", path, problem);
            }
        }

        self.diagnostics = diagnostics;
        &self.diagnostics
    }

    /// Re-read the config file (if any) and rebuild the catalog in place.
    /// A config that is missing or fails to load leaves the current catalog
    /// untouched.
    pub fn reload(&mut self) -> Result<&Diagnostics, ServiceError> {
        if let Some(path) = &self.config_path {
            let config = QuestsConfig::load(path)?;
            if config.server.progress_dir != self.config.server.progress_dir {
                warn!("progress-dir changes take effect on restart");
            }
            self.config = config;
        }
        info!("Reloading quests");
        Ok(self.load())
    }

    /// Feed a domain event through every task type
    pub fn handle_event(&mut self, event: &QuestEvent) -> EventOutcome {
        engine::apply_event(event, &self.manager, &mut self.task_types, &mut self.store, Utc::now())
    }

    /// Load the participant's progress and start any autostart quests
    pub fn join(&mut self, participant: Uuid) -> Result<Vec<QuestStart>, ServiceError> {
        let file = self.store.load(participant)?;
        let started = engine::start_autostart_quests(file, &self.manager, Utc::now());
        info!("Participant {} joined ({} quest(s) autostarted)", participant, started.len());
        Ok(started)
    }

    /// Save and unload the participant. Returns false if they were not loaded.
    pub fn leave(&mut self, participant: Uuid) -> Result<bool, ServiceError> {
        let unloaded = self.store.unload(&participant)?;
        self.task_types.forget_participant(participant);
        if unloaded.is_some() {
            info!("Participant {} left", participant);
        }
        Ok(unloaded.is_some())
    }

    pub fn progress(&self, participant: &Uuid) -> Option<&QuestProgressFile> {
        self.store.get(participant)
    }

    pub fn start_quest(&mut self, participant: Uuid, quest_id: &str) -> Result<QuestStart, ServiceError> {
        let file = self
            .store
            .get_mut(&participant)
            .ok_or(ServiceError::NotJoined(participant))?;
        Ok(engine::start_quest(file, &self.manager, quest_id, Utc::now())?)
    }

    pub fn cancel_quest(&mut self, participant: Uuid, quest_id: &str) -> Result<bool, ServiceError> {
        let file = self
            .store
            .get_mut(&participant)
            .ok_or(ServiceError::NotJoined(participant))?;
        Ok(engine::cancel_quest(file, quest_id))
    }

    pub fn save_all(&self) -> Result<usize, ServiceError> {
        Ok(self.store.save_all()?)
    }
}
