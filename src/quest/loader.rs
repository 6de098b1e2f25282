//! Quest Loader
//!
//! Loads the quest items, then walks the quest definition tree and turns
//! every `.toml` file into a registered quest. Each file goes through macro expansion, parsing,
//! validation and building on its own; a broken file only loses itself.
//! Requirements between quests are checked in a second pass once every file
//! has been visited, so forward references resolve regardless of walk order.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use toml::Value;
use tracing::{debug, error, info, warn};

use super::definition::{Category, DisplayInfo, Quest, QuestOptions, Task};
use super::items::QUEST_ITEM_KEY;
use super::macros::expand_macros;
use super::manager::QuestManager;
use super::problem::{ConfigProblem, Diagnostics, has_blocking_error};
use super::tree::ConfigTree;
use super::validate::validate_quest;
use crate::config::{QuestMode, QuestsConfig, RawDisplay};
use crate::tasktype::TaskTypeRegistry;

const DEFAULT_COOLDOWN_MINUTES: u32 = 10;

static TASK_REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();

fn task_reference_regex() -> &'static Regex {
    TASK_REFERENCE_REGEX.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("task reference pattern is valid"))
}

/// A fault that stops one file from loading
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("panicked while loading {path:?}: {message}")]
    Panicked { path: PathBuf, message: String },
}

/// What a single file contributed to the load pass
#[derive(Debug, Default)]
struct FileOutcome {
    problems: Vec<ConfigProblem>,
    /// Requirements of the quest registered from this file, if one was
    requirements: Option<Vec<String>>,
}

/// Loads quests and categories into a [`QuestManager`] and registers their
/// tasks with the [`TaskTypeRegistry`].
pub struct QuestLoader<'a> {
    config: &'a QuestsConfig,
    manager: &'a mut QuestManager,
    task_types: &'a mut TaskTypeRegistry,
    macros: HashMap<String, String>,
}

impl<'a> QuestLoader<'a> {
    pub fn new(
        config: &'a QuestsConfig,
        manager: &'a mut QuestManager,
        task_types: &'a mut TaskTypeRegistry,
    ) -> Self {
        Self {
            macros: config.macro_table(),
            config,
            manager,
            task_types,
        }
    }

    /// Clear the manager and rebuild it from `root`. Returns the problems
    /// found, keyed by file path relative to `root`.
    pub fn load_quests(mut self, root: &Path) -> Diagnostics {
        self.manager.clear();
        self.task_types.reset();
        self.register_categories();
        self.manager.items_mut().load_from_directory(&self.config.server.items_dir);

        let mut diagnostics = Diagnostics::new();
        // Relative path -> that file's own requirements, for the requirement
        // pass. Keyed by file because two files may share a quest id.
        let mut loaded: Vec<(String, Vec<String>)> = Vec::new();

        info!("Loading quests from {:?}", root);

        if !root.exists() {
            warn!("Quest directory does not exist: {:?}", root);
        } else {
            let mut paths = Vec::new();
            collect_toml_files(root, &mut paths);

            for path in paths {
                let relative = relative_path(root, &path);
                match self.load_quest_file_guarded(&path) {
                    Ok(outcome) => {
                        if let Some(requirements) = outcome.requirements {
                            loaded.push((relative.clone(), requirements));
                        }
                        if !outcome.problems.is_empty() {
                            diagnostics.insert(relative, outcome.problems);
                        }
                    }
                    Err(e) => {
                        error!("An error occurred when attempting to load quest {:?} (will be ignored): {}", path, e);
                    }
                }
            }
        }

        info!("{} quests have been registered", self.manager.len());

        self.resolve_requirements(&loaded, &mut diagnostics);

        diagnostics
    }

    fn register_categories(&mut self) {
        for (id, raw) in self.config.categories() {
            let mut category = Category::new(id, raw.permission_required);
            category.display = display_from_raw(&raw.display);
            self.manager.register_category(category);
        }
        debug!("Registered {} categories", self.manager.categories().len());
    }

    /// Run one file behind a failure boundary so a misbehaving task type
    /// cannot take the whole walk down with it
    fn load_quest_file_guarded(&mut self, path: &Path) -> Result<FileOutcome, LoadError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.load_quest_file(path))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(LoadError::Panicked {
                    path: path.to_path_buf(),
                    message,
                })
            }
        }
    }

    fn load_quest_file(&mut self, path: &Path) -> Result<FileOutcome, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let processed = expand_macros(&content, &self.macros);

        let tree = match ConfigTree::parse(&processed) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                return Ok(FileOutcome {
                    problems: vec![ConfigProblem::malformed_input(e.message())],
                    requirements: None,
                });
            }
        };

        let id = quest_id_from_path(path);
        let mut problems = validate_quest(&id, &tree, self.task_types);
        self.check_quest_items(&tree, &mut problems);

        let blocked = has_blocking_error(&problems);
        if blocked && !self.config.options.error_checking.override_errors {
            return Ok(FileOutcome {
                problems,
                requirements: None,
            });
        }
        if blocked {
            warn!("Quest '{}' has errors but is being loaded anyway (override-errors is on)", id);
        }

        let quest = self.build_quest(&id, &tree, &mut problems);
        debug!("Loaded quest: {} ({} tasks)", quest.id, quest.tasks.len());

        let requirements = quest.requirements.clone();
        self.task_types.register_quest_tasks(&quest);
        self.manager.register_quest(quest);

        Ok(FileOutcome {
            problems,
            requirements: Some(requirements),
        })
    }

    /// Warn about task items that point at a quest item nobody defined
    fn check_quest_items(&self, tree: &ConfigTree, problems: &mut Vec<ConfigProblem>) {
        let Some(tasks) = tree.section("tasks") else {
            return;
        };
        for (task_id, entry) in tasks {
            let Some(item_id) = quest_item_reference(entry) else {
                continue;
            };
            if self.manager.items().get(item_id).is_none() {
                let location = format!("tasks.{}.item.{}", task_id, QUEST_ITEM_KEY);
                problems.push(ConfigProblem::unknown_quest_item(item_id, &location));
            }
        }
    }

    fn build_quest(&mut self, id: &str, tree: &ConfigTree, problems: &mut Vec<ConfigProblem>) -> Quest {
        let mut quest = Quest::new(id);

        quest.rewards = tree.get_string_list("rewards");
        quest.requirements = tree.get_string_list("options.requires");
        quest.reward_string = tree.get_string_list("rewardstring");
        quest.start_string = tree.get_string_list("startstring");
        quest.start_commands = tree.get_string_list("startcommands");
        quest.display = DisplayInfo {
            name: tree.get_str("display.name").map(str::to_string),
            lore_normal: tree.get_string_list("display.lore-normal"),
            lore_started: tree.get_string_list("display.lore-started"),
        };
        quest.options = QuestOptions {
            repeatable: tree.get_bool("options.repeatable", false),
            cooldown_enabled: tree.get_bool("options.cooldown.enabled", false),
            // Malformed values were reported during validation
            cooldown_minutes: u32::try_from(tree.get_int("options.cooldown.time", i64::from(DEFAULT_COOLDOWN_MINUTES)))
                .unwrap_or(DEFAULT_COOLDOWN_MINUTES),
            permission_required: tree.get_bool("options.permission-required", false),
            autostart: tree.get_bool("options.autostart", false),
            sort_order: tree.get_int("options.sort-order", 1),
        };

        if self.config.options.quest_mode == QuestMode::Daily {
            quest.options.repeatable = true;
            quest.options.cooldown_enabled = true;
            quest.options.cooldown_minutes = 0;
            quest.options.permission_required = false;
            quest.requirements.clear();
        }

        if let Some(category_id) = tree.get_str("options.category").filter(|c| !c.is_empty()) {
            match self.manager.category_mut(category_id) {
                Some(category) => {
                    category.register_quest_id(id);
                    quest.category = Some(category_id.to_string());
                }
                None => problems.push(ConfigProblem::unknown_category(category_id)),
            }
        }

        if let Some(tasks) = tree.section("tasks") {
            for (task_id, entry) in tasks {
                let Value::Table(section) = entry else {
                    continue;
                };
                let Some(type_tag) = section.get("type").and_then(Value::as_str) else {
                    continue;
                };

                let mut task = Task::new(task_id, type_tag);
                for (key, value) in section {
                    task.set_config_value(key, value.clone());
                }
                if let Some(item) = quest_item_reference(entry).and_then(|id| self.manager.items().get(id)) {
                    task.set_config_value("item", Value::Table(item.item.to_section()));
                }
                self.apply_global_defaults(&mut task);
                quest.register_task(task);
            }
        }

        for line in &quest.display.lore_normal {
            find_invalid_task_references(&quest, line, problems, "display.lore-normal");
        }
        for line in &quest.display.lore_started {
            find_invalid_task_references(&quest, line, problems, "display.lore-started");
        }

        if let Some(placeholders) = tree.section("placeholders") {
            for (key, value) in placeholders {
                let Some(text) = scalar_text(value) else {
                    continue;
                };
                find_invalid_task_references(&quest, &text, problems, &format!("placeholders.{}", key));
                quest.placeholders.insert(key.clone(), text);
            }
        }

        quest
    }

    /// Merge `global-task-configuration.types.<type>` into a task.
    ///
    /// With `global-task-configuration-override` off the global value always
    /// replaces the task's own value. With it on, globals only fill keys the
    /// task left unset.
    fn apply_global_defaults(&self, task: &mut Task) {
        let Some(defaults) = self.config.global_task_defaults(&task.type_tag) else {
            return;
        };
        let task_wins = self.config.options.global_task_configuration_override;
        for (key, value) in defaults {
            if task_wins && task.config_value(key).is_some() {
                continue;
            }
            task.set_config_value(key, value.clone());
        }
    }

    /// Second pass: every requirement must name a registered quest
    fn resolve_requirements(&self, loaded: &[(String, Vec<String>)], diagnostics: &mut Diagnostics) {
        for (relative, requirements) in loaded {
            let problems: Vec<ConfigProblem> = requirements
                .iter()
                .filter(|req| !self.manager.contains(req))
                .map(|req| ConfigProblem::unknown_requirement(req))
                .collect();

            if !problems.is_empty() {
                diagnostics.entry(relative.clone()).or_default().extend(problems);
            }
        }
    }
}

/// Convenience wrapper around [`QuestLoader`]
pub fn load_quests(
    root: &Path,
    config: &QuestsConfig,
    manager: &mut QuestManager,
    task_types: &mut TaskTypeRegistry,
) -> Diagnostics {
    QuestLoader::new(config, manager, task_types).load_quests(root)
}

/// Recursively collect `.toml` files in sorted order. Unreadable directories
/// are logged and skipped.
pub(crate) fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to read directory {:?}: {}", dir, e);
            return;
        }
    };

    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Failed to read entry in {:?}: {}", dir, e);
                None
            }
        })
        .collect();
    children.sort();

    for path in children {
        if path.is_dir() {
            collect_toml_files(&path, paths);
        } else if is_toml_file(&path) {
            paths.push(path);
        }
    }
}

fn is_toml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// `tasks.<id>.item.quest-item` of a task entry
fn quest_item_reference(entry: &Value) -> Option<&str> {
    entry
        .get("item")
        .and_then(Value::as_table)
        .and_then(|item| item.get(QUEST_ITEM_KEY))
        .and_then(Value::as_str)
}

fn quest_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path relative to the quests root, with forward slashes
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn display_from_raw(raw: &RawDisplay) -> DisplayInfo {
    DisplayInfo {
        name: raw.name.clone(),
        lore_normal: raw.lore_normal.clone(),
        lore_started: raw.lore_started.clone(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => Some(value.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

/// Warn about `{task}` / `{task:arg}` references to tasks the quest lacks
fn find_invalid_task_references(quest: &Quest, text: &str, problems: &mut Vec<ConfigProblem>, location: &str) {
    for caps in task_reference_regex().captures_iter(text) {
        let task_id = caps[1].split(':').next().unwrap_or_default();
        if !quest.has_task(task_id) {
            problems.push(ConfigProblem::unknown_task_reference(task_id, location));
        }
    }
}
