//! Operator configuration
//!
//! Read from `config.toml`. Every section is optional:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:2568"
//! quests-dir = "data/quests"
//! items-dir = "data/items"
//! progress-dir = "data/progress"
//! watch = true
//!
//! [options]
//! quest-mode = "normal"
//! global-task-configuration-override = false
//!
//! [options.error-checking]
//! override-errors = false
//!
//! [global-macros]
//! overworld = "[\"world\"]"
//!
//! [global-task-configuration.types.crafting]
//! worlds = ["world"]
//!
//! [categories.mining]
//! permission-required = false
//! display.name = "Mining"
//! ```
//!
//! Categories may live in a standalone `categories.toml` next to the config
//! file instead, under the same `[categories]` table.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub bind: String,
    pub quests_dir: PathBuf,
    /// Quest item definitions referenced by `quest-item`
    pub items_dir: PathBuf,
    pub progress_dir: PathBuf,
    /// Reload quests when definition files change
    pub watch: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:2568".to_string(),
            quests_dir: PathBuf::from("data/quests"),
            items_dir: PathBuf::from("data/items"),
            progress_dir: PathBuf::from("data/progress"),
            watch: false,
        }
    }
}

/// Controls how quest options are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestMode {
    #[default]
    Normal,
    /// Every quest is repeatable with no cooldown, requirements or permission
    Daily,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ErrorChecking {
    /// Register quests even if they have ERROR problems
    pub override_errors: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OptionsConfig {
    pub quest_mode: QuestMode,
    /// When on, global task defaults only fill keys a task left unset
    pub global_task_configuration_override: bool,
    pub error_checking: ErrorChecking,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GlobalTaskConfiguration {
    /// Task type tag -> default key/values
    pub types: HashMap<String, Table>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawDisplay {
    pub name: Option<String>,
    pub lore_normal: Vec<String>,
    pub lore_started: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawCategory {
    pub display: RawDisplay,
    pub permission_required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CategoriesFile {
    categories: BTreeMap<String, RawCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QuestsConfig {
    pub server: ServerConfig,
    pub options: OptionsConfig,
    pub global_macros: HashMap<String, Value>,
    pub global_task_configuration: GlobalTaskConfiguration,
    /// `None` when the config file has no `[categories]` table
    pub categories: Option<BTreeMap<String, RawCategory>>,
}

impl QuestsConfig {
    /// Parse config text without touching the filesystem
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load the config file and, if it has no categories, the sibling
    /// `categories.toml`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.categories.is_none() {
            let categories_path = path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("categories.toml");
            config.categories = Some(load_categories_file(&categories_path)?);
        }

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the config file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file does not exist: {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Macro name -> replacement text. Non-scalar values are ignored.
    pub fn macro_table(&self) -> HashMap<String, String> {
        self.global_macros
            .iter()
            .filter_map(|(name, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => {
                        value.to_string()
                    }
                    Value::Array(_) | Value::Table(_) => {
                        warn!("Macro '{}' is not a scalar value, ignoring", name);
                        return None;
                    }
                };
                Some((name.clone(), text))
            })
            .collect()
    }

    pub fn global_task_defaults(&self, type_tag: &str) -> Option<&Table> {
        self.global_task_configuration.types.get(type_tag)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&String, &RawCategory)> {
        self.categories.iter().flatten()
    }
}

fn load_categories_file(path: &Path) -> Result<BTreeMap<String, RawCategory>, ConfigError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: CategoriesFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file.categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = QuestsConfig::from_toml("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:2568");
        assert_eq!(config.options.quest_mode, QuestMode::Normal);
        assert!(!config.options.error_checking.override_errors);
        assert!(config.categories.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = QuestsConfig::from_toml(
            r#"
[options]
quest-mode = "daily"
global-task-configuration-override = true

[options.error-checking]
override-errors = true

[global-macros]
world = "\"survival\""
amount = 5
nested = { a = 1 }

[global-task-configuration.types.crafting]
worlds = ["world"]

[categories.mining]
permission-required = true
display.name = "Mining"
"#,
        )
        .unwrap();

        assert_eq!(config.options.quest_mode, QuestMode::Daily);
        assert!(config.options.global_task_configuration_override);
        assert!(config.options.error_checking.override_errors);

        let macros = config.macro_table();
        assert_eq!(macros.get("world").map(String::as_str), Some("\"survival\""));
        assert_eq!(macros.get("amount").map(String::as_str), Some("5"));
        assert!(!macros.contains_key("nested"));

        assert!(config.global_task_defaults("crafting").unwrap().contains_key("worlds"));
        let (id, category) = config.categories().next().unwrap();
        assert_eq!(id, "mining");
        assert!(category.permission_required);
        assert_eq!(category.display.name.as_deref(), Some("Mining"));
    }

    #[test]
    fn test_standalone_categories_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[server]\nwatch = true\n").unwrap();
        std::fs::write(
            temp_dir.path().join("categories.toml"),
            "[categories.farming]\npermission-required = false\n",
        )
        .unwrap();

        let config = QuestsConfig::load(&config_path).unwrap();
        assert!(config.server.watch);
        let ids: Vec<&String> = config.categories().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["farming"]);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = QuestsConfig::load_or_default(&temp_dir.path().join("nope.toml")).unwrap();
        assert!(config.categories().next().is_none());
    }
}
