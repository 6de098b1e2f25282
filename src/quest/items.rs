//! Quest Items
//!
//! Reusable item definitions loaded from the items directory, one `<id>.toml`
//! per item. Tasks refer to them with `item = { quest-item = "<id>" }`.
//!
//! ```toml
//! type = "defined"
//!
//! [item]
//! type = "DIAMOND_SWORD"
//! name = "Blade of Dawn"
//! lore = ["Forged at first light"]
//! ```
//!
//! `raw` items carry an item stack exactly as the host reports it
//! (`material`, `data`, `name`, `lore`); `defined` items use the same item
//! section format as task configs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::{Table, Value};
use tracing::{debug, info, warn};

use super::definition::Task;
use super::events::ItemStack;
use super::loader::collect_toml_files;
use super::tree::string_list;
use super::validate::is_valid_quest_id;
use crate::tasktype::utils;

/// Key of an item section that points at a registered quest item
pub const QUEST_ITEM_KEY: &str = "quest-item";

/// Item matcher built from a task's `item` config or a quest item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDescriptor {
    pub material: String,
    pub data: Option<i64>,
    pub name: Option<String>,
    pub lore: Vec<String>,
}

impl ItemDescriptor {
    /// Build from a task config. `data` at task level applies to a bare
    /// material. Unresolved `quest-item` references yield `None`.
    pub fn from_task(task: &Task) -> Option<Self> {
        match task.config_value("item")? {
            Value::String(material) => Some(Self {
                material: material.clone(),
                data: task.config_value("data").and_then(Value::as_integer),
                name: None,
                lore: Vec::new(),
            }),
            Value::Table(section) => Self::from_section(section),
            _ => None,
        }
    }

    /// Build from an item section (`type`, optional `data`, `name`, `lore`)
    pub fn from_section(section: &Table) -> Option<Self> {
        Some(Self {
            material: section.get("type")?.as_str()?.to_string(),
            data: section.get("data").and_then(Value::as_integer),
            name: section.get("name").and_then(Value::as_str).map(str::to_string),
            lore: section.get("lore").map(string_list).unwrap_or_default(),
        })
    }

    pub fn from_stack(stack: &ItemStack) -> Self {
        Self {
            material: stack.material.clone(),
            data: stack.data,
            name: stack.name.clone(),
            lore: stack.lore.clone(),
        }
    }

    /// Item section form, suitable for a task's `item` value
    pub fn to_section(&self) -> Table {
        let mut section = Table::new();
        section.insert("type".to_string(), Value::String(self.material.clone()));
        if let Some(data) = self.data {
            section.insert("data".to_string(), Value::Integer(data));
        }
        if let Some(name) = &self.name {
            section.insert("name".to_string(), Value::String(name.clone()));
        }
        if !self.lore.is_empty() {
            let lore = self.lore.iter().cloned().map(Value::String).collect();
            section.insert("lore".to_string(), Value::Array(lore));
        }
        section
    }

    pub fn matches(&self, item: &ItemStack) -> bool {
        if !self.material.eq_ignore_ascii_case(&item.material) {
            return false;
        }
        if self.data.is_some() && self.data != item.data {
            return false;
        }
        if self.name.is_some() && self.name != item.name {
            return false;
        }
        self.lore.is_empty() || self.lore == item.lore
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestItemKind {
    Raw,
    Defined,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestItem {
    pub id: String,
    pub kind: QuestItemKind,
    pub item: ItemDescriptor,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ItemFile {
    Raw { item: ItemStack },
    Defined { item: Table },
}

/// Why an item file was skipped
#[derive(Debug, Error)]
pub enum ItemLoadError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid item file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("item id '{0}' must be alphanumeric")]
    InvalidId(String),

    #[error("invalid item in {path:?}: {reason}")]
    InvalidItem { path: PathBuf, reason: String },
}

/// Registry of quest items keyed by id
#[derive(Debug, Default)]
pub struct QuestItemRegistry {
    items: HashMap<String, QuestItem>,
}

impl QuestItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn register_item(&mut self, item: QuestItem) {
        if self.items.contains_key(&item.id) {
            warn!("Duplicate quest item ID '{}', overwriting", item.id);
        }
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&QuestItem> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items, ordered by id
    pub fn items(&self) -> Vec<&QuestItem> {
        let mut items: Vec<&QuestItem> = self.items.values().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    /// Clear the registry and load every item file under `dir`. Broken files
    /// are logged and skipped.
    pub fn load_from_directory(&mut self, dir: &Path) -> usize {
        self.clear();

        if !dir.exists() {
            debug!("Quest item directory does not exist: {:?}", dir);
            return 0;
        }

        let mut paths = Vec::new();
        collect_toml_files(dir, &mut paths);
        for path in paths {
            match load_item_file(&path) {
                Ok(item) => self.register_item(item),
                Err(e) => warn!("Failed to load quest item (will be ignored): {}", e),
            }
        }

        info!("{} quest items have been registered", self.items.len());
        self.items.len()
    }
}

fn load_item_file(path: &Path) -> Result<QuestItem, ItemLoadError> {
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !is_valid_quest_id(&id) {
        return Err(ItemLoadError::InvalidId(id));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ItemLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ItemFile = toml::from_str(&content).map_err(|source| ItemLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let (kind, item) = match file {
        ItemFile::Raw { item } => (QuestItemKind::Raw, ItemDescriptor::from_stack(&item)),
        ItemFile::Defined { item } => {
            let mut problems = Vec::new();
            let value = Value::Table(item);
            utils::validate_item("item", Some(&value), &mut problems, false, "item");
            if let Some(problem) = problems.first() {
                return Err(ItemLoadError::InvalidItem {
                    path: path.to_path_buf(),
                    reason: problem.to_string(),
                });
            }
            let descriptor = value
                .as_table()
                .and_then(ItemDescriptor::from_section)
                .ok_or_else(|| ItemLoadError::InvalidItem {
                    path: path.to_path_buf(),
                    reason: "item section needs a material 'type'".to_string(),
                })?;
            (QuestItemKind::Defined, descriptor)
        }
    };

    Ok(QuestItem { id, kind, item })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_raw_and_defined_items() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "blade.toml",
            "type = \"defined\"\n[item]\ntype = \"DIAMOND_SWORD\"\nname = \"Blade of Dawn\"\n",
        );
        write(
            temp_dir.path(),
            "nested/relic.toml",
            "type = \"raw\"\n[item]\nmaterial = \"NETHER_STAR\"\nlore = [\"Old\"]\n",
        );

        let mut registry = QuestItemRegistry::new();
        assert_eq!(registry.load_from_directory(temp_dir.path()), 2);

        let blade = registry.get("blade").unwrap();
        assert_eq!(blade.kind, QuestItemKind::Defined);
        assert_eq!(blade.item.material, "DIAMOND_SWORD");
        assert_eq!(blade.item.name.as_deref(), Some("Blade of Dawn"));

        let relic = registry.get("relic").unwrap();
        assert_eq!(relic.kind, QuestItemKind::Raw);
        assert_eq!(relic.item.lore, vec!["Old"]);
    }

    #[test]
    fn test_bad_item_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "bad-id.toml", "type = \"raw\"\n[item]\nmaterial = \"STONE\"\n");
        write(temp_dir.path(), "plugin.toml", "type = \"mmoitems\"\n[item]\nid = \"x\"\n");
        write(temp_dir.path(), "broken.toml", "type = \"defined\"\n[item]\ntype = \"not a material\"\n");
        write(temp_dir.path(), "untyped.toml", "[item]\ntype = \"STONE\"\n");
        write(temp_dir.path(), "good.toml", "type = \"defined\"\n[item]\ntype = \"STONE\"\n");

        let mut registry = QuestItemRegistry::new();
        assert_eq!(registry.load_from_directory(temp_dir.path()), 1);
        assert!(registry.get("good").is_some());
    }

    #[test]
    fn test_reload_clears_previous_items() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "gem.toml", "type = \"defined\"\n[item]\ntype = \"EMERALD\"\n");
        let mut registry = QuestItemRegistry::new();
        registry.load_from_directory(temp_dir.path());
        assert_eq!(registry.len(), 1);

        std::fs::remove_file(temp_dir.path().join("gem.toml")).unwrap();
        registry.load_from_directory(temp_dir.path());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_descriptor_section_round_trip() {
        let descriptor = ItemDescriptor {
            material: "STONE".to_string(),
            data: Some(2),
            name: Some("Rock".to_string()),
            lore: vec!["heavy".to_string()],
        };
        assert_eq!(ItemDescriptor::from_section(&descriptor.to_section()), Some(descriptor));
    }

    #[test]
    fn test_unresolved_reference_has_no_descriptor() {
        let mut task = Task::new("craft", "crafting");
        let section: Table = toml::from_str("quest-item = \"blade\"").unwrap();
        task.set_config_value("item", Value::Table(section));
        assert!(ItemDescriptor::from_task(&task).is_none());
    }
}
