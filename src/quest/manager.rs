//! Quest Manager
//!
//! Owns every registered quest, category and quest item. Cleared and rebuilt
//! by the loader on each reload.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::definition::{Category, Quest};
use super::items::QuestItemRegistry;

/// Registry for all quest and category definitions
#[derive(Debug, Default)]
pub struct QuestManager {
    quests: HashMap<String, Arc<Quest>>,
    categories: HashMap<String, Category>,
    items: QuestItemRegistry,
}

impl QuestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every quest, category and quest item
    pub fn clear(&mut self) {
        self.quests.clear();
        self.categories.clear();
        self.items.clear();
    }

    /// Register a quest. A quest with the same id is replaced and dropped from
    /// the category it was listed under.
    pub fn register_quest(&mut self, quest: Quest) {
        if let Some(previous) = self.quests.get(&quest.id) {
            warn!("Duplicate quest ID '{}', overwriting", quest.id);
            if previous.category != quest.category {
                if let Some(category) = previous.category.as_deref().and_then(|id| self.categories.get_mut(id)) {
                    category.quest_ids.retain(|id| id != &quest.id);
                }
            }
        }
        self.quests.insert(quest.id.clone(), Arc::new(quest));
    }

    pub fn register_category(&mut self, category: Category) {
        self.categories.insert(category.id.clone(), category);
    }

    /// Get a quest by ID
    pub fn get(&self, quest_id: &str) -> Option<Arc<Quest>> {
        self.quests.get(quest_id).cloned()
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.quests.contains_key(quest_id)
    }

    /// All quests, ordered by sort order then id
    pub fn quests(&self) -> Vec<Arc<Quest>> {
        let mut quests: Vec<Arc<Quest>> = self.quests.values().cloned().collect();
        quests.sort_by(|a, b| {
            a.options
                .sort_order
                .cmp(&b.options.sort_order)
                .then_with(|| a.id.cmp(&b.id))
        });
        quests
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn category_mut(&mut self, id: &str) -> Option<&mut Category> {
        self.categories.get_mut(id)
    }

    /// All categories, ordered by id
    pub fn categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.categories.values().collect();
        categories.sort_by(|a, b| a.id.cmp(&b.id));
        categories
    }

    /// Quests listed under a category
    pub fn quests_in_category(&self, id: &str) -> Vec<Arc<Quest>> {
        self.category(id)
            .map(|c| c.quest_ids.iter().filter_map(|q| self.get(q)).collect())
            .unwrap_or_default()
    }

    /// Quests that start automatically for every participant
    pub fn autostart_quests(&self) -> Vec<Arc<Quest>> {
        self.quests()
            .into_iter()
            .filter(|q| q.options.autostart)
            .collect()
    }

    pub fn items(&self) -> &QuestItemRegistry {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut QuestItemRegistry {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}
