//! Progress Store
//!
//! Holds the progress files of participants that are currently loaded and
//! persists them as `<participant-uuid>.json` under the progress directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::QuestProgressFile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("progress file io error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid progress file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub struct ProgressStore {
    /// `None` keeps everything in memory
    dir: Option<PathBuf>,
    files: HashMap<Uuid, QuestProgressFile>,
}

impl ProgressStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: Some(dir.to_path_buf()),
            files: HashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            dir: None,
            files: HashMap::new(),
        }
    }

    fn path_for(&self, participant: &Uuid) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", participant)))
    }

    /// Load a participant's progress (or start an empty file) and keep it
    /// in memory. Already-loaded participants are returned as they are.
    pub fn load(&mut self, participant: Uuid) -> Result<&mut QuestProgressFile, StoreError> {
        if !self.files.contains_key(&participant) {
            let file = self.read(&participant)?;
            self.files.insert(participant, file);
        }
        Ok(self
            .files
            .entry(participant)
            .or_insert_with(|| QuestProgressFile::new(participant)))
    }

    fn read(&self, participant: &Uuid) -> Result<QuestProgressFile, StoreError> {
        let Some(path) = self.path_for(participant) else {
            return Ok(QuestProgressFile::new(*participant));
        };
        if !path.exists() {
            debug!("No progress file for {}, starting fresh", participant);
            return Ok(QuestProgressFile::new(*participant));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let mut file: QuestProgressFile =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
        if file.participant != *participant {
            warn!(
                "Progress file {:?} belongs to {}, reassigning to {}",
                path, file.participant, participant
            );
            file.participant = *participant;
        }
        Ok(file)
    }

    pub fn get(&self, participant: &Uuid) -> Option<&QuestProgressFile> {
        self.files.get(participant)
    }

    pub fn get_mut(&mut self, participant: &Uuid) -> Option<&mut QuestProgressFile> {
        self.files.get_mut(participant)
    }

    pub fn is_loaded(&self, participant: &Uuid) -> bool {
        self.files.contains_key(participant)
    }

    /// Write one participant's progress to disk
    pub fn save(&self, participant: &Uuid) -> Result<(), StoreError> {
        let (Some(file), Some(path)) = (self.files.get(participant), self.path_for(participant)) else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(file).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        // Write then rename so a crash never leaves a truncated file behind
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Save and forget a participant
    pub fn unload(&mut self, participant: &Uuid) -> Result<Option<QuestProgressFile>, StoreError> {
        self.save(participant)?;
        Ok(self.files.remove(participant))
    }

    /// Save every loaded participant. Stops at the first failure.
    pub fn save_all(&self) -> Result<usize, StoreError> {
        for participant in self.files.keys() {
            self.save(participant)?;
        }
        if self.dir.is_some() && !self.files.is_empty() {
            info!("Saved progress for {} participant(s)", self.files.len());
        }
        Ok(self.files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = ProgressStore::new(temp_dir.path());
        let id = Uuid::new_v4();

        let file = store.load(id).unwrap();
        assert_eq!(file.participant, id);
        assert!(file.quests.is_empty());
        assert!(store.is_loaded(&id));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();

        let mut store = ProgressStore::new(temp_dir.path());
        store.load(id).unwrap().quest_progress_mut("mining").start(Utc::now());
        let saved = store.unload(&id).unwrap().unwrap();
        assert!(!store.is_loaded(&id));
        assert!(temp_dir.path().join(format!("{}.json", id)).exists());

        let mut store = ProgressStore::new(temp_dir.path());
        let file = store.load(id).unwrap();
        assert_eq!(*file, saved);
        assert!(file.has_started("mining"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        std::fs::write(temp_dir.path().join(format!("{}.json", id)), "{ nope").unwrap();

        let mut store = ProgressStore::new(temp_dir.path());
        assert!(matches!(store.load(id), Err(StoreError::Json { .. })));
        assert!(!store.is_loaded(&id));
    }

    #[test]
    fn test_in_memory_store_never_touches_disk() {
        let mut store = ProgressStore::in_memory();
        let id = Uuid::new_v4();
        store.load(id).unwrap();
        assert_eq!(store.save_all().unwrap(), 1);
        assert!(store.unload(&id).unwrap().is_some());
    }
}
