//! Hot Reload Watcher
//!
//! Watches the quest definition tree (and the operator config) and turns
//! changes to `.toml` files into reload requests. The watcher only signals;
//! the reload itself runs on the async side while holding the service lock.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Changes arriving within this window are folded into one reload
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// Keeps the underlying watcher alive and yields changed paths
pub struct QuestWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PathBuf>,
}

impl QuestWatcher {
    /// Start watching `quests_dir` recursively, plus `items_dir` and
    /// `config_path` if they exist
    pub fn start(
        quests_dir: &Path,
        items_dir: Option<&Path>,
        config_path: Option<&Path>,
    ) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel(16);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_reload_trigger(&event) {
                        return;
                    }
                    if let Some(path) = event.paths.first() {
                        // A full channel already has a reload pending
                        let _ = tx.try_send(path.clone());
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        watcher.watch(quests_dir, RecursiveMode::Recursive)?;
        if let Some(items_dir) = items_dir.filter(|p| p.exists()) {
            watcher.watch(items_dir, RecursiveMode::Recursive)?;
        }
        if let Some(config_path) = config_path.filter(|p| p.exists()) {
            watcher.watch(config_path, RecursiveMode::NonRecursive)?;
        }

        info!("Quest hot-reload watcher started for {:?}", quests_dir);
        Ok(Self { _watcher: watcher, rx })
    }

    /// Wait for the next change, then swallow anything that follows within
    /// [`DEBOUNCE`]. Returns `None` once the watcher is gone.
    pub async fn next_change(&mut self) -> Option<PathBuf> {
        let path = self.rx.recv().await?;
        tokio::time::sleep(DEBOUNCE).await;
        while let Ok(extra) = self.rx.try_recv() {
            debug!("Folding change to {:?} into pending reload", extra);
        }
        Some(path)
    }
}

/// Creates, edits and deletions of `.toml` files trigger a reload
pub fn is_reload_trigger(event: &Event) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant_kind
        && event.paths.iter().any(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use tempfile::TempDir;

    #[test]
    fn test_reload_trigger_filter() {
        let toml = PathBuf::from("quests/mining.toml");
        let other = PathBuf::from("quests/notes.txt");

        assert!(is_reload_trigger(&Event::new(EventKind::Create(CreateKind::File)).add_path(toml.clone())));
        assert!(is_reload_trigger(&Event::new(EventKind::Modify(ModifyKind::Any)).add_path(toml.clone())));
        assert!(is_reload_trigger(&Event::new(EventKind::Remove(RemoveKind::File)).add_path(toml.clone())));
        assert!(is_reload_trigger(
            &Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("quests/UPPER.TOML"))
        ));

        assert!(!is_reload_trigger(&Event::new(EventKind::Modify(ModifyKind::Any)).add_path(other)));
        assert!(!is_reload_trigger(&Event::new(EventKind::Access(AccessKind::Any)).add_path(toml)));
    }

    #[test]
    fn test_start_on_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(QuestWatcher::start(&missing, None, None).is_err());
    }
}
