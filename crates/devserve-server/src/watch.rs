//! File watcher feeding the update dispatcher.
//!
//! Raw notify events are mapped one-to-one onto [`ChangeEvent`]s and
//! forwarded in observation order. Nothing is coalesced.

use devserve_core::hmr::{ChangeEvent, ChangeKind};
use devserve_util::path::has_component;
use notify::{
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Watcher error.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid watch root: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Watcher failed: {0}")]
    WatcherFailed(#[from] notify::Error),
}

/// Recursive watcher over the project root.
///
/// Dropping it stops watching and closes the event stream.
pub struct FileWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Start watching `root`, skipping paths with a component in `ignored`.
    pub fn start(
        root: &Path,
        ignored: Vec<String>,
        tx: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::InvalidRoot(root.to_path_buf()));
        }

        let event_root = root.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in map_event(&event_root, &event, &ignored) {
                        if tx.send(change).is_err() {
                            trace!("change receiver dropped");
                            return;
                        }
                    }
                }
                // Watch errors never stop the stream.
                Err(e) => error!(error = %e, "Watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "Watching directory");

        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching.
    pub fn stop(self) {
        info!(root = %self.root.display(), "File watcher stopped");
    }
}

/// Map one notify event onto change events.
///
/// Renames become a removal of the old path and an addition of the new one.
/// Directory events and metadata-only changes are dropped.
pub fn map_event(root: &Path, event: &Event, ignored: &[String]) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();
    let mut push = |path: &PathBuf, kind: ChangeKind| {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if has_component(relative, ignored) {
            return;
        }
        if kind != ChangeKind::Removed && path.is_dir() {
            return;
        }
        changes.push(ChangeEvent::new(path.clone(), kind));
    };

    match &event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other) => {
            event.paths.iter().for_each(|p| push(p, ChangeKind::Added));
        }
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
            event.paths.iter().for_each(|p| push(p, ChangeKind::Modified));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().for_each(|p| push(p, ChangeKind::Removed));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().for_each(|p| push(p, ChangeKind::Added));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to] = event.paths.as_slice() {
                push(from, ChangeKind::Removed);
                push(to, ChangeKind::Added);
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Platforms that don't pair renames: infer from what is on disk.
            for path in &event.paths {
                let kind = if path.exists() {
                    ChangeKind::Added
                } else {
                    ChangeKind::Removed
                };
                push(path, kind);
            }
        }
        EventKind::Remove(RemoveKind::File | RemoveKind::Any | RemoveKind::Other) => {
            event.paths.iter().for_each(|p| push(p, ChangeKind::Removed));
        }
        _ => debug!(kind = ?event.kind, "ignoring watch event"),
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;
    use std::fs;

    fn ignored() -> Vec<String> {
        vec!["node_modules".to_string(), ".git".to_string()]
    }

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(p.to_path_buf()))
    }

    #[test]
    fn test_maps_basic_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.js");
        fs::write(&file, "").unwrap();

        let created = map_event(
            dir.path(),
            &event(EventKind::Create(CreateKind::File), &[&file]),
            &ignored(),
        );
        assert_eq!(created, [ChangeEvent::new(&file, ChangeKind::Added)]);

        let modified = map_event(
            dir.path(),
            &event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &[&file],
            ),
            &ignored(),
        );
        assert_eq!(modified, [ChangeEvent::new(&file, ChangeKind::Modified)]);

        let removed = map_event(
            dir.path(),
            &event(EventKind::Remove(RemoveKind::File), &[&file]),
            &ignored(),
        );
        assert_eq!(removed, [ChangeEvent::new(&file, ChangeKind::Removed)]);
    }

    #[test]
    fn test_rename_both_is_remove_then_add() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("old.css");
        let to = dir.path().join("new.css");
        fs::write(&to, "").unwrap();

        let changes = map_event(
            dir.path(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[&from, &to],
            ),
            &ignored(),
        );
        assert_eq!(
            changes,
            [
                ChangeEvent::new(&from, ChangeKind::Removed),
                ChangeEvent::new(&to, ChangeKind::Added),
            ]
        );
    }

    #[test]
    fn test_ignored_components_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let dep = dir.path().join("node_modules/react/index.js");
        let git = dir.path().join(".git/HEAD");
        let kind = EventKind::Modify(ModifyKind::Data(DataChange::Any));

        assert!(map_event(dir.path(), &event(kind, &[&dep, &git]), &ignored()).is_empty());

        let dist = dir.path().join("dist/out.js");
        let extra = vec!["dist".to_string()];
        assert!(map_event(dir.path(), &event(kind, &[&dist]), &extra).is_empty());
    }

    #[test]
    fn test_directories_and_metadata_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("src");
        fs::create_dir(&sub).unwrap();

        let created_dir = event(EventKind::Create(CreateKind::Folder), &[&sub]);
        assert!(map_event(dir.path(), &created_dir, &ignored()).is_empty());

        let dir_as_any = event(EventKind::Create(CreateKind::Any), &[&sub]);
        assert!(map_event(dir.path(), &dir_as_any, &ignored()).is_empty());

        let file = dir.path().join("a.js");
        let metadata = event(
            EventKind::Modify(ModifyKind::Metadata(notify::event::MetadataKind::Any)),
            &[&file],
        );
        assert!(map_event(dir.path(), &metadata, &ignored()).is_empty());
    }

    #[test]
    fn test_start_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = FileWatcher::start(&dir.path().join("missing"), ignored(), tx).unwrap_err();
        assert!(matches!(err, WatchError::InvalidRoot(_)));
    }

    #[tokio::test]
    async fn test_stop_closes_event_stream() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let watcher = FileWatcher::start(&root, ignored(), tx).unwrap();
        watcher.stop();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let late = root.join("late.js");
        fs::write(&late, "export {}").unwrap();

        let drained = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let mut seen = Vec::new();
            while let Some(change) = rx.recv().await {
                seen.push(change);
            }
            seen
        })
        .await
        .expect("event stream stayed open after stop");
        assert!(drained.iter().all(|change| change.path != late));
    }
}
