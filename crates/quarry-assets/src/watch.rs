//! Directory watching.
//!
//! Raw notifications are debounced by `notify-debouncer-full`, which also
//! pairs rename halves using file ids, then translated into [`FileChange`]s.

use std::path::PathBuf;

/// Kind of a file system change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Created,
    Deleted,
    /// Moved from [`FileChange::old_path`] to [`FileChange::path`].
    Renamed,
    Changed,
}

/// A change to a file or directory under the asset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub old_path: Option<PathBuf>,
    pub kind: FileChangeKind,
}

impl FileChange {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            kind: FileChangeKind::Created,
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            kind: FileChangeKind::Deleted,
        }
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            kind: FileChangeKind::Changed,
        }
    }

    pub fn renamed(old_path: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            old_path: Some(old_path.into()),
            kind: FileChangeKind::Renamed,
        }
    }
}

#[cfg(feature = "watch")]
pub(crate) use watcher::DirectoryWatcher;

#[cfg(feature = "watch")]
mod watcher {
    use std::path::Path;
    use std::time::Duration;

    use notify_debouncer_full::notify::event::{ModifyKind, RenameMode};
    use notify_debouncer_full::notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
    use notify_debouncer_full::{DebounceEventResult, Debouncer, FileIdMap, new_debouncer};

    use super::FileChange;
    use crate::error::AssetResult;

    /// Translate one debounced notification into file changes.
    pub fn translate(event: &Event) -> Vec<FileChange> {
        match event.kind {
            EventKind::Create(_) => event.paths.iter().map(FileChange::created).collect(),
            EventKind::Remove(_) => event.paths.iter().map(FileChange::deleted).collect(),
            EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
                (RenameMode::Both, [from, to]) => vec![FileChange::renamed(from, to)],
                (RenameMode::From, paths) => paths.iter().map(FileChange::deleted).collect(),
                (RenameMode::To, paths) => paths.iter().map(FileChange::created).collect(),
                // Unpaired or unknown halves: decide by what is on disk now.
                (_, paths) => paths.iter().map(|path| presence(path)).collect(),
            },
            EventKind::Modify(_) => event.paths.iter().map(FileChange::changed).collect(),
            EventKind::Any | EventKind::Other => event.paths.iter().map(|path| presence(path)).collect(),
            EventKind::Access(_) => Vec::new(),
        }
    }

    fn presence(path: &Path) -> FileChange {
        if path.exists() {
            FileChange::created(path)
        } else {
            FileChange::deleted(path)
        }
    }

    /// Recursive watcher over the asset root. Dropping it stops delivery.
    pub struct DirectoryWatcher {
        _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
    }

    impl DirectoryWatcher {
        pub fn new<F>(root: &Path, debounce: Duration, handler: F) -> AssetResult<Self>
        where
            F: Fn(FileChange) + Send + 'static,
        {
            let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events.iter() {
                        for change in translate(&event.event) {
                            tracing::trace!("File {:?}: {}", change.kind, change.path.display());
                            handler(change);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::error!("Directory watcher error: {}", error);
                    }
                }
            })?;

            debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
            debouncer.cache().add_root(root, RecursiveMode::Recursive);
            tracing::debug!("Watching directory for changes: {}", root.display());

            Ok(Self {
                _debouncer: debouncer,
            })
        }
    }
}

#[cfg(all(test, feature = "watch"))]
mod tests {
    use std::path::PathBuf;

    use notify_debouncer_full::notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
    use notify_debouncer_full::notify::{Event, EventKind};

    use super::watcher::translate;
    use super::*;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_translate_create_remove_modify() {
        assert_eq!(
            translate(&event(EventKind::Create(CreateKind::File), &["/r/a.wav"])),
            vec![FileChange::created("/r/a.wav")]
        );
        assert_eq!(
            translate(&event(EventKind::Remove(RemoveKind::Any), &["/r/a.wav"])),
            vec![FileChange::deleted("/r/a.wav")]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/r/a.wav"]
            )),
            vec![FileChange::changed("/r/a.wav")]
        );
    }

    #[test]
    fn test_translate_paired_rename() {
        let changes = translate(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/old.wav", "/r/new.wav"],
        ));
        assert_eq!(changes, vec![FileChange::renamed("/r/old.wav", "/r/new.wav")]);
        assert_eq!(changes[0].kind, FileChangeKind::Renamed);
    }

    #[test]
    fn test_translate_rename_halves() {
        assert_eq!(
            translate(&event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/r/a"])),
            vec![FileChange::deleted("/r/a")]
        );
        assert_eq!(
            translate(&event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/r/b"])),
            vec![FileChange::created("/r/b")]
        );
    }

    #[test]
    fn test_translate_unknown_rename_checks_disk() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("here.txt");
        std::fs::write(&present, b"x").unwrap();
        let absent = dir.path().join("gone.txt");

        let mut unknown = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)));
        unknown = unknown.add_path(present.clone()).add_path(absent.clone());
        assert_eq!(
            translate(&unknown),
            vec![FileChange::created(present), FileChange::deleted(absent)]
        );
    }

    #[test]
    fn test_access_ignored() {
        use notify_debouncer_full::notify::event::AccessKind;
        assert!(translate(&event(EventKind::Access(AccessKind::Any), &["/r/a"])).is_empty());
    }
}
