use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::indexer::CodeIndex;
use crate::languages::is_indexable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Removed,
}

/// A raw notification from the filesystem watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_dir: bool,
}

impl FileChange {
    #[must_use]
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modified,
            is_dir: false,
        }
    }

    #[must_use]
    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Removed,
            is_dir: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexOutcome {
    /// Keys reindexed: the changed file first, then its dependents.
    Reindexed(Vec<String>),
    Removed,
    /// Arrived within the debounce window of the last accepted change.
    Debounced,
    /// Directory, ignored location, or unsupported file type.
    Ignored,
    Failed(String),
}

/// Turns file notifications into index updates, one at a time.
#[derive(Debug)]
pub struct ReindexController {
    index: Arc<CodeIndex>,
    debounce: Duration,
    last_accepted: Option<Instant>,
    ignore_dirs: HashSet<String>,
}

impl ReindexController {
    #[must_use]
    pub fn new(index: Arc<CodeIndex>) -> Self {
        let config = index.config();
        let debounce = Duration::from_millis(config.debounce_ms);
        let ignore_dirs = config.ignore_dirs.iter().cloned().collect();
        Self {
            index,
            debounce,
            last_accepted: None,
            ignore_dirs,
        }
    }

    pub async fn handle(&mut self, change: FileChange) -> ReindexOutcome {
        if change.is_dir || self.is_ignored(&change.path) || !is_indexable(&change.path) {
            return ReindexOutcome::Ignored;
        }

        match change.kind {
            ChangeKind::Removed => match self.index.remove_file(&change.path).await {
                Ok(()) => ReindexOutcome::Removed,
                Err(e) => ReindexOutcome::Failed(e.to_string()),
            },
            ChangeKind::Modified => {
                let now = Instant::now();
                if self
                    .last_accepted
                    .is_some_and(|last| now.duration_since(last) < self.debounce)
                {
                    tracing::debug!(path = %change.path.display(), "change debounced");
                    return ReindexOutcome::Debounced;
                }
                self.last_accepted = Some(now);

                match self.index.reindex(&change.path).await {
                    Ok(keys) => ReindexOutcome::Reindexed(keys),
                    Err(e) => {
                        tracing::warn!(path = %change.path.display(), "reindex failed: {e}");
                        ReindexOutcome::Failed(e.to_string())
                    }
                }
            }
        }
    }

    /// Any directory component below the root that is hidden or on the
    /// ignore list.
    fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(self.index.root()).unwrap_or(path);
        let Some(parent) = relative.parent() else {
            return false;
        };
        parent.components().any(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|n| n.starts_with('.') || self.ignore_dirs.contains(n)),
            _ => false,
        })
    }
}

/// Recursive watch over the index root feeding a [`ReindexController`].
pub struct IndexWatcher {
    _handle: tokio::task::JoinHandle<()>,
}

impl IndexWatcher {
    /// # Errors
    ///
    /// Returns an error if the filesystem watcher cannot be initialized.
    pub fn start(root: &Path, mut controller: ReindexController) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<FileChange>(64);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("index watcher error: {e}");
                    return;
                }
            };
            for change in to_changes(&event) {
                let _ = tx.blocking_send(change);
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching for changes");

        let handle = tokio::spawn(async move {
            let _watcher = watcher;
            while let Some(change) = rx.recv().await {
                let path = change.path.clone();
                match controller.handle(change).await {
                    ReindexOutcome::Reindexed(keys) if keys.len() > 1 => {
                        tracing::info!(path = %path.display(), dependents = keys.len() - 1, "reindexed with dependents");
                    }
                    ReindexOutcome::Failed(e) => {
                        tracing::warn!(path = %path.display(), "change not applied: {e}");
                    }
                    _ => {}
                }
            }
        });

        Ok(Self { _handle: handle })
    }
}

fn to_changes(event: &notify::Event) -> Vec<FileChange> {
    let kind = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return Vec::new(),
    };
    let folder_removed = matches!(
        event.kind,
        EventKind::Remove(notify::event::RemoveKind::Folder)
    );
    event
        .paths
        .iter()
        .map(|path| FileChange {
            path: path.clone(),
            kind,
            is_dir: folder_removed || path.is_dir(),
        })
        .collect()
}
