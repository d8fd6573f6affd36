use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Follows the file behind the tracked document and reports writes to it.
///
/// The parent directory is watched so editors that save through a rename are
/// still seen.
pub struct DocumentWatcher {
    watcher: RecommendedWatcher,
    watched: Option<PathBuf>,
}

pub fn document_watcher() -> notify::Result<(DocumentWatcher, mpsc::UnboundedReceiver<PathBuf>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_write(&event.kind) => {
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
        Ok(_) => {}
        Err(err) => warn!(event = "watch_error", error = %err),
    })?;
    Ok((
        DocumentWatcher {
            watcher,
            watched: None,
        },
        rx,
    ))
}

fn is_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

impl DocumentWatcher {
    pub fn watched(&self) -> Option<&Path> {
        self.watched.as_deref()
    }

    /// Switches to `path`, or stops watching when `None`.
    pub fn follow(&mut self, path: Option<&Path>) {
        if self.watched.as_deref() == path {
            return;
        }
        if let Some(dir) = self.watched.take().as_deref().and_then(Path::parent) {
            if let Err(err) = self.watcher.unwatch(dir) {
                debug!(event = "unwatch_failed", error = %err);
            }
        }
        let Some(path) = path else {
            return;
        };
        let Some(dir) = path.parent().filter(|dir| dir.exists()) else {
            warn!(event = "watch_skipped", path = %path.display());
            return;
        };
        match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                debug!(event = "watching_document", path = %path.display());
                self.watched = Some(path.to_path_buf());
            }
            Err(err) => warn!(event = "watch_failed", path = %path.display(), error = %err),
        }
    }

    /// True when an event path refers to the followed file.
    pub fn matches(&self, event_path: &Path) -> bool {
        self.watched.as_deref() == Some(event_path)
    }
}
