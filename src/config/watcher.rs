//! Route file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Raw file-system notifications, including watcher errors.
pub type FileEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// A watcher that reports changes to the route file.
///
/// The parent directory is watched rather than the file itself so that
/// editors replacing the file via rename keep triggering events.
pub struct ConfigWatcher {
    path: PathBuf,
    event_tx: mpsc::UnboundedSender<notify::Result<Event>>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for file-system events.
    pub fn new(path: &Path) -> (Self, FileEvents) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                event_tx,
            },
            event_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route file watcher started");
        Ok(watcher)
    }
}

/// True when `event` is a content change or (re)creation of `path`.
pub fn is_write_to(event: &Event, path: &Path) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    let name = path.file_name();
    event.paths.iter().any(|p| p == path || (name.is_some() && p.file_name() == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, EventKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_is_write_to() {
        let watched = Path::new("/home/u/.map.json");

        assert!(is_write_to(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/home/u/.map.json"),
            watched
        ));
        assert!(is_write_to(&event(EventKind::Create(CreateKind::File), "/home/u/.map.json"), watched));
        assert!(!is_write_to(&event(EventKind::Remove(RemoveKind::File), "/home/u/.map.json"), watched));
        assert!(!is_write_to(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/home/u/other.json"),
            watched
        ));
    }

    #[tokio::test]
    async fn test_reports_file_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, "{}").unwrap();

        let (watcher, mut events) = ConfigWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        std::fs::write(&path, r#"{"a": "https://example.com"}"#).unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(res) = events.recv().await {
                if let Ok(ev) = res {
                    if is_write_to(&ev, &path) {
                        return true;
                    }
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        assert!(seen, "no write event observed for {:?}", path);
    }
}
