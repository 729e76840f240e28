use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),

    #[error("Cannot watch {0}: not a file")]
    NotAFile(PathBuf),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

/// Watches a single document.
///
/// The parent directory is watched rather than the file itself: editors that
/// save by renaming a temporary file over the document would otherwise
/// detach the watch after the first save.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: UnboundedReceiver<notify::Result<Event>>,
    file_name: OsString,
}

impl FileWatcher {
    pub fn new(path: &Path) -> WatcherResult<Self> {
        let file_name = path
            .file_name()
            .filter(|_| path.is_file())
            .map(OsString::from)
            .ok_or_else(|| WatcherError::NotAFile(path.to_path_buf()))?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(&parent, RecursiveMode::NonRecursive)?;
        debug!(dir = %parent.display(), file = ?file_name, "Watching document");

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            file_name,
        })
    }

    /// Wait until the document has been written. Returns `None` once the
    /// underlying watcher stops.
    pub async fn changed(&mut self) -> Option<()> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) if self.touches_document(&event) => return Some(()),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "File watcher error"),
            }
        }
    }

    fn touches_document(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event
                .paths
                .iter()
                .any(|path| path.file_name() == Some(self.file_name.as_os_str()))
    }
}
