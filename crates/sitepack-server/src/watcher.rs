//! File watching for live reload.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// Page template or partial was modified
    TemplateModified(PathBuf),

    /// Stylesheet was modified
    StyleModified(PathBuf),

    /// File was created
    Created(PathBuf),

    /// File was deleted
    Deleted(PathBuf),

    /// Any other modification
    Modified(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::TemplateModified(p)
            | WatchEvent::StyleModified(p)
            | WatchEvent::Created(p)
            | WatchEvent::Deleted(p)
            | WatchEvent::Modified(p) => p,
        }
    }
}

/// Decides which filesystem events matter and what kind they are.
#[derive(Debug, Clone, Default)]
pub struct WatchFilter {
    /// Template extensions, without the leading dot
    pub template_extensions: Vec<String>,

    /// Directories whose contents never trigger a rebuild
    pub ignored: Vec<PathBuf>,
}

impl WatchFilter {
    /// Whether changes to `path` should be ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if path
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
        {
            return true;
        }

        if self.ignored.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }

        // Editor swap and backup files
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        name.ends_with('~') || name.ends_with(".swp") || name.starts_with(".#")
    }

    /// Classify a notify event into a WatchEvent.
    pub fn classify(&self, path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
        use notify::EventKind;

        if self.is_ignored(path) {
            return None;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match kind {
            EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
            EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
            EventKind::Modify(_) => {
                if self.template_extensions.iter().any(|e| e == ext) {
                    Some(WatchEvent::TemplateModified(path.to_path_buf()))
                } else if matches!(ext, "css" | "scss" | "sass") {
                    Some(WatchEvent::StyleModified(path.to_path_buf()))
                } else {
                    Some(WatchEvent::Modified(path.to_path_buf()))
                }
            }
            _ => None,
        }
    }
}

fn push_events(batch: &mut Vec<WatchEvent>, filter: &WatchFilter, event: &notify::Event) {
    for path in &event.paths {
        if let Some(e) = filter.classify(path, &event.kind) {
            if !batch.contains(&e) {
                batch.push(e);
            }
        }
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel receiving one batch of events per
    /// burst of changes. Paths that do not exist are skipped.
    pub fn new(
        paths: &[PathBuf],
        filter: WatchFilter,
    ) -> Result<(Self, async_mpsc::Receiver<Vec<WatchEvent>>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
                tracing::debug!("Watching {}", path.display());
            }
        }

        std::thread::spawn(move || {
            let quiet = Duration::from_millis(100);

            while let Ok(event) = sync_rx.recv() {
                let mut batch = Vec::new();
                push_events(&mut batch, &filter, &event);

                // Debounce on the trailing edge: keep collecting until the
                // filesystem has been quiet for a full interval
                loop {
                    match sync_rx.recv_timeout(quiet) {
                        Ok(event) => push_events(&mut batch, &filter, &event),
                        Err(_) => break,
                    }
                }

                if batch.is_empty() {
                    continue;
                }

                if async_tx.blocking_send(batch).is_err() {
                    return;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}
