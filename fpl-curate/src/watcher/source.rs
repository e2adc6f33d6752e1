//! Filesystem event sources

use async_trait::async_trait;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Deepest path below the watched root that is reported: `<key>/<entry>`
pub const MAX_WATCH_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    Created,
    Modified,
    Removed,
}

/// One change below the curations root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FsEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Stream of filesystem events
#[async_trait]
pub trait FsEventSource: Send {
    /// Next event, or `None` once the source is closed
    async fn next_event(&mut self) -> Option<FsEvent>;
}

/// Number of components of `path` below `root`
pub fn depth_below(root: &Path, path: &Path) -> Option<usize> {
    path.strip_prefix(root).ok().map(|rel| rel.components().count())
}

/// Events from a recursive `notify` watcher on the curations root
///
/// Paths deeper than [`MAX_WATCH_DEPTH`] and watcher errors are dropped.
pub struct NotifyEventSource {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<FsEvent>,
}

impl NotifyEventSource {
    pub fn new(root: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let configured = root.to_path_buf();
        let roots = watch_roots(root);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    trace!("Discarding watcher error: {}", e);
                    return;
                }
            };
            for path in event.paths {
                let Some(path) = rebase_on_root(&roots, &configured, &path) else {
                    continue;
                };
                let depth = depth_below(&configured, &path).unwrap_or(0);
                if depth == 0 || depth > MAX_WATCH_DEPTH {
                    continue;
                }
                let Some(kind) = classify(&event.kind, &path) else {
                    continue;
                };
                // Receiver gone means the source was dropped
                let _ = tx.send(FsEvent { path, kind });
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        debug!(root = %root.display(), "Watching curations folder");
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }
}

#[async_trait]
impl FsEventSource for NotifyEventSource {
    async fn next_event(&mut self) -> Option<FsEvent> {
        self.rx.recv().await
    }
}

/// Root as given plus its canonical form, since some backends report
/// canonical paths
fn watch_roots(root: &Path) -> Vec<PathBuf> {
    let mut roots = vec![root.to_path_buf()];
    if let Ok(canonical) = std::fs::canonicalize(root) {
        if canonical != root {
            roots.push(canonical);
        }
    }
    roots
}

/// `path` re-expressed below `root`, whichever of `roots` it was reported
/// under
pub fn rebase_on_root(roots: &[PathBuf], root: &Path, path: &Path) -> Option<PathBuf> {
    roots
        .iter()
        .find_map(|r| path.strip_prefix(r).ok())
        .map(|relative| root.join(relative))
}

fn classify(kind: &EventKind, path: &Path) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Created),
        EventKind::Remove(_) => Some(FsEventKind::Removed),
        // Renames report both ends; whichever still exists was created
        EventKind::Modify(ModifyKind::Name(_)) => Some(if path.exists() {
            FsEventKind::Created
        } else {
            FsEventKind::Removed
        }),
        EventKind::Modify(_) => Some(FsEventKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// In-memory event source fed through a channel
pub struct ChannelEventSource {
    rx: mpsc::UnboundedReceiver<FsEvent>,
}

impl ChannelEventSource {
    pub fn channel() -> (mpsc::UnboundedSender<FsEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl FsEventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<FsEvent> {
        self.rx.recv().await
    }
}
