//! Per-path write-stability queue
//!
//! A path is released only after no new event arrived for it during the
//! stability window, so partially written files are never read. Events for
//! different paths are released independently and in no particular order.

use super::source::{FsEvent, FsEventKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct DebounceQueue {
    stability: Duration,
    pending: HashMap<PathBuf, (FsEventKind, Instant)>,
}

impl DebounceQueue {
    pub fn new(stability: Duration) -> Self {
        Self {
            stability,
            pending: HashMap::new(),
        }
    }

    /// Record an event; the latest kind for a path wins and restarts its timer
    pub fn push(&mut self, event: FsEvent, now: Instant) {
        self.pending.insert(event.path, (event.kind, now));
    }

    /// Remove and return every event that has been quiet for the window
    pub fn drain_ready(&mut self, now: Instant) -> Vec<FsEvent> {
        let stability = self.stability;
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| now.saturating_duration_since(*at) >= stability)
            .map(|(path, _)| path.clone())
            .collect();

        let mut events: Vec<FsEvent> = ready
            .into_iter()
            .filter_map(|path| {
                self.pending
                    .remove(&path)
                    .map(|(kind, _)| FsEvent { path, kind })
            })
            .collect();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        events
    }

    /// Release everything regardless of age
    pub fn drain_all(&mut self) -> Vec<FsEvent> {
        let mut events: Vec<FsEvent> = self
            .pending
            .drain()
            .map(|(path, (kind, _))| FsEvent { path, kind })
            .collect();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        events
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
