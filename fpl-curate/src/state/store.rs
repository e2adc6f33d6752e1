//! Shared curation store
//!
//! Holds the current [`CurationsState`] behind an async lock. Every dispatch
//! runs the pure reducer and, when the state actually changed, announces the
//! difference on the [`EventBus`].

use super::actions::CurationAction;
use super::reducer::{reduce, CurationsState};
use crate::models::Curation;
use fpl_common::events::{CurateEvent, EventBus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Outcome of [`CurationStore::try_lock`]
#[derive(Debug, Clone)]
pub enum TryLock {
    /// The curation is now locked; its locked record
    Acquired(Arc<Curation>),
    /// Someone else holds the lock
    Locked,
    Missing,
}

/// Cloneable handle to the working set
#[derive(Clone)]
pub struct CurationStore {
    state: Arc<RwLock<CurationsState>>,
    event_bus: EventBus,
}

impl CurationStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self::with_state(CurationsState::default(), event_bus)
    }

    pub fn with_state(state: CurationsState, event_bus: EventBus) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Current state (cheap: shares every record)
    pub async fn snapshot(&self) -> CurationsState {
        self.state.read().await.clone()
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Curation>> {
        self.state.read().await.get(key).cloned()
    }

    /// Reduce `action` into the current state and return the new state
    pub async fn dispatch(&self, action: CurationAction) -> CurationsState {
        let name = action.name();
        let key = action.target_key().map(str::to_string);

        let mut guard = self.state.write().await;
        let previous = guard.clone();
        let next = reduce(&previous, action);
        if next.same_as(&previous) {
            debug!(action = name, key = ?key, "Dispatch changed nothing");
            return next;
        }
        *guard = next.clone();
        drop(guard);

        debug!(action = name, key = ?key, "Dispatched");
        self.announce(&previous, &next);
        next
    }

    /// Lock `key` unless it is locked already
    ///
    /// Test and set happen under one write guard, so of two concurrent
    /// callers exactly one acquires the lock.
    pub async fn try_lock(&self, key: &str) -> TryLock {
        let mut guard = self.state.write().await;
        match guard.get(key) {
            None => return TryLock::Missing,
            Some(curation) if curation.locked => return TryLock::Locked,
            Some(_) => {}
        }

        let previous = guard.clone();
        let next = reduce(
            &previous,
            CurationAction::ChangeCurationLock {
                key: key.to_string(),
                locked: true,
            },
        );
        *guard = next.clone();
        drop(guard);

        debug!(key = %key, "Locked curation");
        self.announce(&previous, &next);
        match next.get(key) {
            Some(curation) => TryLock::Acquired(Arc::clone(curation)),
            None => TryLock::Missing,
        }
    }

    fn announce(&self, previous: &CurationsState, next: &CurationsState) {
        let timestamp = chrono::Utc::now();

        for curation in next.iter() {
            let key = curation.key.clone();
            match previous.get(&curation.key) {
                None => self.event_bus.emit_lossy(CurateEvent::CurationAdded { key, timestamp }),
                Some(old) if !Arc::ptr_eq(old, curation) => {
                    if !Arc::ptr_eq(&old.content, &curation.content) {
                        self.event_bus.emit_lossy(CurateEvent::ContentChanged {
                            key: key.clone(),
                            entries: curation.content.len(),
                            timestamp,
                        });
                    }
                    if details_changed(old, curation) {
                        self.event_bus
                            .emit_lossy(CurateEvent::CurationChanged { key, timestamp });
                    }
                }
                Some(_) => {}
            }
        }

        for old in previous.iter() {
            if !next.contains(&old.key) {
                self.event_bus.emit_lossy(CurateEvent::CurationRemoved {
                    key: old.key.clone(),
                    timestamp,
                });
            }
        }
    }
}

/// Anything besides the content manifest differs
fn details_changed(old: &Curation, new: &Curation) -> bool {
    !Arc::ptr_eq(&old.meta, &new.meta)
        || !Arc::ptr_eq(&old.add_apps, &new.add_apps)
        || !Arc::ptr_eq(&old.unused_dirs, &new.unused_dirs)
        || old.thumbnail != new.thumbnail
        || old.screenshot != new.screenshot
        || old.locked != new.locked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaField;
    use crate::models::{ContentEntry, SourceType};

    #[tokio::test]
    async fn test_dispatch_announces_changes() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let store = CurationStore::new(bus);

        store
            .dispatch(CurationAction::AddCuration(Curation::new(
                "k",
                "/tmp/k",
                SourceType::Folder,
            )))
            .await;
        assert!(matches!(rx.recv().await.unwrap(), CurateEvent::CurationAdded { key, .. } if key == "k"));

        store
            .dispatch(CurationAction::SetCurationContent {
                key: "k".to_string(),
                content: vec![ContentEntry::new("a.txt", 10)],
            })
            .await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            CurateEvent::ContentChanged { entries: 1, .. }
        ));

        store
            .dispatch(CurationAction::edit_meta("k", MetaField::Title, "Foo"))
            .await;
        assert!(matches!(rx.recv().await.unwrap(), CurateEvent::CurationChanged { .. }));

        store
            .dispatch(CurationAction::RemoveCuration { key: "k".to_string() })
            .await;
        assert!(matches!(rx.recv().await.unwrap(), CurateEvent::CurationRemoved { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_try_lock_has_one_winner() {
        let store = CurationStore::new(EventBus::new(64));
        store
            .dispatch(CurationAction::AddCuration(Curation::new(
                "k",
                "/tmp/k",
                SourceType::Folder,
            )))
            .await;

        let barrier = Arc::new(tokio::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (store, barrier) = (store.clone(), Arc::clone(&barrier));
                tokio::spawn(async move {
                    barrier.wait().await;
                    store.try_lock("k").await
                })
            })
            .collect();

        let mut acquired = 0;
        for handle in handles {
            match handle.await.unwrap() {
                TryLock::Acquired(curation) => {
                    assert!(curation.locked);
                    acquired += 1;
                }
                TryLock::Locked => {}
                TryLock::Missing => panic!("curation vanished"),
            }
        }
        assert_eq!(acquired, 1);
        assert!(matches!(store.try_lock("nope").await, TryLock::Missing));
    }

    #[tokio::test]
    async fn test_noop_dispatch_is_silent() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let store = CurationStore::new(bus);

        let state = store
            .dispatch(CurationAction::RemoveCuration { key: "missing".to_string() })
            .await;
        assert!(state.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
