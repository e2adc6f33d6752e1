//! Collision detection against the install root
//!
//! Each content entry is mapped to its destination under the install's
//! content-serving folder and stat'ed. Checks are not cancelled when the
//! content changes mid-flight; instead the manifest reference captured at
//! start is compared before the result is committed, and a stale result is
//! dropped.

use crate::models::ContentEntry;
use crate::state::CurationStore;
use fpl_common::events::CurateEvent;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Maps a content-relative path to an absolute path in the install
pub trait InstallRootResolver: Send + Sync {
    fn resolve(&self, relative_path: &str) -> PathBuf;
}

/// Resolves by joining the path segments onto a fixed root
#[derive(Debug, Clone)]
pub struct JoinedInstallRoot {
    root: PathBuf,
}

impl JoinedInstallRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl InstallRootResolver for JoinedInstallRoot {
    fn resolve(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

/// Collision status of one content entry (ephemeral)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentCollision {
    /// Content-relative path
    pub path: String,
    pub destination: PathBuf,
    pub exists: bool,
    pub size: u64,
    pub is_directory: bool,
}

/// Last applied check of a curation
#[derive(Debug, Clone)]
pub struct CollisionCheck {
    /// Manifest the check was computed from
    pub content: Arc<Vec<ContentEntry>>,
    pub collisions: Vec<ContentCollision>,
}

impl CollisionCheck {
    pub fn existing(&self) -> impl Iterator<Item = &ContentCollision> {
        self.collisions.iter().filter(|c| c.exists)
    }
}

/// What happened to a finished check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionOutcome {
    Applied(Vec<ContentCollision>),
    /// The manifest changed while the check ran; result dropped
    Stale,
    /// The curation left the working set
    Missing,
}

/// Computes and caches collisions per curation
#[derive(Clone)]
pub struct CollisionDetector {
    resolver: Arc<dyn InstallRootResolver>,
    store: CurationStore,
    results: Arc<RwLock<HashMap<String, CollisionCheck>>>,
}

impl CollisionDetector {
    pub fn new(resolver: Arc<dyn InstallRootResolver>, store: CurationStore) -> Self {
        Self {
            resolver,
            store,
            results: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stat every entry's destination
    ///
    /// Any stat failure (missing, permission denied, ...) reads as "does not
    /// exist".
    pub async fn check_entries(&self, entries: &[ContentEntry]) -> Vec<ContentCollision> {
        let mut collisions = Vec::with_capacity(entries.len());
        for entry in entries {
            let destination = self.resolver.resolve(&entry.path);
            let collision = match tokio::fs::metadata(&destination).await {
                Ok(metadata) => ContentCollision {
                    path: entry.path.clone(),
                    destination,
                    exists: true,
                    size: if metadata.is_dir() { 0 } else { metadata.len() },
                    is_directory: metadata.is_dir(),
                },
                Err(_) => ContentCollision {
                    path: entry.path.clone(),
                    destination,
                    exists: false,
                    size: 0,
                    is_directory: entry.is_directory(),
                },
            };
            collisions.push(collision);
        }
        collisions
    }

    /// Check the current manifest of `key` and commit the result if the
    /// manifest is still the same afterwards
    pub async fn check(&self, key: &str) -> CollisionOutcome {
        let Some(curation) = self.store.get(key).await else {
            return CollisionOutcome::Missing;
        };
        let content = Arc::clone(&curation.content);
        drop(curation);

        let collisions = self.check_entries(&content).await;

        match self.store.get(key).await {
            None => CollisionOutcome::Missing,
            Some(current) if !Arc::ptr_eq(&current.content, &content) => {
                debug!(key = %key, "Discarding stale collision check");
                CollisionOutcome::Stale
            }
            Some(_) => {
                let existing = collisions.iter().filter(|c| c.exists).count();
                self.results.write().await.insert(
                    key.to_string(),
                    CollisionCheck {
                        content,
                        collisions: collisions.clone(),
                    },
                );
                self.store.event_bus().emit_lossy(CurateEvent::CollisionsComputed {
                    key: key.to_string(),
                    checked: collisions.len(),
                    existing,
                    timestamp: chrono::Utc::now(),
                });
                CollisionOutcome::Applied(collisions)
            }
        }
    }

    /// Last applied check for `key`
    pub async fn collisions(&self, key: &str) -> Option<CollisionCheck> {
        self.results.read().await.get(key).cloned()
    }

    pub async fn forget(&self, key: &str) {
        self.results.write().await.remove(key);
    }

    /// Check every curation whose last applied check is missing or was
    /// computed from an older manifest
    ///
    /// Results of curations no longer in the working set are dropped.
    /// Returns the keys checked.
    pub async fn check_outdated(&self) -> Vec<String> {
        let snapshot = self.store.snapshot().await;
        let outdated: Vec<String> = {
            let mut results = self.results.write().await;
            results.retain(|key, _| snapshot.contains(key));
            snapshot
                .iter()
                .filter(|curation| {
                    results
                        .get(&curation.key)
                        .map_or(true, |check| !Arc::ptr_eq(&check.content, &curation.content))
                })
                .map(|curation| curation.key.clone())
                .collect()
        };

        for key in &outdated {
            self.check(key).await;
        }
        outdated
    }

    /// Re-check a curation every time its manifest changes
    ///
    /// Runs until the event bus closes. Missed events trigger a sweep of
    /// every outdated curation.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let detector = self.clone();
        let mut rx = self.store.event_bus().subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(CurateEvent::CurationAdded { key, .. })
                    | Ok(CurateEvent::ContentChanged { key, .. }) => {
                        let detector = detector.clone();
                        tokio::spawn(async move {
                            detector.check(&key).await;
                        });
                    }
                    Ok(CurateEvent::CurationRemoved { key, .. }) => detector.forget(&key).await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Collision listener lagged behind events, rechecking");
                        let detector = detector.clone();
                        tokio::spawn(async move {
                            detector.check_outdated().await;
                        });
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
