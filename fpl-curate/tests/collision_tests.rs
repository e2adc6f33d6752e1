//! Content collision checks against the install folder

use fpl_common::events::{CurateEvent, EventBus};
use fpl_curate::models::{ContentEntry, Curation, SourceType};
use fpl_curate::services::{
    CollisionDetector, CollisionOutcome, InstallRootResolver, JoinedInstallRoot,
};
use fpl_curate::state::{CurationAction, CurationStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn curation_with(key: &str, content: Vec<ContentEntry>) -> Curation {
    let mut curation = Curation::new(key, format!("/curations/{}", key), SourceType::Folder);
    curation.content = Arc::new(content);
    curation
}

#[tokio::test]
async fn test_existing_destinations_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("www.example.com")).unwrap();
    std::fs::write(dir.path().join("www.example.com/game.swf"), b"12345").unwrap();

    let store = CurationStore::new(EventBus::new(16));
    let detector = CollisionDetector::new(Arc::new(JoinedInstallRoot::new(dir.path())), store.clone());
    store
        .dispatch(CurationAction::AddCuration(curation_with(
            "k",
            vec![
                ContentEntry::folder("www.example.com"),
                ContentEntry::new("www.example.com/game.swf", 9),
                ContentEntry::new("www.example.com/new.swf", 3),
            ],
        )))
        .await;

    let CollisionOutcome::Applied(collisions) = detector.check("k").await else {
        panic!("check was not applied");
    };

    assert_eq!(collisions.len(), 3);
    assert!(collisions[0].exists && collisions[0].is_directory);
    assert!(collisions[1].exists);
    assert_eq!(collisions[1].size, 5);
    assert!(!collisions[2].exists);

    let cached = detector.collisions("k").await.unwrap();
    assert_eq!(cached.existing().count(), 2);
}

#[tokio::test]
async fn test_missing_curation() {
    let dir = TempDir::new().unwrap();
    let store = CurationStore::new(EventBus::new(16));
    let detector = CollisionDetector::new(Arc::new(JoinedInstallRoot::new(dir.path())), store);

    assert_eq!(detector.check("nope").await, CollisionOutcome::Missing);
}

#[tokio::test]
async fn test_listener_checks_new_and_changed_content() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let store = CurationStore::new(bus);
    let detector = CollisionDetector::new(Arc::new(JoinedInstallRoot::new(dir.path())), store.clone());
    let listener = detector.spawn_listener();

    store
        .dispatch(CurationAction::AddCuration(curation_with(
            "k",
            vec![ContentEntry::new("a.txt", 1)],
        )))
        .await;

    let computed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(CurateEvent::CollisionsComputed { key, checked, existing, .. }) = rx.recv().await {
                return (key, checked, existing);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(computed, ("k".to_string(), 1, 1));

    store
        .dispatch(CurationAction::SetCurationContent {
            key: "k".to_string(),
            content: vec![ContentEntry::new("a.txt", 1), ContentEntry::new("b.txt", 1)],
        })
        .await;

    let computed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(CurateEvent::CollisionsComputed { checked, existing, .. }) = rx.recv().await {
                return (checked, existing);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(computed, (2, 1));

    store.dispatch(CurationAction::RemoveCuration { key: "k".to_string() }).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while detector.collisions("k").await.is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    listener.abort();
}

#[tokio::test]
async fn test_outdated_sweep_checks_only_changed_manifests() {
    let dir = TempDir::new().unwrap();
    let store = CurationStore::new(EventBus::new(16));
    let detector = CollisionDetector::new(Arc::new(JoinedInstallRoot::new(dir.path())), store.clone());
    for key in ["a", "b"] {
        store
            .dispatch(CurationAction::AddCuration(curation_with(
                key,
                vec![ContentEntry::new("a.txt", 1)],
            )))
            .await;
    }

    assert_eq!(detector.check_outdated().await, vec!["a", "b"]);
    assert!(detector.check_outdated().await.is_empty());

    store
        .dispatch(CurationAction::SetCurationContent {
            key: "b".to_string(),
            content: vec![ContentEntry::new("b.txt", 1)],
        })
        .await;
    assert_eq!(detector.check_outdated().await, vec!["b"]);

    store.dispatch(CurationAction::RemoveCuration { key: "a".to_string() }).await;
    assert!(detector.check_outdated().await.is_empty());
    assert!(detector.collisions("a").await.is_none());
}

#[tokio::test]
async fn test_listener_recovers_from_missed_events() {
    let dir = TempDir::new().unwrap();
    let store = CurationStore::new(EventBus::new(2));
    let detector = CollisionDetector::new(Arc::new(JoinedInstallRoot::new(dir.path())), store.clone());
    let listener = detector.spawn_listener();

    // More additions than the bus holds before the listener gets to run
    for key in ["k", "x", "y", "z"] {
        store
            .dispatch(CurationAction::AddCuration(curation_with(
                key,
                vec![ContentEntry::new("a.txt", 1)],
            )))
            .await;
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        for key in ["k", "x", "y", "z"] {
            while detector.collisions(key).await.is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    })
    .await
    .unwrap();

    listener.abort();
}

/// Replaces the curation's manifest the first time it is asked to resolve
struct RacingResolver {
    inner: JoinedInstallRoot,
    store: CurationStore,
    raced: AtomicBool,
}

impl InstallRootResolver for RacingResolver {
    fn resolve(&self, relative_path: &str) -> PathBuf {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let store = self.store.clone();
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(store.dispatch(
                    CurationAction::SetCurationContent {
                        key: "k".to_string(),
                        content: vec![ContentEntry::new("replaced.txt", 1)],
                    },
                ))
            });
        }
        self.inner.resolve(relative_path)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_result_for_outdated_manifest_discarded() {
    let dir = TempDir::new().unwrap();
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let store = CurationStore::new(bus);
    store
        .dispatch(CurationAction::AddCuration(curation_with(
            "k",
            vec![ContentEntry::new("original.txt", 1)],
        )))
        .await;

    let resolver = RacingResolver {
        inner: JoinedInstallRoot::new(dir.path()),
        store: store.clone(),
        raced: AtomicBool::new(false),
    };
    let detector = CollisionDetector::new(Arc::new(resolver), store.clone());

    assert_eq!(detector.check("k").await, CollisionOutcome::Stale);
    assert!(detector.collisions("k").await.is_none());

    // A fresh check of the new manifest applies
    let CollisionOutcome::Applied(collisions) = detector.check("k").await else {
        panic!("second check was not applied");
    };
    assert_eq!(collisions[0].path, "replaced.txt");

    let mut computed = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, CurateEvent::CollisionsComputed { .. }) {
            computed += 1;
        }
    }
    assert_eq!(computed, 1);
}
