//! Applies settled filesystem events to the curation store
//!
//! Every handler re-reads the current disk state and replaces what the store
//! holds, so events arriving out of order across paths are harmless.

use super::debounce::DebounceQueue;
use super::source::{FsEvent, FsEventKind, FsEventSource};
use crate::meta::structured::serialize_structured_meta;
use crate::meta::{parse_meta, MetaFormat, ParsedMeta, STRUCTURED_META_FILENAME};
use crate::models::{ImageKind, ImageRecord};
use crate::services::content_indexer::{index_content_folder, CONTENT_FOLDER};
use crate::services::loader::{find_meta_file, is_expected_folder, CurationLoader};
use crate::state::{CurationAction, CurationStore};
use fpl_common::config::WatcherConfig;
use fpl_common::fs_utils::write_atomic_async;
use std::path::Path;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Keeps the store in step with the curations folder
#[derive(Clone)]
pub struct Reconciler {
    store: CurationStore,
    loader: CurationLoader,
}

impl Reconciler {
    pub fn new(store: CurationStore, loader: CurationLoader) -> Self {
        Self { store, loader }
    }

    fn root(&self) -> &Path {
        self.loader.curations_root()
    }

    /// Debounce events from `source` and handle them until it closes
    ///
    /// Whatever is still queued when the source closes is handled before
    /// returning.
    pub async fn run<S: FsEventSource>(&self, mut source: S, config: &WatcherConfig) {
        let mut queue = DebounceQueue::new(config.stability());
        let mut ticker = tokio::time::interval(config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(root = %self.root().display(), "Reconciler started");
        loop {
            tokio::select! {
                event = source.next_event() => match event {
                    Some(event) => queue.push(event, Instant::now()),
                    None => break,
                },
                _ = ticker.tick() => {
                    for event in queue.drain_ready(Instant::now()) {
                        self.handle(event).await;
                    }
                }
            }
        }

        for event in queue.drain_all() {
            self.handle(event).await;
        }
        info!("Reconciler stopped");
    }

    /// Handle one settled event
    pub async fn handle(&self, event: FsEvent) {
        let Ok(relative) = event.path.strip_prefix(self.root()) else {
            return;
        };
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        debug!(path = %event.path.display(), kind = ?event.kind, "Reconciling");
        match segments.as_slice() {
            [key] => self.handle_curation_folder(key, event.kind).await,
            [key, name] => self.handle_entry(key, name, &event.path, event.kind).await,
            _ => {}
        }
    }

    async fn handle_curation_folder(&self, key: &str, kind: FsEventKind) {
        match kind {
            FsEventKind::Removed => {
                if self.store.get(key).await.is_some() {
                    info!(key = %key, "Curation folder removed");
                    self.store
                        .dispatch(CurationAction::RemoveCuration { key: key.to_string() })
                        .await;
                }
            }
            FsEventKind::Created | FsEventKind::Modified => self.add_if_complete(key).await,
        }
    }

    /// Load a curation that is not in the store yet, once it has a meta file
    async fn add_if_complete(&self, key: &str) {
        if self.store.get(key).await.is_some() {
            return;
        }
        let folder = self.loader.folder_of(key);
        if find_meta_file(&folder).await.is_none() {
            return;
        }
        match self.loader.load_curation_folder(key).await {
            Ok(curation) => {
                info!(key = %key, "New curation folder");
                self.store.dispatch(CurationAction::AddCuration(curation)).await;
            }
            Err(e) => debug!(key = %key, "Curation folder vanished before loading: {}", e),
        }
    }

    async fn handle_entry(&self, key: &str, name: &str, path: &Path, kind: FsEventKind) {
        let Some(curation) = self.store.get(key).await else {
            if kind != FsEventKind::Removed {
                self.add_if_complete(key).await;
            }
            return;
        };

        if let Some(format) = MetaFormat::from_file_name(name) {
            match kind {
                FsEventKind::Removed => {
                    // Fall back to whichever meta file is left
                    if let Some(file) = find_meta_file(&self.loader.folder_of(key)).await {
                        self.handle_meta_file(key, &file.path, file.format).await;
                    }
                }
                _ => self.handle_meta_file(key, path, format).await,
            }
            return;
        }

        if let Some(image_kind) = ImageKind::from_file_name(name) {
            let previous = curation.image(image_kind);
            let image = match kind {
                FsEventKind::Removed => previous.removed(),
                _ => ImageRecord::reload(path, previous).await,
            };
            self.store
                .dispatch(CurationAction::set_image(key, image_kind, image))
                .await;
            return;
        }

        if name.eq_ignore_ascii_case(CONTENT_FOLDER) {
            let content = index_content_folder(path).await;
            self.store
                .dispatch(CurationAction::SetCurationContent {
                    key: key.to_string(),
                    content,
                })
                .await;
            return;
        }

        if is_expected_folder(name) {
            return;
        }

        match kind {
            FsEventKind::Removed => {
                self.store
                    .dispatch(CurationAction::RemoveUnusedDir {
                        key: key.to_string(),
                        dir: name.to_string(),
                    })
                    .await;
            }
            FsEventKind::Created | FsEventKind::Modified => {
                let is_dir = tokio::fs::metadata(path)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                if is_dir && find_meta_file(&self.loader.folder_of(key)).await.is_some() {
                    self.store
                        .dispatch(CurationAction::AddUnusedDir {
                            key: key.to_string(),
                            dir: name.to_string(),
                        })
                        .await;
                }
            }
        }
    }

    /// Re-read a meta file into the store
    ///
    /// A legacy file is migrated to the structured format when it parses;
    /// otherwise it is left alone and an empty structured file is created
    /// as an edit target. While a structured file exists, legacy files are
    /// ignored.
    async fn handle_meta_file(&self, key: &str, path: &Path, format: MetaFormat) {
        let folder = self.loader.folder_of(key);
        let structured_path = folder.join(STRUCTURED_META_FILENAME);

        if format == MetaFormat::Legacy {
            if let Some(file) = find_meta_file(&folder).await {
                if file.format == MetaFormat::Structured {
                    warn!(key = %key, "Ignoring legacy meta file next to a structured one");
                    return;
                }
            }
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), "Meta file unreadable, skipping: {}", e);
                return;
            }
        };

        let parsed = match parse_meta(format, &bytes) {
            Ok(parsed) => self.loader.with_defaults(parsed),
            Err(e) => {
                warn!(key = %key, path = %path.display(), "Failed to parse meta file: {}", e);
                let structured_exists = tokio::fs::try_exists(&structured_path).await.unwrap_or(false);
                if format == MetaFormat::Legacy && !structured_exists {
                    if let Err(e) = write_atomic_async(&structured_path, Vec::<u8>::new()).await {
                        warn!(key = %key, "Failed to create structured meta placeholder: {}", e);
                    }
                }
                return;
            }
        };

        if format == MetaFormat::Legacy {
            migrate_legacy(key, path, &structured_path, &parsed).await;
        }

        self.store
            .dispatch(CurationAction::SetCurationMeta {
                key: key.to_string(),
                parsed,
            })
            .await;
    }
}

/// Write `parsed` as the structured meta file and delete the legacy one
async fn migrate_legacy(
    key: &str,
    legacy_path: &Path,
    structured_path: &Path,
    parsed: &ParsedMeta,
) {
    let document = match serialize_structured_meta(&parsed.meta, &parsed.add_apps) {
        Ok(document) => document,
        Err(e) => {
            warn!(key = %key, "Failed to serialize migrated meta: {}", e);
            return;
        }
    };
    if let Err(e) = write_atomic_async(structured_path, document).await {
        warn!(key = %key, "Failed to write migrated meta: {}", e);
        return;
    }
    match tokio::fs::remove_file(legacy_path).await {
        Ok(()) => info!(key = %key, "Migrated legacy meta file"),
        Err(e) => warn!(key = %key, "Failed to remove legacy meta file: {}", e),
    }
}
