//! Import and export orchestration
//!
//! Every operation locks its curation first, so the reducer refuses edits
//! while files are being written or handed to the content store. A failed
//! import unlocks the curation and re-reads its content folder, since the
//! content store may already have moved some of the files away.

use super::archive::ArchiveTool;
use super::content_indexer::{index_content_folder, CONTENT_FOLDER};
use super::loader::CurationLoader;
use super::warnings::{CurationWarnings, WarningContext};
use crate::error::{CurateError, CurateResult};
use crate::meta::structured::serialize_structured_meta;
use crate::meta::STRUCTURED_META_FILENAME;
use crate::models::Curation;
use crate::state::{CurationAction, CurationStore, TryLock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fpl_common::events::{CurateEvent, ImportProgress, ImportSummary};
use fpl_common::fs_utils::write_atomic_async;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// What the content store receives for one curation
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub curation: Arc<Curation>,
    /// Write an import log entry
    pub log: bool,
    /// Date recorded as the import date (now when absent)
    pub date: Option<DateTime<Utc>>,
    /// Keep a copy of the curation after importing
    pub save_curation: bool,
}

/// Structured refusal from the content store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct ImportRejection {
    pub error: String,
}

impl ImportRejection {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// The permanent content store
#[async_trait]
pub trait CurationImporter: Send + Sync {
    async fn import(&self, request: ImportRequest) -> Result<(), ImportRejection>;
}

/// Caller-chosen flags forwarded with each [`ImportRequest`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub log: bool,
    pub date: Option<DateTime<Utc>>,
    pub save_curation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another operation holds the lock
    Locked,
    NotFound,
}

/// Result of importing one curation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported,
    /// Rejected or not persisted; the curation is unlocked again
    Failed(String),
    Skipped(SkipReason),
}

/// Drives imports and exports of the working set
pub struct ImportPipeline {
    store: CurationStore,
    loader: CurationLoader,
    importer: Arc<dyn CurationImporter>,
    archive_tool: Arc<dyn ArchiveTool>,
    warnings: WarningContext,
}

impl ImportPipeline {
    pub fn new(
        store: CurationStore,
        loader: CurationLoader,
        importer: Arc<dyn CurationImporter>,
        archive_tool: Arc<dyn ArchiveTool>,
        warnings: WarningContext,
    ) -> Self {
        Self {
            store,
            loader,
            importer,
            archive_tool,
            warnings,
        }
    }

    /// Warnings for the current state of `key`
    ///
    /// The pipeline never acts on them; confirming an import with warnings
    /// is up to the caller.
    pub async fn warnings(&self, key: &str) -> CurateResult<CurationWarnings> {
        let curation = self
            .store
            .get(key)
            .await
            .ok_or_else(|| CurateError::NotFound(key.to_string()))?;
        Ok(self.warnings.generate(&curation).await)
    }

    /// Import one curation
    pub async fn import(&self, key: &str, options: ImportOptions) -> ImportOutcome {
        match self.store.try_lock(key).await {
            TryLock::Missing => return ImportOutcome::Skipped(SkipReason::NotFound),
            TryLock::Locked => {
                debug!(key = %key, "Curation is locked, not importing");
                return ImportOutcome::Skipped(SkipReason::Locked);
            }
            TryLock::Acquired(_) => {}
        }
        self.import_locked(key, options).await
    }

    /// Import every unlocked curation, one at a time
    ///
    /// All of them are locked up front; failures do not stop the batch, and
    /// whatever is left at the end is unlocked again.
    pub async fn import_all(&self, options: ImportOptions) -> ImportSummary {
        let snapshot = self.store.snapshot().await;
        let pending: Vec<String> = snapshot
            .iter()
            .filter(|c| !c.locked)
            .map(|c| c.key.clone())
            .collect();
        let mut summary = ImportSummary {
            total: snapshot.len(),
            skipped: snapshot.len() - pending.len(),
            ..Default::default()
        };
        drop(snapshot);

        info!(total = pending.len(), "Importing all curations");
        self.store
            .dispatch(CurationAction::ChangeCurationLockAll { locked: true })
            .await;

        for (index, key) in pending.iter().enumerate() {
            self.emit_progress(index, pending.len());
            if !self.store.snapshot().await.contains(key) {
                summary.skipped += 1;
                continue;
            }
            match self.import_locked(key, options).await {
                ImportOutcome::Imported => summary.imported += 1,
                ImportOutcome::Failed(_) => summary.failed += 1,
                ImportOutcome::Skipped(_) => summary.skipped += 1,
            }
        }
        self.emit_progress(pending.len(), pending.len());

        for key in &pending {
            if self.store.get(key).await.map(|c| c.locked).unwrap_or(false) {
                self.store
                    .dispatch(CurationAction::ChangeCurationLock {
                        key: key.clone(),
                        locked: false,
                    })
                    .await;
            }
        }

        info!(
            imported = summary.imported,
            failed = summary.failed,
            skipped = summary.skipped,
            "Import all finished"
        );
        summary
    }

    /// Export `key` to an archive at `destination`, overwriting it
    ///
    /// Returns the number of archive entries written.
    pub async fn export(&self, key: &str, destination: &Path) -> CurateResult<usize> {
        let curation = match self.store.try_lock(key).await {
            TryLock::Acquired(curation) => curation,
            TryLock::Locked => return Err(CurateError::Locked(key.to_string())),
            TryLock::Missing => return Err(CurateError::NotFound(key.to_string())),
        };

        let result = self.export_locked(&curation, destination).await;
        self.set_lock(key, false).await;

        let entries = result?;
        info!(key = %key, destination = %destination.display(), entries, "Exported curation");
        self.store.event_bus().emit_lossy(CurateEvent::ExportCompleted {
            key: key.to_string(),
            destination: destination.display().to_string(),
            timestamp: Utc::now(),
        });
        Ok(entries)
    }

    async fn export_locked(&self, curation: &Curation, destination: &Path) -> CurateResult<usize> {
        self.persist_meta(curation).await?;
        let folder = self.loader.folder_of(&curation.key);
        Ok(self
            .archive_tool
            .compress(&folder, &curation.key, destination)
            .await?)
    }

    /// Write the in-memory meta of `curation` to its structured meta file
    pub async fn persist_meta(&self, curation: &Curation) -> CurateResult<()> {
        let document = serialize_structured_meta(&curation.meta, &curation.add_app_metas())?;
        let path = self
            .loader
            .folder_of(&curation.key)
            .join(STRUCTURED_META_FILENAME);
        write_atomic_async(&path, document).await?;
        debug!(key = %curation.key, path = %path.display(), "Persisted meta");
        Ok(())
    }

    /// Import a curation this pipeline has already locked
    async fn import_locked(&self, key: &str, options: ImportOptions) -> ImportOutcome {
        let Some(curation) = self.store.get(key).await else {
            return ImportOutcome::Skipped(SkipReason::NotFound);
        };
        self.store.event_bus().emit_lossy(CurateEvent::ImportStarted {
            key: key.to_string(),
            timestamp: Utc::now(),
        });

        let result = match self.persist_meta(&curation).await {
            Ok(()) => self
                .importer
                .import(ImportRequest {
                    curation,
                    log: options.log,
                    date: options.date,
                    save_curation: options.save_curation,
                })
                .await
                .map_err(|rejection| rejection.error),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => {
                self.store
                    .dispatch(CurationAction::RemoveCuration { key: key.to_string() })
                    .await;
                info!(key = %key, "Imported curation");
                self.store.event_bus().emit_lossy(CurateEvent::ImportCompleted {
                    key: key.to_string(),
                    timestamp: Utc::now(),
                });
                ImportOutcome::Imported
            }
            Err(message) => {
                error!(key = %key, "Import failed: {}", message);
                self.recover(key).await;
                self.store.event_bus().emit_lossy(CurateEvent::ImportFailed {
                    key: key.to_string(),
                    error: message.clone(),
                    timestamp: Utc::now(),
                });
                ImportOutcome::Failed(message)
            }
        }
    }

    /// Unlock `key` and refresh its manifest from disk
    async fn recover(&self, key: &str) {
        self.set_lock(key, false).await;
        let content_folder = self.loader.folder_of(key).join(CONTENT_FOLDER);
        let content = index_content_folder(&content_folder).await;
        if !tokio::fs::try_exists(&content_folder).await.unwrap_or(false) {
            warn!(key = %key, "Content folder is gone after failed import");
        }
        self.store
            .dispatch(CurationAction::SetCurationContent {
                key: key.to_string(),
                content,
            })
            .await;
    }

    async fn set_lock(&self, key: &str, locked: bool) {
        self.store
            .dispatch(CurationAction::ChangeCurationLock {
                key: key.to_string(),
                locked,
            })
            .await;
    }

    fn emit_progress(&self, current: usize, total: usize) {
        self.store.event_bus().emit_lossy(CurateEvent::ImportProgress {
            progress: ImportProgress::new(current, total),
            timestamp: Utc::now(),
        });
    }
}
