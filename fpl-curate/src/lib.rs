//! fpl-curate library interface
//!
//! Curation pipeline of the launcher: meta parsing, content indexing, the
//! curation state reducer, the curations folder watcher, collision checks
//! and import/export.

pub mod error;
pub mod meta;
pub mod models;
pub mod services;
pub mod state;
pub mod watcher;

pub use crate::error::{CurateError, CurateResult};

use fpl_common::config::TomlConfig;
use fpl_common::events::EventBus;
use meta::defaults::MetaDefaults;
use services::{
    ArchiveTool, CollisionDetector, CollisionOutcome, ContentCollision, CurationImporter, CurationLoader, ImportPipeline,
    InstallFolderImporter, JoinedInstallRoot, WarningContext, ZipArchiveTool,
};
use state::{CurationAction, CurationStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use watcher::{NotifyEventSource, Reconciler};

/// Event bus capacity for a curation session
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Everything a curation session shares
#[derive(Clone)]
pub struct AppState {
    pub root_folder: PathBuf,
    pub config: TomlConfig,
    pub event_bus: EventBus,
    pub store: CurationStore,
    pub loader: CurationLoader,
    pub archive_tool: Arc<dyn ArchiveTool>,
    pub collisions: CollisionDetector,
}

impl AppState {
    pub fn new(root_folder: PathBuf, config: TomlConfig) -> Self {
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        let store = CurationStore::new(event_bus.clone());
        let loader = CurationLoader::new(
            config.curations_root(&root_folder),
            MetaDefaults::from(&config.defaults),
        );
        let collisions = CollisionDetector::new(
            Arc::new(JoinedInstallRoot::new(config.install_content_root(&root_folder))),
            store.clone(),
        );

        Self {
            root_folder,
            config,
            event_bus,
            store,
            loader,
            archive_tool: Arc::new(ZipArchiveTool),
            collisions,
        }
    }

    pub fn curations_root(&self) -> PathBuf {
        self.config.curations_root(&self.root_folder)
    }

    /// Load every curation folder into the store
    ///
    /// Application path defaults learned from the existing curations are
    /// applied to the ones missing one. Returns the number loaded.
    pub async fn load_working_set(&mut self) -> usize {
        self.loader.learn_application_paths().await;
        let curations = self.loader.load_all_curations().await;
        let count = curations.len();
        for curation in curations {
            self.store.dispatch(CurationAction::AddCuration(curation)).await;
        }
        self.store.dispatch(CurationAction::SortCurations).await;
        info!(count, "Working set loaded");
        count
    }

    /// Extract `archive` into the curations root and add it to the store
    ///
    /// Returns the new curation's key.
    pub async fn load_archive(&self, archive: &std::path::Path) -> CurateResult<String> {
        let curation = self.loader.load_archive(self.archive_tool.as_ref(), archive).await?;
        let key = curation.key.clone();
        self.store.dispatch(CurationAction::AddCuration(curation)).await;
        info!(key = %key, archive = %archive.display(), "Loaded curation archive");
        Ok(key)
    }

    /// Content entries of `key` whose destination already exists in the
    /// install
    pub async fn existing_collisions(&self, key: &str) -> Vec<ContentCollision> {
        match self.collisions.check(key).await {
            CollisionOutcome::Applied(collisions) => {
                collisions.into_iter().filter(|c| c.exists).collect()
            }
            CollisionOutcome::Stale | CollisionOutcome::Missing => Vec::new(),
        }
    }

    pub fn warning_context(&self) -> WarningContext {
        WarningContext::new(self.config.suggestions.clone(), self.curations_root())
    }

    /// Content store writing into the install folders
    pub fn install_importer(&self) -> InstallFolderImporter {
        InstallFolderImporter::new(
            self.curations_root(),
            self.config.install_content_root(&self.root_folder),
            self.config.imported_curations_root(&self.root_folder),
        )
    }

    pub fn pipeline(&self, importer: Arc<dyn CurationImporter>) -> ImportPipeline {
        ImportPipeline::new(
            self.store.clone(),
            self.loader.clone(),
            importer,
            Arc::clone(&self.archive_tool),
            self.warning_context(),
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone(), self.loader.clone())
    }

    /// Watch the curations folder until `shutdown` completes
    pub async fn watch<F>(&self, shutdown: F) -> CurateResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let root = self.curations_root();
        tokio::fs::create_dir_all(&root).await?;
        let source = NotifyEventSource::new(&root)?;
        let collisions = self.collisions.spawn_listener();
        let checked = self.collisions.check_outdated().await;
        debug!(count = checked.len(), "Checked collisions of the working set");
        let reconciler = self.reconciler();

        tokio::select! {
            _ = reconciler.run(source, &self.config.watcher) => {}
            _ = shutdown => info!("Stopping watcher"),
        }
        collisions.abort();
        Ok(())
    }
}
