//! Folder-based content store
//!
//! Copies a curation's content into the install's content-serving folder and
//! optionally keeps a copy of the whole curation folder.

use super::content_indexer::CONTENT_FOLDER;
use super::import_pipeline::{CurationImporter, ImportRejection, ImportRequest};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// [`CurationImporter`] writing into the install folders
#[derive(Debug, Clone)]
pub struct InstallFolderImporter {
    curations_root: PathBuf,
    install_content_root: PathBuf,
    imported_root: PathBuf,
}

impl InstallFolderImporter {
    pub fn new(
        curations_root: impl Into<PathBuf>,
        install_content_root: impl Into<PathBuf>,
        imported_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            curations_root: curations_root.into(),
            install_content_root: install_content_root.into(),
            imported_root: imported_root.into(),
        }
    }
}

#[async_trait]
impl CurationImporter for InstallFolderImporter {
    async fn import(&self, request: ImportRequest) -> Result<(), ImportRejection> {
        let key = request.curation.key.clone();
        let folder = self.curations_root.join(&key);
        let content = folder.join(CONTENT_FOLDER);
        let install_root = self.install_content_root.clone();
        let saved = request
            .save_curation
            .then(|| self.imported_root.join(&key));

        let copied = tokio::task::spawn_blocking(move || -> io::Result<usize> {
            let copied = copy_tree(&content, &install_root)?;
            if let Some(saved) = saved {
                copy_tree(&folder, &saved)?;
            }
            Ok(copied)
        })
        .await
        .map_err(|e| ImportRejection::new(format!("Import task failed: {}", e)))?
        .map_err(|e| ImportRejection::new(format!("Failed to copy content: {}", e)))?;

        if request.log {
            let date = request.date.unwrap_or_else(chrono::Utc::now);
            info!(
                key = %key,
                title = request.curation.display_title(),
                files = copied,
                date = %date.to_rfc3339(),
                "Imported curation into install"
            );
        }
        Ok(())
    }
}

/// Copy every file below `source` to the same relative path under
/// `destination`, overwriting existing files
///
/// A missing `source` copies nothing.
fn copy_tree(source: &Path, destination: &Path) -> io::Result<usize> {
    if !source.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    debug!(source = %source.display(), destination = %destination.display(), copied, "Copied tree");
    Ok(copied)
}
