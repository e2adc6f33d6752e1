//! Curation archive extraction and export
//!
//! Archives hold a single curation under a top-level `<key>/` folder:
//! `<key>/content/**`, `<key>/meta.yaml` (or `meta.txt`), `<key>/logo.png`,
//! `<key>/ss.png`. Zip work is blocking and runs on the blocking pool.

use super::content_indexer::{index_content_folder, ArchiveIndexer, CurationIndex, CONTENT_FOLDER};
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Archive file could not be opened
    #[error("Failed to open archive {0}: {1}")]
    Open(PathBuf, String),

    /// Zip format error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Folder to export does not exist
    #[error("Curation folder not found: {0}")]
    FolderNotFound(PathBuf),

    /// No entry of the archive could be extracted
    #[error("Nothing extracted from {0}: {1}")]
    Empty(PathBuf, String),

    /// Blocking task panicked or was cancelled
    #[error("Archive task failed: {0}")]
    Task(String),
}

/// A curation unpacked into the working folder
#[derive(Debug, Clone)]
pub struct ExtractedCuration {
    /// Fresh key, also the folder name under the curations root
    pub key: String,
    pub folder: PathBuf,
    /// Index of the archive (images embedded, content re-read from disk)
    pub index: CurationIndex,
}

/// External compression tool
#[async_trait]
pub trait ArchiveTool: Send + Sync {
    /// Index an archive's listing without extracting it
    async fn index(&self, archive: &Path) -> Result<CurationIndex, ArchiveError>;

    /// Unpack `archive` into `<curations_root>/<new key>/`
    async fn extract(
        &self,
        archive: &Path,
        curations_root: &Path,
    ) -> Result<ExtractedCuration, ArchiveError>;

    /// Pack `folder` into `destination` with every entry under `<key>/`
    ///
    /// An existing `destination` is deleted first. Returns the number of
    /// entries written.
    async fn compress(
        &self,
        folder: &Path,
        key: &str,
        destination: &Path,
    ) -> Result<usize, ArchiveError>;
}

/// [`ArchiveTool`] backed by the `zip` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveTool;

#[async_trait]
impl ArchiveTool for ZipArchiveTool {
    async fn index(&self, archive: &Path) -> Result<CurationIndex, ArchiveError> {
        let archive = archive.to_path_buf();
        tokio::task::spawn_blocking(move || index_zip(&archive))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))?
    }

    async fn extract(
        &self,
        archive: &Path,
        curations_root: &Path,
    ) -> Result<ExtractedCuration, ArchiveError> {
        let key = uuid::Uuid::new_v4().to_string();
        let folder = curations_root.join(&key);

        let (archive_path, target, route_key) = (archive.to_path_buf(), folder.clone(), key.clone());
        let mut index = match tokio::task::spawn_blocking(move || {
            extract_zip(&archive_path, &target, &route_key)
        })
        .await
        {
            Ok(result) => result?,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&folder).await;
                return Err(ArchiveError::Task(e.to_string()));
            }
        };

        // Post-extraction indexing reflects what actually landed on disk
        index.content = index_content_folder(&folder.join(CONTENT_FOLDER)).await;

        info!(
            key = %key,
            archive = %archive.display(),
            entries = index.content.len(),
            errors = index.errors.len(),
            "Extracted curation archive"
        );
        Ok(ExtractedCuration { key, folder, index })
    }

    async fn compress(
        &self,
        folder: &Path,
        key: &str,
        destination: &Path,
    ) -> Result<usize, ArchiveError> {
        if !tokio::fs::metadata(folder).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(ArchiveError::FolderNotFound(folder.to_path_buf()));
        }

        match tokio::fs::remove_file(destination).await {
            Ok(()) => debug!(destination = %destination.display(), "Removed existing archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (folder, key, destination) =
            (folder.to_path_buf(), key.to_string(), destination.to_path_buf());
        tokio::task::spawn_blocking(move || compress_folder(&folder, &key, &destination))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))?
    }
}

fn open_zip(path: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::Open(path.to_path_buf(), e.to_string()))?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|e| ArchiveError::Open(path.to_path_buf(), e.to_string()))
}

fn index_zip(path: &Path) -> Result<CurationIndex, ArchiveError> {
    let mut indexer = ArchiveIndexer::new();
    let mut archive = match open_zip(path) {
        Ok(archive) => archive,
        Err(e) => {
            indexer.record_error(e.to_string());
            return Ok(indexer.finish());
        }
    };

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                indexer.record_error(format!("Unreadable entry #{} in {}: {}", i, path.display(), e));
                continue;
            }
        };
        let name = entry.name().to_string();
        let size = if entry.is_dir() { 0 } else { entry.size() };
        indexer.push_entry(&name, size, || {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            Ok(data)
        });
    }

    Ok(indexer.finish())
}

/// Path of an entry below the archive's top-level folder
///
/// Returns `None` for the top-level folder itself.
fn strip_top_level(path: &Path) -> Option<PathBuf> {
    let mut components = path.components().filter(|c| matches!(c, Component::Normal(_)));
    components.next()?;
    let rest: PathBuf = components.collect();
    if rest.as_os_str().is_empty() {
        None
    } else {
        Some(rest)
    }
}

fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Unpack `path` into `target`
///
/// Per-entry failures are recorded on the index and skipped. If nothing
/// could be read the partially created `target` is removed again.
fn extract_zip(path: &Path, target: &Path, key: &str) -> Result<CurationIndex, ArchiveError> {
    let mut archive = open_zip(path)?;
    if let Err(e) = std::fs::create_dir_all(target) {
        remove_partial(target);
        return Err(e.into());
    }

    let mut indexer = ArchiveIndexer::new();
    let mut extracted = 0usize;
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                indexer.record_error(format!("Unreadable entry #{} in {}: {}", i, path.display(), e));
                continue;
            }
        };
        let Some(enclosed) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let Some(relative) = strip_top_level(&enclosed) else {
            continue;
        };

        let out_path = target.join(&relative);
        if entry.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&out_path) {
                indexer.record_error(format!("Failed to create {}: {}", out_path.display(), e));
                continue;
            }
            extracted += 1;
            indexer.push_entry(&format!("{}/{}/", key, to_posix(&relative)), 0, || Ok(Vec::new()));
            continue;
        }

        if let Some(parent) = out_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                indexer.record_error(format!("Failed to create {}: {}", parent.display(), e));
                continue;
            }
        }
        let mut data = Vec::new();
        if let Err(e) = entry.read_to_end(&mut data) {
            indexer.record_error(format!("Failed to read {}: {}", entry.name(), e));
            continue;
        }
        if let Err(e) = std::fs::write(&out_path, &data) {
            indexer.record_error(format!("Failed to write {}: {}", out_path.display(), e));
            continue;
        }

        extracted += 1;
        let size = data.len() as u64;
        indexer.push_entry(&format!("{}/{}", key, to_posix(&relative)), size, move || Ok(data));
    }

    let index = indexer.finish();
    if extracted == 0 && !index.errors.is_empty() {
        remove_partial(target);
        return Err(ArchiveError::Empty(path.to_path_buf(), index.errors.join("; ")));
    }
    Ok(index)
}

fn remove_partial(target: &Path) {
    if let Err(e) = std::fs::remove_dir_all(target) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(folder = %target.display(), "Failed to remove partial extraction: {}", e);
        }
    }
}

fn compress_folder(folder: &Path, key: &str, destination: &Path) -> Result<usize, ArchiveError> {
    let file = File::create(destination)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.add_directory(format!("{}/", key), options)?;
    let mut written = 1;

    for entry in WalkDir::new(folder).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing {}: {}", folder.display(), e);
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(folder) else {
            continue;
        };
        let name = format!("{}/{}", key, to_posix(relative));

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
        } else {
            writer.start_file(name, options)?;
            let mut source = File::open(entry.path())?;
            std::io::copy(&mut source, &mut writer)?;
        }
        written += 1;
    }

    writer.finish()?;
    debug!(destination = %destination.display(), entries = written, "Wrote curation archive");
    Ok(written)
}
