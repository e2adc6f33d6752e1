//! Test Helper Utilities
//!
//! Shared fixtures for the fpl-curate integration tests

#![allow(dead_code)]

pub mod log_capture;

pub use log_capture::{capture_logs, LogCapture};

use async_trait::async_trait;
use fpl_curate::meta::defaults::MetaDefaults;
use fpl_curate::services::{CurationImporter, ImportRejection, ImportRequest};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Defaults matching a stock install
pub fn test_defaults() -> MetaDefaults {
    MetaDefaults {
        language: "en".to_string(),
        play_mode: "Single Player".to_string(),
        status: "Playable".to_string(),
        platform: "Flash".to_string(),
        library: "arcade".to_string(),
        application_paths: [(
            "Flash".to_string(),
            "FPSoftware\\Flash\\flashplayer.exe".to_string(),
        )]
        .into_iter()
        .collect(),
    }
}

/// Builder for a curation folder on disk
pub struct CurationFolder {
    path: PathBuf,
}

impl CurationFolder {
    pub fn new(curations_root: &Path, key: &str) -> Self {
        let path = curations_root.join(key);
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(self, name: &str, data: impl AsRef<[u8]>) -> Self {
        let target = self.path.join(name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(target, data).unwrap();
        self
    }

    pub fn content(self, relative: &str, data: impl AsRef<[u8]>) -> Self {
        self.file(&format!("content/{}", relative), data)
    }

    pub fn dir(self, name: &str) -> Self {
        std::fs::create_dir_all(self.path.join(name)).unwrap();
        self
    }
}

/// Write a zip archive with the given `(path, bytes)` entries
///
/// Paths ending in `/` become folder entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// Accepts every curation and records the keys in order
#[derive(Clone, Default)]
pub struct RecordingImporter {
    pub imported: Arc<Mutex<Vec<String>>>,
}

impl RecordingImporter {
    pub fn keys(&self) -> Vec<String> {
        self.imported.lock().unwrap().clone()
    }
}

#[async_trait]
impl CurationImporter for RecordingImporter {
    async fn import(&self, request: ImportRequest) -> Result<(), ImportRejection> {
        self.imported.lock().unwrap().push(request.curation.key.clone());
        Ok(())
    }
}

/// Consumes part of the content folder, then rejects the curations named
/// in `reject`
pub struct PartialFailImporter {
    pub curations_root: PathBuf,
    pub reject: Vec<String>,
    pub consume: Vec<String>,
}

#[async_trait]
impl CurationImporter for PartialFailImporter {
    async fn import(&self, request: ImportRequest) -> Result<(), ImportRejection> {
        let key = &request.curation.key;
        if !self.reject.contains(key) {
            return Ok(());
        }
        let content = self.curations_root.join(key).join("content");
        for relative in &self.consume {
            let _ = std::fs::remove_file(content.join(relative));
        }
        Err(ImportRejection::new("database is locked"))
    }
}
