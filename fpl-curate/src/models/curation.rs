//! Curation records
//!
//! Nested parts are held behind `Arc` so the reducer can copy a single
//! curation while sharing everything it did not touch. Two states can be
//! compared for change with `Arc::ptr_eq` instead of deep equality.

use super::image::{ImageKind, ImageRecord};
use crate::meta::CurationMeta;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Application path of an add-app that opens the curation's extras folder
pub const EXTRAS_APPLICATION_PATH: &str = ":extras:";

/// Application path of an add-app that only shows a text message
pub const MESSAGE_APPLICATION_PATH: &str = ":message:";

/// How a curation arrived in the working set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    None,
    Archive,
    Folder,
}

/// One file or folder of a curation's `content/` tree
///
/// `path` is posix-style and relative to `content/`; folder paths end in
/// `/` and always have size 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentEntry {
    pub path: String,
    pub size: u64,
}

impl ContentEntry {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn folder(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self { path, size: 0 }
    }

    /// Trailing slash and zero size. A zero-size entry without the slash is
    /// a file.
    pub fn is_directory(&self) -> bool {
        self.path.ends_with('/') && self.size == 0
    }
}

/// Editable add-app property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddAppField {
    Heading,
    ApplicationPath,
    LaunchCommand,
}

/// Flavour of an add-app, decided by its application path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddAppKind {
    Extras,
    Message,
    Normal,
}

/// Add-app meta as stored in a meta file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddAppMeta {
    pub heading: String,
    pub application_path: String,
    pub launch_command: String,
}

impl AddAppMeta {
    /// Add-app opening the extras folder `folder_name`
    pub fn extras(folder_name: impl Into<String>) -> Self {
        Self {
            heading: "Extras".to_string(),
            application_path: EXTRAS_APPLICATION_PATH.to_string(),
            launch_command: folder_name.into(),
        }
    }

    /// Add-app showing `message`
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            heading: "Message".to_string(),
            application_path: MESSAGE_APPLICATION_PATH.to_string(),
            launch_command: message.into(),
        }
    }

    pub fn kind(&self) -> AddAppKind {
        match self.application_path.as_str() {
            EXTRAS_APPLICATION_PATH => AddAppKind::Extras,
            MESSAGE_APPLICATION_PATH => AddAppKind::Message,
            _ => AddAppKind::Normal,
        }
    }

    pub fn is_extras(&self) -> bool {
        self.kind() == AddAppKind::Extras
    }

    pub fn is_message(&self) -> bool {
        self.kind() == AddAppKind::Message
    }

    pub fn get(&self, field: AddAppField) -> &str {
        match field {
            AddAppField::Heading => &self.heading,
            AddAppField::ApplicationPath => &self.application_path,
            AddAppField::LaunchCommand => &self.launch_command,
        }
    }

    pub fn set(&mut self, field: AddAppField, value: impl Into<String>) {
        let value = value.into();
        match field {
            AddAppField::Heading => self.heading = value,
            AddAppField::ApplicationPath => self.application_path = value,
            AddAppField::LaunchCommand => self.launch_command = value,
        }
    }
}

/// Secondary launchable entry of a curation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddApp {
    /// Unique within the parent curation
    pub key: String,
    pub meta: AddAppMeta,
}

impl AddApp {
    /// Wrap `meta` under a fresh key
    pub fn new(meta: AddAppMeta) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            meta,
        }
    }
}

/// A staged, user-editable content package
#[derive(Debug, Clone)]
pub struct Curation {
    /// Unique within the working set, stable for the curation's lifetime
    pub key: String,
    /// Origin path (archive file or folder)
    pub source: PathBuf,
    pub source_type: SourceType,
    pub meta: Arc<CurationMeta>,
    pub add_apps: Arc<Vec<Arc<AddApp>>>,
    pub content: Arc<Vec<ContentEntry>>,
    pub thumbnail: ImageRecord,
    pub screenshot: ImageRecord,
    /// While set, the reducer ignores every mutation of this curation
    pub locked: bool,
    /// Top-level subfolders that are neither `content` nor `Extras`
    pub unused_dirs: Arc<Vec<String>>,
}

impl Curation {
    pub fn new(key: impl Into<String>, source: impl Into<PathBuf>, source_type: SourceType) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            source_type,
            meta: Arc::new(CurationMeta::new()),
            add_apps: Arc::new(Vec::new()),
            content: Arc::new(Vec::new()),
            thumbnail: ImageRecord::missing(),
            screenshot: ImageRecord::missing(),
            locked: false,
            unused_dirs: Arc::new(Vec::new()),
        }
    }

    pub fn image(&self, kind: ImageKind) -> &ImageRecord {
        match kind {
            ImageKind::Logo => &self.thumbnail,
            ImageKind::Screenshot => &self.screenshot,
        }
    }

    pub fn add_app_metas(&self) -> Vec<AddAppMeta> {
        self.add_apps.iter().map(|a| a.meta.clone()).collect()
    }

    /// Title for display, falling back to the key
    pub fn display_title(&self) -> &str {
        self.meta.title().unwrap_or(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_classification() {
        assert!(ContentEntry::new("dir/", 0).is_directory());
        assert!(!ContentEntry::new("empty.txt", 0).is_directory());
        assert!(!ContentEntry::new("odd/", 12).is_directory());
        assert_eq!(ContentEntry::folder("a/b").path, "a/b/");
    }

    #[test]
    fn test_add_app_kind_by_application_path() {
        assert_eq!(AddAppMeta::extras("Extras").kind(), AddAppKind::Extras);
        assert_eq!(AddAppMeta::message("hi").kind(), AddAppKind::Message);
        assert_eq!(AddAppMeta::default().kind(), AddAppKind::Normal);
    }

    #[test]
    fn test_add_app_field_access() {
        let mut meta = AddAppMeta::default();
        meta.set(AddAppField::LaunchCommand, "run.swf");
        assert_eq!(meta.get(AddAppField::LaunchCommand), "run.swf");
        assert_ne!(AddApp::new(meta.clone()).key, AddApp::new(meta).key);
    }

    #[test]
    fn test_display_title_falls_back_to_key() {
        let curation = Curation::new("abc", "/tmp/abc", SourceType::Folder);
        assert_eq!(curation.display_title(), "abc");
    }
}
