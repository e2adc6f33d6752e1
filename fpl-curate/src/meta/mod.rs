//! Curation meta parsing
//!
//! Two on-disk formats reduce to the same canonical record:
//! - `meta.txt`: legacy `Field Name: value` lines ([`legacy`])
//! - `meta.yaml` / `meta.yml`: structured mapping document ([`structured`])
//!
//! Default values are injected in a separate post-parse step ([`defaults`]).

pub mod defaults;
pub mod legacy;
pub mod structured;

use crate::models::AddAppMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Legacy meta file name
pub const LEGACY_META_FILENAME: &str = "meta.txt";

/// Structured meta file name written by this crate
pub const STRUCTURED_META_FILENAME: &str = "meta.yaml";

/// Alternative structured meta file name accepted on read
pub const STRUCTURED_META_ALT_FILENAME: &str = "meta.yml";

/// Meta parse errors
///
/// Always reported as a warning by callers, never fatal.
#[derive(Debug, Error)]
pub enum MetaParseError {
    /// File is not valid UTF-8
    #[error("Meta file is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Structured document is not valid YAML
    #[error("Malformed structured meta: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Structured document parsed but its root is not a mapping
    #[error("Structured meta root is not a mapping")]
    NotAMapping,

    /// A field holds a value of the wrong shape
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Meta file could not be read
    #[error("Failed to read meta file: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk meta format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaFormat {
    Legacy,
    Structured,
}

impl MetaFormat {
    /// Detect the format from a file name (case-insensitive)
    ///
    /// Returns `None` for files that are not meta files.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower == LEGACY_META_FILENAME {
            Some(MetaFormat::Legacy)
        } else if lower == STRUCTURED_META_FILENAME || lower == STRUCTURED_META_ALT_FILENAME {
            Some(MetaFormat::Structured)
        } else {
            None
        }
    }
}

/// Canonical meta fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaField {
    Title,
    AlternateTitles,
    Series,
    Developer,
    Publisher,
    PlayMode,
    Status,
    Version,
    ReleaseDate,
    Language,
    Source,
    Platform,
    ApplicationPath,
    LaunchCommand,
    Notes,
    OriginalDescription,
    CurationNotes,
    MountParameters,
    Tags,
    TagCategories,
    Library,
    Extreme,
}

impl MetaField {
    pub const ALL: [MetaField; 22] = [
        MetaField::Title,
        MetaField::AlternateTitles,
        MetaField::Series,
        MetaField::Developer,
        MetaField::Publisher,
        MetaField::PlayMode,
        MetaField::Status,
        MetaField::Version,
        MetaField::ReleaseDate,
        MetaField::Language,
        MetaField::Source,
        MetaField::Platform,
        MetaField::ApplicationPath,
        MetaField::LaunchCommand,
        MetaField::Notes,
        MetaField::OriginalDescription,
        MetaField::CurationNotes,
        MetaField::MountParameters,
        MetaField::Tags,
        MetaField::TagCategories,
        MetaField::Library,
        MetaField::Extreme,
    ];

    /// Canonical key stored in [`CurationMeta`]
    pub fn key(&self) -> &'static str {
        match self {
            MetaField::Title => "title",
            MetaField::AlternateTitles => "alternateTitles",
            MetaField::Series => "series",
            MetaField::Developer => "developer",
            MetaField::Publisher => "publisher",
            MetaField::PlayMode => "playMode",
            MetaField::Status => "status",
            MetaField::Version => "version",
            MetaField::ReleaseDate => "releaseDate",
            MetaField::Language => "language",
            MetaField::Source => "source",
            MetaField::Platform => "platform",
            MetaField::ApplicationPath => "applicationPath",
            MetaField::LaunchCommand => "launchCommand",
            MetaField::Notes => "notes",
            MetaField::OriginalDescription => "originalDescription",
            MetaField::CurationNotes => "curationNotes",
            MetaField::MountParameters => "mountParameters",
            MetaField::Tags => "tags",
            MetaField::TagCategories => "tagCategories",
            MetaField::Library => "library",
            MetaField::Extreme => "extreme",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }
}

impl std::fmt::Display for MetaField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for MetaField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Open-ended canonical meta record
///
/// An empty value is never stored: setting a key to `""` removes it, so
/// "empty" and "absent" are the same state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurationMeta {
    fields: BTreeMap<String, String>,
}

impl CurationMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn field(&self, field: MetaField) -> Option<&str> {
        self.get(field.key())
    }

    /// Set `key` to `value`, or remove it when `value` is empty
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.fields.remove(&key);
        } else {
            self.fields.insert(key, value);
        }
    }

    pub fn set_field(&mut self, field: MetaField, value: impl Into<String>) {
        self.set(field.key(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn has_field(&self, field: MetaField) -> bool {
        self.contains(field.key())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn title(&self) -> Option<&str> {
        self.field(MetaField::Title)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CurationMeta {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = CurationMeta::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

/// Result of parsing a meta file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMeta {
    pub meta: CurationMeta,
    /// Add-apps in file order (legacy files never carry any)
    pub add_apps: Vec<AddAppMeta>,
}

/// Decode meta file bytes as UTF-8, dropping a leading byte order mark
pub fn decode_meta_text(bytes: &[u8]) -> Result<&str, MetaParseError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(fpl_common::fs_utils::strip_bom(text))
}

/// Parse meta file bytes in the given format
pub fn parse_meta(format: MetaFormat, bytes: &[u8]) -> Result<ParsedMeta, MetaParseError> {
    let text = decode_meta_text(bytes)?;
    match format {
        MetaFormat::Legacy => Ok(ParsedMeta {
            meta: legacy::parse_legacy_meta(text),
            add_apps: Vec::new(),
        }),
        MetaFormat::Structured => structured::parse_structured_meta(text),
    }
}
