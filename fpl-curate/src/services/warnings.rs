//! Curation validation
//!
//! Warnings never block anything on their own; the import pipeline only
//! computes them and leaves the decision to the caller.

use super::content_indexer::CONTENT_FOLDER;
use crate::meta::{MetaField, MetaFormat};
use crate::models::Curation;
use fpl_common::config::SuggestionsConfig;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// Scheme launch command URLs are expected to use
const EXPECTED_SCHEME: &str = "http";

/// Why a URL launch command was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchCommandProblem {
    NotHttp,
    /// The URL's target is neither in the manifest nor under `content/`
    NonExistent,
}

/// One warning about a curation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "camelCase")]
pub enum WrittenWarning {
    NoTitle,
    NoLaunchCommand,
    InvalidLaunchCommand { problem: LaunchCommandProblem },
    ReleaseDateInvalid,
    NoLogo,
    NoScreenshot,
    NoTags,
    NoSource,
    UnusedPlatform,
    UnusedApplicationPath,
    NonExistingLibrary,
    NonContentFolders { folders: Vec<String> },
    DuplicateMetaFiles,
}

impl WrittenWarning {
    pub fn name(&self) -> &'static str {
        match self {
            WrittenWarning::NoTitle => "noTitle",
            WrittenWarning::NoLaunchCommand => "noLaunchCommand",
            WrittenWarning::InvalidLaunchCommand { .. } => "invalidLaunchCommand",
            WrittenWarning::ReleaseDateInvalid => "releaseDateInvalid",
            WrittenWarning::NoLogo => "noLogo",
            WrittenWarning::NoScreenshot => "noScreenshot",
            WrittenWarning::NoTags => "noTags",
            WrittenWarning::NoSource => "noSource",
            WrittenWarning::UnusedPlatform => "unusedPlatform",
            WrittenWarning::UnusedApplicationPath => "unusedApplicationPath",
            WrittenWarning::NonExistingLibrary => "nonExistingLibrary",
            WrittenWarning::NonContentFolders { .. } => "nonContentFolders",
            WrittenWarning::DuplicateMetaFiles => "duplicateMetaFiles",
        }
    }

    /// Meta field the warning concerns, if any
    pub fn field(&self) -> Option<MetaField> {
        match self {
            WrittenWarning::NoTitle => Some(MetaField::Title),
            WrittenWarning::NoLaunchCommand | WrittenWarning::InvalidLaunchCommand { .. } => {
                Some(MetaField::LaunchCommand)
            }
            WrittenWarning::ReleaseDateInvalid => Some(MetaField::ReleaseDate),
            WrittenWarning::NoTags => Some(MetaField::Tags),
            WrittenWarning::NoSource => Some(MetaField::Source),
            WrittenWarning::UnusedPlatform => Some(MetaField::Platform),
            WrittenWarning::UnusedApplicationPath => Some(MetaField::ApplicationPath),
            WrittenWarning::NonExistingLibrary => Some(MetaField::Library),
            WrittenWarning::NoLogo
            | WrittenWarning::NoScreenshot
            | WrittenWarning::NonContentFolders { .. }
            | WrittenWarning::DuplicateMetaFiles => None,
        }
    }
}

impl fmt::Display for WrittenWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrittenWarning::NoTitle => write!(f, "\"Title\" is missing"),
            WrittenWarning::NoLaunchCommand => write!(f, "\"Launch Command\" is missing"),
            WrittenWarning::InvalidLaunchCommand {
                problem: LaunchCommandProblem::NotHttp,
            } => write!(f, "\"Launch Command\" is not a URL using the HTTP protocol"),
            WrittenWarning::InvalidLaunchCommand {
                problem: LaunchCommandProblem::NonExistent,
            } => write!(f, "\"Launch Command\" points to a file missing from the content folder"),
            WrittenWarning::ReleaseDateInvalid => write!(
                f,
                "\"Release Date\" must follow YYYY-MM-DD (month and day are optional)"
            ),
            WrittenWarning::NoLogo => write!(f, "No logo image"),
            WrittenWarning::NoScreenshot => write!(f, "No screenshot image"),
            WrittenWarning::NoTags => write!(f, "No tags"),
            WrittenWarning::NoSource => write!(f, "\"Source\" is missing"),
            WrittenWarning::UnusedPlatform => {
                write!(f, "\"Platform\" has an unused value. Make sure it's spelled correctly!")
            }
            WrittenWarning::UnusedApplicationPath => write!(
                f,
                "\"Application Path\" has an unused value. Make sure it's spelled correctly!"
            ),
            WrittenWarning::NonExistingLibrary => write!(f, "\"Library\" is not a known library"),
            WrittenWarning::NonContentFolders { folders } => write!(
                f,
                "Folders outside content/ will not be imported: {}",
                folders.join(", ")
            ),
            WrittenWarning::DuplicateMetaFiles => {
                write!(f, "More than one meta file; the structured one is used")
            }
        }
    }
}

/// Warning set of one curation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurationWarnings {
    pub written: Vec<WrittenWarning>,
    /// Fields with at least one warning, without duplicates
    pub fields: Vec<MetaField>,
}

impl CurationWarnings {
    pub fn from_written(written: Vec<WrittenWarning>) -> Self {
        let mut fields = Vec::new();
        for field in written.iter().filter_map(WrittenWarning::field) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Self { written, fields }
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.written.iter().any(|w| w.name() == name)
    }
}

/// Everything validation needs besides the curation itself
#[derive(Debug, Clone)]
pub struct WarningContext {
    pub suggestions: SuggestionsConfig,
    pub curations_root: PathBuf,
}

impl WarningContext {
    pub fn new(suggestions: SuggestionsConfig, curations_root: impl Into<PathBuf>) -> Self {
        Self {
            suggestions,
            curations_root: curations_root.into(),
        }
    }

    fn curation_folder(&self, key: &str) -> PathBuf {
        self.curations_root.join(key)
    }

    /// Validate `curation`
    pub async fn generate(&self, curation: &Curation) -> CurationWarnings {
        let meta = &curation.meta;
        let folder = self.curation_folder(&curation.key);
        let mut written = Vec::new();

        if meta.title().is_none() {
            written.push(WrittenWarning::NoTitle);
        }

        match meta.field(MetaField::LaunchCommand) {
            None => written.push(WrittenWarning::NoLaunchCommand),
            Some(command) => {
                if let Some(problem) = check_launch_command(command, curation, &folder).await {
                    written.push(WrittenWarning::InvalidLaunchCommand { problem });
                }
            }
        }

        if meta.field(MetaField::Source).is_none() {
            written.push(WrittenWarning::NoSource);
        }

        if let Some(date) = meta.field(MetaField::ReleaseDate) {
            if !is_valid_release_date(date) {
                written.push(WrittenWarning::ReleaseDateInvalid);
            }
        }

        if let Some(platform) = meta.field(MetaField::Platform) {
            if !is_suggested(&self.suggestions.platforms, platform) {
                written.push(WrittenWarning::UnusedPlatform);
            }
        }

        if let Some(path) = meta.field(MetaField::ApplicationPath) {
            if !path.starts_with(':') && !is_suggested(&self.suggestions.application_paths, path) {
                written.push(WrittenWarning::UnusedApplicationPath);
            }
        }

        let library = meta.field(MetaField::Library).unwrap_or_default();
        if !self.suggestions.libraries.iter().any(|l| l == library) {
            written.push(WrittenWarning::NonExistingLibrary);
        }

        if meta.field(MetaField::Tags).is_none() {
            written.push(WrittenWarning::NoTags);
        }
        if !curation.thumbnail.exists {
            written.push(WrittenWarning::NoLogo);
        }
        if !curation.screenshot.exists {
            written.push(WrittenWarning::NoScreenshot);
        }

        if !curation.unused_dirs.is_empty() {
            written.push(WrittenWarning::NonContentFolders {
                folders: curation.unused_dirs.as_ref().clone(),
            });
        }

        if has_duplicate_meta_files(&folder).await {
            written.push(WrittenWarning::DuplicateMetaFiles);
        }

        debug!(key = %curation.key, warnings = written.len(), "Generated warnings");
        CurationWarnings::from_written(written)
    }
}

/// An empty suggestion list accepts every value
fn is_suggested(suggestions: &[String], value: &str) -> bool {
    suggestions.is_empty() || suggestions.iter().any(|s| s == value)
}

/// `YYYY`, `YYYY-M(M)` or `YYYY-M(M)-D(D)`
pub fn is_valid_release_date(date: &str) -> bool {
    static RELEASE_DATE: OnceLock<Option<Regex>> = OnceLock::new();
    RELEASE_DATE
        .get_or_init(|| Regex::new(r"^\d{4}(-(0?[1-9]|1[012])(-(0?[1-9]|[12][0-9]|3[01]))?)?$").ok())
        .as_ref()
        .map(|re| re.is_match(date))
        .unwrap_or(true)
}

/// Check a URL-style launch command
///
/// Commands that do not parse as a URL (executables, scripts) are not checked.
async fn check_launch_command(
    command: &str,
    curation: &Curation,
    folder: &Path,
) -> Option<LaunchCommandProblem> {
    let command = command.trim();
    if !command.contains("://") {
        return None;
    }
    let url = match Url::parse(command) {
        Ok(url) => url,
        Err(_) => return Some(LaunchCommandProblem::NotHttp),
    };
    if url.scheme() != EXPECTED_SCHEME {
        return Some(LaunchCommandProblem::NotHttp);
    }

    let target = launch_target(&url);
    if target.is_empty() {
        return Some(LaunchCommandProblem::NonExistent);
    }
    if curation.content.iter().any(|entry| entry.path == target) {
        return None;
    }

    let on_disk = target
        .split('/')
        .fold(folder.join(CONTENT_FOLDER), |path, segment| path.join(segment));
    match tokio::fs::metadata(&on_disk).await {
        Ok(metadata) if metadata.is_file() => None,
        _ => Some(LaunchCommandProblem::NonExistent),
    }
}

/// Content-relative path a URL resolves to: `<host>/<path>`
fn launch_target(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let path = url.path().trim_start_matches('/');
    if path.is_empty() {
        host.to_string()
    } else {
        format!("{}/{}", host, path)
    }
}

async fn has_duplicate_meta_files(folder: &Path) -> bool {
    let Ok(mut entries) = tokio::fs::read_dir(folder).await else {
        return false;
    };
    let (mut legacy, mut structured) = (0, 0);
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        match MetaFormat::from_file_name(&name.to_string_lossy()) {
            Some(MetaFormat::Legacy) => legacy += 1,
            Some(MetaFormat::Structured) => structured += 1,
            None => {}
        }
    }
    legacy + structured > 1
}
