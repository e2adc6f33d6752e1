//! Content indexing
//!
//! Produces the content manifest of a curation from either a live folder or
//! an archive's entry listing. Archive indexing also diverts the meta file
//! and the two images out of the listing.

use crate::meta::{parse_meta, MetaFormat, ParsedMeta};
use crate::models::{ContentEntry, ImageKind, ImageRecord};
use fpl_common::fs_utils::fix_slashes;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name of the folder holding a curation's content
pub const CONTENT_FOLDER: &str = "content";

/// Name of the optional extras folder
pub const EXTRAS_FOLDER: &str = "Extras";

/// Destination of one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRoute {
    /// Under `<key>/content/`, with the first two segments stripped
    Content(ContentEntry),
    /// Meta file directly under `<key>/`
    Meta(MetaFormat),
    /// Image directly under `<key>/`
    Image(ImageKind),
    Ignored,
}

impl EntryRoute {
    /// Route an archive entry by its full path
    ///
    /// `size` must be 0 for folder entries.
    pub fn for_archive_path(full_path: &str, size: u64) -> Self {
        let path = fix_slashes(full_path);
        let segments: Vec<&str> = path.split('/').collect();

        if segments.len() > 2
            && segments[1].eq_ignore_ascii_case(CONTENT_FOLDER)
            && !segments[2].is_empty()
        {
            return EntryRoute::Content(ContentEntry::new(segments[2..].join("/"), size));
        }

        if segments.len() == 2 {
            if let Some(format) = MetaFormat::from_file_name(segments[1]) {
                return EntryRoute::Meta(format);
            }
            if let Some(kind) = ImageKind::from_file_name(segments[1]) {
                return EntryRoute::Image(kind);
            }
        }

        EntryRoute::Ignored
    }
}

/// Result of indexing a curation source
#[derive(Debug, Clone, Default)]
pub struct CurationIndex {
    pub content: Vec<ContentEntry>,
    pub meta: Option<ParsedMeta>,
    pub meta_format: Option<MetaFormat>,
    pub thumbnail: ImageRecord,
    pub screenshot: ImageRecord,
    /// Recoverable problems met while indexing
    pub errors: Vec<String>,
}

/// Accumulates an archive's entries into a [`CurationIndex`]
///
/// Entry bytes are only read for diverted entries.
#[derive(Debug, Default)]
pub struct ArchiveIndexer {
    index: CurationIndex,
    legacy_meta: Option<Vec<u8>>,
    structured_meta: Option<Vec<u8>>,
}

impl ArchiveIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one entry; `read` is called only for meta and image entries
    pub fn push_entry<F>(&mut self, full_path: &str, size: u64, read: F)
    where
        F: FnOnce() -> std::io::Result<Vec<u8>>,
    {
        match EntryRoute::for_archive_path(full_path, size) {
            EntryRoute::Content(entry) => self.index.content.push(entry),
            EntryRoute::Meta(format) => match read() {
                Ok(bytes) => {
                    let slot = match format {
                        MetaFormat::Legacy => &mut self.legacy_meta,
                        MetaFormat::Structured => &mut self.structured_meta,
                    };
                    if slot.is_none() {
                        *slot = Some(bytes);
                    }
                }
                Err(e) => self.record_error(format!("Failed to read {}: {}", full_path, e)),
            },
            EntryRoute::Image(kind) => match read() {
                Ok(bytes) => {
                    let image = ImageRecord::from_bytes(bytes);
                    match kind {
                        ImageKind::Logo => self.index.thumbnail = image,
                        ImageKind::Screenshot => self.index.screenshot = image,
                    }
                }
                Err(e) => self.record_error(format!("Failed to read {}: {}", full_path, e)),
            },
            EntryRoute::Ignored => debug!(path = full_path, "Ignoring archive entry"),
        }
    }

    /// Record an error that stopped part of the listing from being read
    pub fn record_error(&mut self, message: String) {
        warn!("{}", message);
        self.index.errors.push(message);
    }

    /// Parse the diverted meta file and return the index
    ///
    /// A structured meta file takes precedence over a legacy one.
    pub fn finish(mut self) -> CurationIndex {
        let candidate = match (self.structured_meta.take(), self.legacy_meta.take()) {
            (Some(bytes), _) => Some((MetaFormat::Structured, bytes)),
            (None, Some(bytes)) => Some((MetaFormat::Legacy, bytes)),
            (None, None) => None,
        };

        if let Some((format, bytes)) = candidate {
            self.index.meta_format = Some(format);
            match parse_meta(format, &bytes) {
                Ok(parsed) => self.index.meta = Some(parsed),
                Err(e) => self.record_error(format!("Failed to parse meta: {}", e)),
            }
        }

        self.index
    }
}

/// Index an in-memory archive listing of `(path, bytes)` pairs
///
/// Paths ending in `/` are folder entries.
pub fn index_archive_listing<'a, I>(entries: I) -> CurationIndex
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut indexer = ArchiveIndexer::new();
    for (path, data) in entries {
        let size = if path.ends_with('/') { 0 } else { data.len() as u64 };
        indexer.push_entry(path, size, || Ok(data.to_vec()));
    }
    indexer.finish()
}

/// Walk a content folder into a manifest
///
/// Entries are sorted by path within each folder; folders are listed with a
/// trailing `/` and size 0. A missing folder yields an empty manifest.
pub async fn index_content_folder(content_root: &Path) -> Vec<ContentEntry> {
    let root = content_root.to_path_buf();
    match tokio::task::spawn_blocking(move || walk_content_folder(&root)).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Content indexing task failed: {}", e);
            Vec::new()
        }
    }
}

fn walk_content_folder(root: &Path) -> Vec<ContentEntry> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing content entry: {}", e);
                continue;
            }
        };

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            entries.push(ContentEntry::folder(relative));
        } else {
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Error reading size of {}: {}", entry.path().display(), e);
                    0
                }
            };
            entries.push(ContentEntry::new(relative, size));
        }
    }

    debug!(root = %root.display(), entries = entries.len(), "Indexed content folder");
    entries
}
