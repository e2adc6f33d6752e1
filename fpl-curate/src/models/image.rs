//! Versioned image records
//!
//! `version` is a cache-invalidation token: it goes up by one on every
//! replacement or removal and never goes down, so consumers keying caches
//! on it always observe a change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Logo image file name at the curation root
pub const LOGO_FILENAME: &str = "logo.png";

/// Screenshot image file name at the curation root
pub const SCREENSHOT_FILENAME: &str = "ss.png";

/// Which of the two curation images a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Logo,
    Screenshot,
}

impl ImageKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ImageKind::Logo => LOGO_FILENAME,
            ImageKind::Screenshot => SCREENSHOT_FILENAME,
        }
    }

    /// Match a file name at the curation root (case-insensitive)
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower == LOGO_FILENAME {
            Some(ImageKind::Logo)
        } else if lower == SCREENSHOT_FILENAME {
            Some(ImageKind::Screenshot)
        } else {
            None
        }
    }
}

/// Where an image's bytes live
///
/// Archive extraction yields `Embedded`, folder indexing yields `File`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
    Embedded(Arc<[u8]>),
    File(PathBuf),
}

/// Image asset of a curation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRecord {
    pub exists: bool,
    pub origin: Option<ImageOrigin>,
    pub version: u64,
}

impl ImageRecord {
    /// Record for an image that has never existed
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            exists: true,
            origin: Some(ImageOrigin::File(path.into())),
            version: 0,
        }
    }

    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            exists: true,
            origin: Some(ImageOrigin::Embedded(data.into())),
            version: 0,
        }
    }

    /// New record replacing this one with `origin`
    pub fn replaced(&self, origin: ImageOrigin) -> Self {
        Self {
            exists: true,
            origin: Some(origin),
            version: self.version + 1,
        }
    }

    /// "Missing" record superseding this one
    pub fn removed(&self) -> Self {
        Self {
            exists: false,
            origin: None,
            version: self.version + 1,
        }
    }

    /// Re-read the image at `path`, superseding `previous`
    ///
    /// Any stat failure counts as the image being absent.
    pub async fn reload(path: &Path, previous: &ImageRecord) -> ImageRecord {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => {
                previous.replaced(ImageOrigin::File(path.to_path_buf()))
            }
            _ => previous.removed(),
        }
    }

    /// Initial record for the image at `path`
    pub async fn load(path: &Path) -> ImageRecord {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => ImageRecord::from_file(path),
            _ => ImageRecord::missing(),
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        match &self.origin {
            Some(ImageOrigin::Embedded(data)) => Some(data.as_ref()),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        match &self.origin {
            Some(ImageOrigin::File(path)) => Some(path.as_path()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replace_and_remove_bump_version() {
        let record = ImageRecord::missing();
        let replaced = record.replaced(ImageOrigin::File(PathBuf::from("logo.png")));
        assert!(replaced.exists);
        assert_eq!(replaced.version, 1);

        let removed = replaced.removed();
        assert!(!removed.exists);
        assert!(removed.origin.is_none());
        assert_eq!(removed.version, 2);
    }

    #[test]
    fn test_origins_are_exclusive() {
        let embedded = ImageRecord::from_bytes(vec![1u8, 2, 3]);
        assert_eq!(embedded.data(), Some(&[1u8, 2, 3][..]));
        assert!(embedded.source().is_none());

        let file = ImageRecord::from_file("/tmp/ss.png");
        assert!(file.data().is_none());
        assert_eq!(file.source(), Some(Path::new("/tmp/ss.png")));
    }

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(ImageKind::from_file_name("LOGO.PNG"), Some(ImageKind::Logo));
        assert_eq!(ImageKind::from_file_name("ss.png"), Some(ImageKind::Screenshot));
        assert_eq!(ImageKind::from_file_name("ss.jpg"), None);
    }

    #[tokio::test]
    async fn test_reload_tracks_disk_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOGO_FILENAME);

        let absent = ImageRecord::load(&path).await;
        assert!(!absent.exists);

        std::fs::write(&path, b"png").unwrap();
        let present = ImageRecord::reload(&path, &absent).await;
        assert!(present.exists);
        assert_eq!(present.version, 1);

        std::fs::remove_file(&path).unwrap();
        let gone = ImageRecord::reload(&path, &present).await;
        assert!(!gone.exists);
        assert_eq!(gone.version, 2);
    }
}
