//! Curation folder loading
//!
//! Builds complete [`Curation`] records from `<curations_root>/<key>/`.

use super::archive::ArchiveTool;
use super::content_indexer::{index_content_folder, CONTENT_FOLDER, EXTRAS_FOLDER};
use crate::error::{CurateError, CurateResult};
use crate::meta::defaults::{apply_defaults, most_used_application_paths, MetaDefaults};
use crate::meta::{
    parse_meta, MetaField, MetaFormat, ParsedMeta, LEGACY_META_FILENAME, STRUCTURED_META_ALT_FILENAME,
    STRUCTURED_META_FILENAME,
};
use crate::models::{AddApp, Curation, ImageKind, ImageRecord, SourceType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Meta file found in a curation folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaFile {
    pub format: MetaFormat,
    pub path: PathBuf,
}

/// Loads curations from the working folder
#[derive(Debug, Clone)]
pub struct CurationLoader {
    curations_root: PathBuf,
    defaults: MetaDefaults,
}

impl CurationLoader {
    pub fn new(curations_root: impl Into<PathBuf>, defaults: MetaDefaults) -> Self {
        Self {
            curations_root: curations_root.into(),
            defaults,
        }
    }

    pub fn curations_root(&self) -> &Path {
        &self.curations_root
    }

    pub fn defaults(&self) -> &MetaDefaults {
        &self.defaults
    }

    pub fn folder_of(&self, key: &str) -> PathBuf {
        self.curations_root.join(key)
    }

    /// Parsed meta with defaults filled in
    pub fn with_defaults(&self, mut parsed: ParsedMeta) -> ParsedMeta {
        apply_defaults(&mut parsed.meta, &self.defaults);
        parsed
    }

    /// Read and parse the meta file of `folder`
    ///
    /// Returns `None` when the folder has no meta file. A file that fails to
    /// parse is left alone and yields defaults only.
    pub async fn read_meta(&self, folder: &Path) -> Option<ParsedMeta> {
        let file = find_meta_file(folder).await?;
        let parsed = match tokio::fs::read(&file.path).await {
            Ok(bytes) => match parse_meta(file.format, &bytes) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %file.path.display(), "Failed to parse meta file, using defaults: {}", e);
                    ParsedMeta::default()
                }
            },
            Err(e) => {
                warn!(path = %file.path.display(), "Failed to read meta file, using defaults: {}", e);
                ParsedMeta::default()
            }
        };
        Some(self.with_defaults(parsed))
    }

    /// Build the curation stored under `key`
    pub async fn load_curation_folder(&self, key: &str) -> CurateResult<Curation> {
        let folder = self.folder_of(key);
        if !is_dir(&folder).await {
            return Err(CurateError::NotFound(key.to_string()));
        }

        let mut curation = Curation::new(key, folder.clone(), SourceType::Folder);

        let parsed = match self.read_meta(&folder).await {
            Some(parsed) => {
                curation.unused_dirs = Arc::new(unused_dirs(&folder).await);
                parsed
            }
            None => {
                debug!(key = %key, "Curation folder has no meta file");
                self.with_defaults(ParsedMeta::default())
            }
        };
        curation.meta = Arc::new(parsed.meta);
        curation.add_apps = Arc::new(
            parsed
                .add_apps
                .into_iter()
                .map(|meta| Arc::new(AddApp::new(meta)))
                .collect(),
        );

        curation.thumbnail = ImageRecord::load(&folder.join(ImageKind::Logo.file_name())).await;
        curation.screenshot =
            ImageRecord::load(&folder.join(ImageKind::Screenshot.file_name())).await;
        curation.content = Arc::new(index_content_folder(&folder.join(CONTENT_FOLDER)).await);

        debug!(
            key = %key,
            entries = curation.content.len(),
            add_apps = curation.add_apps.len(),
            "Loaded curation folder"
        );
        Ok(curation)
    }

    /// Names of every folder under the curations root, sorted
    pub async fn curation_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        match tokio::fs::read_dir(&self.curations_root).await {
            Ok(mut entries) => {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                        keys.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
            }
            Err(e) => {
                warn!(root = %self.curations_root.display(), "Cannot read curations folder: {}", e);
            }
        }
        keys.sort();
        keys
    }

    /// Use the most common application path per platform among existing
    /// curations as the fallback application path default
    pub async fn learn_application_paths(&mut self) {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for key in self.curation_keys().await {
            let Some(file) = find_meta_file(&self.folder_of(&key)).await else {
                continue;
            };
            let Ok(bytes) = tokio::fs::read(&file.path).await else {
                continue;
            };
            let Ok(parsed) = parse_meta(file.format, &bytes) else {
                continue;
            };
            if let (Some(platform), Some(path)) = (
                parsed.meta.field(MetaField::Platform),
                parsed.meta.field(MetaField::ApplicationPath),
            ) {
                pairs.push((platform.to_string(), path.to_string()));
            }
        }

        let table =
            most_used_application_paths(pairs.iter().map(|(p, a)| (p.as_str(), a.as_str())));
        debug!(platforms = table.len(), "Learned application paths");
        self.defaults = self.defaults.clone().with_fallback_paths(table);
    }

    /// Load every folder under the curations root, sorted by key
    ///
    /// Folders that cannot be loaded are skipped with a warning.
    pub async fn load_all_curations(&self) -> Vec<Curation> {
        let keys = self.curation_keys().await;
        let mut curations = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load_curation_folder(&key).await {
                Ok(curation) => curations.push(curation),
                Err(e) => warn!(key = %key, "Skipping curation folder: {}", e),
            }
        }

        info!(count = curations.len(), root = %self.curations_root.display(), "Loaded curations");
        curations
    }

    /// Extract `archive` into the curations root and load the result
    ///
    /// Images come from the archive itself; index errors are logged and the
    /// curation is loaded with whatever was extracted.
    pub async fn load_archive(
        &self,
        tool: &dyn ArchiveTool,
        archive: &Path,
    ) -> CurateResult<Curation> {
        tokio::fs::create_dir_all(&self.curations_root).await?;
        let extracted = tool.extract(archive, &self.curations_root).await?;
        for error in &extracted.index.errors {
            warn!(key = %extracted.key, archive = %archive.display(), "{}", error);
        }

        let mut curation = match self.load_curation_folder(&extracted.key).await {
            Ok(curation) => curation,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&extracted.folder).await;
                return Err(e);
            }
        };
        curation.source = archive.to_path_buf();
        curation.source_type = SourceType::Archive;
        if extracted.index.thumbnail.exists {
            curation.thumbnail = extracted.index.thumbnail;
        }
        if extracted.index.screenshot.exists {
            curation.screenshot = extracted.index.screenshot;
        }
        Ok(curation)
    }
}

/// Locate the meta file of `folder`
///
/// Names are matched case-insensitively; a structured file wins over a
/// legacy one, and `meta.yaml` over `meta.yml`.
pub async fn find_meta_file(folder: &Path) -> Option<MetaFile> {
    let mut entries = tokio::fs::read_dir(folder).await.ok()?;
    let mut found: Vec<(u8, MetaFile)> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let rank = match name.as_str() {
            STRUCTURED_META_FILENAME => 0,
            STRUCTURED_META_ALT_FILENAME => 1,
            LEGACY_META_FILENAME => 2,
            _ => continue,
        };
        if let Some(format) = MetaFormat::from_file_name(&name) {
            found.push((
                rank,
                MetaFile {
                    format,
                    path: entry.path(),
                },
            ));
        }
    }
    found.sort_by_key(|(rank, _)| *rank);
    found.into_iter().next().map(|(_, file)| file)
}

/// Whether `name` is a top-level folder that belongs in a curation
pub fn is_expected_folder(name: &str) -> bool {
    name.eq_ignore_ascii_case(CONTENT_FOLDER) || name.eq_ignore_ascii_case(EXTRAS_FOLDER)
}

/// Top-level subfolders of `folder` other than `content` and `Extras`
pub async fn unused_dirs(folder: &Path) -> Vec<String> {
    let mut dirs = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(folder).await else {
        return dirs;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_expected_folder(&name) {
            dirs.push(name);
        }
    }
    dirs.sort();
    dirs
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn defaults() -> MetaDefaults {
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

    #[tokio::test]
    async fn test_structured_meta_preferred() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("META.TXT"), b"Title: Legacy").unwrap();
        std::fs::write(dir.path().join("meta.yml"), b"Title: Alt").unwrap();
        let file = find_meta_file(dir.path()).await.unwrap();
        assert_eq!(file.format, MetaFormat::Structured);

        std::fs::write(dir.path().join("meta.yaml"), b"Title: Main").unwrap();
        let file = find_meta_file(dir.path()).await.unwrap();
        assert!(file.path.ends_with("meta.yaml"));
    }

    #[tokio::test]
    async fn test_load_curation_folder() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("k");
        std::fs::create_dir_all(folder.join("content").join("www.example.com")).unwrap();
        std::fs::create_dir_all(folder.join("Extras")).unwrap();
        std::fs::create_dir_all(folder.join("stray")).unwrap();
        std::fs::write(folder.join("meta.txt"), b"Title: Foo\nLaunch Command: foo.exe\n").unwrap();
        std::fs::write(folder.join("logo.png"), b"png").unwrap();
        std::fs::write(folder.join("content").join("www.example.com").join("a.swf"), b"12345")
            .unwrap();

        let loader = CurationLoader::new(root.path(), defaults());
        let curation = loader.load_curation_folder("k").await.unwrap();

        assert_eq!(curation.meta.title(), Some("Foo"));
        assert_eq!(curation.meta.field(MetaField::LaunchCommand), Some("foo.exe"));
        assert_eq!(curation.meta.field(MetaField::Platform), Some("Flash"));
        assert_eq!(
            curation.meta.field(MetaField::ApplicationPath),
            Some("FPSoftware\\Flash\\flashplayer.exe")
        );
        assert!(curation.thumbnail.exists);
        assert!(!curation.screenshot.exists);
        assert_eq!(curation.content.len(), 2);
        assert_eq!(curation.unused_dirs.as_slice(), ["stray".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_meta_falls_back_to_defaults() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("k");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("meta.yaml"), b"Title: [broken").unwrap();

        let loader = CurationLoader::new(root.path(), defaults());
        let curation = loader.load_curation_folder("k").await.unwrap();
        assert_eq!(curation.meta.title(), None);
        assert_eq!(curation.meta.field(MetaField::Library), Some("arcade"));
        assert!(folder.join("meta.yaml").exists());
    }

    #[tokio::test]
    async fn test_unused_dirs_need_a_meta_file() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("k");
        std::fs::create_dir_all(folder.join("stray")).unwrap();

        let loader = CurationLoader::new(root.path(), defaults());
        let curation = loader.load_curation_folder("k").await.unwrap();
        assert!(curation.unused_dirs.is_empty());
    }

    #[tokio::test]
    async fn test_load_all_skips_files() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("b")).unwrap();
        std::fs::create_dir_all(root.path().join("a")).unwrap();
        std::fs::write(root.path().join("notes.txt"), b"x").unwrap();

        let loader = CurationLoader::new(root.path(), defaults());
        let keys: Vec<String> = loader
            .load_all_curations()
            .await
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_learned_application_paths_fill_gaps() {
        let root = TempDir::new().unwrap();
        for (key, path) in [("a", "shock.exe"), ("b", "shock.exe"), ("c", "other.exe")] {
            let folder = root.path().join(key);
            std::fs::create_dir_all(&folder).unwrap();
            let meta = format!("Platform: Shockwave\nApplication Path: {}\n", path);
            std::fs::write(folder.join("meta.yaml"), meta).unwrap();
        }
        std::fs::create_dir_all(root.path().join("d")).unwrap();
        std::fs::write(root.path().join("d").join("meta.yaml"), "Platform: Shockwave\n").unwrap();

        let mut loader = CurationLoader::new(root.path(), defaults());
        loader.learn_application_paths().await;
        assert_eq!(
            loader.defaults().application_paths.get("Flash").map(String::as_str),
            Some("FPSoftware\\Flash\\flashplayer.exe")
        );

        let curation = loader.load_curation_folder("d").await.unwrap();
        assert_eq!(curation.meta.field(MetaField::ApplicationPath), Some("shock.exe"));
    }

    #[tokio::test]
    async fn test_missing_folder_is_not_found() {
        let root = TempDir::new().unwrap();
        let loader = CurationLoader::new(root.path(), defaults());
        assert!(matches!(
            loader.load_curation_folder("nope").await,
            Err(CurateError::NotFound(_))
        ));
    }
}
