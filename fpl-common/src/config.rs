//! Configuration loading and root folder resolution
//!
//! Two sources feed a running curation session:
//! 1. **TOML bootstrap file**: launcher root, folder layout, logging, watcher
//!    timing, meta defaults and value suggestions
//! 2. **Built-in defaults**: used for anything the file does not specify
//!
//! A missing or malformed TOML file is never fatal: a warning is logged and
//! the built-in defaults are used.
//!
//! # Root Folder Priority
//!
//! 1. Command-line argument
//! 2. Environment variable (`FPL_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder`)
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable consulted for the launcher root folder
pub const ROOT_FOLDER_ENV: &str = "FPL_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Launcher root folder (optional, see [`resolve_root_folder`])
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Working curations folder, relative to the root folder
    #[serde(default = "default_curations_folder")]
    pub curations_folder: PathBuf,

    /// Content-serving folder of the install, relative to the root folder
    #[serde(default = "default_install_content_folder")]
    pub install_content_folder: PathBuf,

    /// Where imported curations are kept when saving is requested
    #[serde(default = "default_imported_curations_folder")]
    pub imported_curations_folder: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Filesystem watcher timing
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Default values injected into freshly parsed curation meta
    #[serde(default)]
    pub defaults: MetaDefaultsConfig,

    /// Known values used by curation validation
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            curations_folder: default_curations_folder(),
            install_content_folder: default_install_content_folder(),
            imported_curations_folder: default_imported_curations_folder(),
            logging: LoggingConfig::default(),
            watcher: WatcherConfig::default(),
            defaults: MetaDefaultsConfig::default(),
            suggestions: SuggestionsConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Absolute path of the working curations folder
    pub fn curations_root(&self, root_folder: &Path) -> PathBuf {
        root_folder.join(&self.curations_folder)
    }

    /// Absolute path of the install's content-serving folder
    pub fn install_content_root(&self, root_folder: &Path) -> PathBuf {
        root_folder.join(&self.install_content_folder)
    }

    pub fn imported_curations_root(&self, root_folder: &Path) -> PathBuf {
        root_folder.join(&self.imported_curations_folder)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Write-stability settings for the curations folder watcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// A path must be quiet this long before its event is acted on
    #[serde(default = "default_stability_ms")]
    pub stability_ms: u64,

    /// How often pending events are checked for stability
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_ms: default_stability_ms(),
            poll_ms: default_poll_ms(),
        }
    }
}

impl WatcherConfig {
    pub fn stability(&self) -> Duration {
        Duration::from_millis(self.stability_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

/// Default meta values, applied to fields left empty by a meta file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaDefaultsConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_play_mode")]
    pub play_mode: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_library")]
    pub library: String,
    /// Platform name → default application path
    #[serde(default)]
    pub application_paths: BTreeMap<String, String>,
}

impl Default for MetaDefaultsConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            play_mode: default_play_mode(),
            status: default_status(),
            platform: default_platform(),
            library: default_library(),
            application_paths: BTreeMap::new(),
        }
    }
}

/// Known values for curation validation
///
/// Empty platform and application path lists accept every value; the
/// library list is always enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionsConfig {
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub application_paths: Vec<String>,
    #[serde(default = "default_libraries")]
    pub libraries: Vec<String>,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            application_paths: Vec::new(),
            libraries: default_libraries(),
        }
    }
}

fn default_curations_folder() -> PathBuf {
    PathBuf::from("Curations").join("Working")
}

fn default_install_content_folder() -> PathBuf {
    PathBuf::from("Legacy").join("htdocs")
}

fn default_imported_curations_folder() -> PathBuf {
    PathBuf::from("Curations").join("Imported")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stability_ms() -> u64 {
    500
}

fn default_poll_ms() -> u64 {
    100
}

fn default_language() -> String {
    "en".to_string()
}

fn default_play_mode() -> String {
    "Single Player".to_string()
}

fn default_status() -> String {
    "Playable".to_string()
}

fn default_platform() -> String {
    "Flash".to_string()
}

fn default_library() -> String {
    "arcade".to_string()
}

fn default_libraries() -> Vec<String> {
    vec!["arcade".to_string(), "theatre".to_string()]
}

/// Load the TOML bootstrap file
///
/// Missing file → defaults with a warning. Malformed file → defaults with a
/// warning. Neither case terminates the caller.
pub fn load_toml_config(path: &Path) -> TomlConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Config file {} not readable ({}), using built-in defaults",
                path.display(),
                e
            );
            return TomlConfig::default();
        }
    };

    match toml::from_str::<TomlConfig>(&content) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!(
                "Config file {} is malformed ({}), using built-in defaults",
                path.display(),
                e
            );
            TomlConfig::default()
        }
    }
}

/// Write the TOML bootstrap file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    crate::fs_utils::write_atomic(path, content.as_bytes())?;
    Ok(())
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Default location of the TOML bootstrap file for the platform
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("fpl").join("curate.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("Flashpoint"))
            .unwrap_or_else(|| PathBuf::from("C:\\Flashpoint"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("flashpoint"))
            .unwrap_or_else(|| PathBuf::from("./flashpoint"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/fp"

            [watcher]
            stability_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/fp")));
        assert_eq!(config.watcher.stability_ms, 250);
        assert_eq!(config.watcher.poll_ms, 100);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.defaults.platform, "Flash");
        assert_eq!(config.curations_folder, PathBuf::from("Curations").join("Working"));
    }

    #[test]
    fn test_folder_helpers_join_root() {
        let config = TomlConfig::default();
        let root = Path::new("/fp");
        assert_eq!(config.curations_root(root), root.join("Curations").join("Working"));
        assert_eq!(config.install_content_root(root), root.join("Legacy").join("htdocs"));
    }
}
