//! Filesystem helpers shared across crates

use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Temp file used by [`write_atomic`] next to `path`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `data` to `path` atomically
///
/// The data is written to `<path>.tmp`, flushed, then renamed over `path`,
/// so readers never observe a partially written file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);
    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// [`write_atomic`] on the blocking pool
pub async fn write_atomic_async(path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Result<()> {
    let (path, data) = (path.into(), data.into());
    tokio::task::spawn_blocking(move || write_atomic(&path, &data))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
}

/// Strip a leading UTF-8 byte order mark
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Replace all back-slashes with forward slashes
pub fn fix_slashes(path: &str) -> String {
    path.replace('\\', "/")
}
