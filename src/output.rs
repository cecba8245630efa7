use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CuesmithError, Result};

fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CuesmithError::Config(format!("Output path has no file name: {}", path.display())))?
        .to_string_lossy();
    Ok(path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple())))
}

/// Writes `contents` to `path` through a temporary sibling and a rename, so the
/// target is either fully written or untouched. Missing parent directories are
/// created.
pub async fn write_atomic<P: AsRef<Path>>(path: P, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let temp = temp_sibling(path)?;
    if let Err(e) = fs::write(&temp, contents.as_ref()).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp, path).await {
        warn!("Failed to move {} into place: {}", temp.display(), e);
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }

    debug!("Wrote {} bytes to {}", contents.as_ref().len(), path.display());
    Ok(())
}
