use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;

use crate::domain::StoreError;

/// Write `contents` to `path` through a sibling temp file and a rename, so
/// readers never observe a partially written file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, contents)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

/// Pretty-printed JSON, non-ASCII kept as-is.
pub async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    write_atomic(path, body.as_bytes()).await
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}
