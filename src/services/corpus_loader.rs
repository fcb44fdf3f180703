use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::domain::errors::{RefineError, RefineResult, StoreError};
use crate::domain::models::TestCase;

/// Loads the labeled test corpus from a directory of `*.json` files.
pub struct CorpusLoader;

impl CorpusLoader {
    /// Cases ordered by file name. Unparseable files are skipped with a warning;
    /// a missing directory or an empty result is fatal.
    pub async fn load(dir: &Path) -> RefineResult<Vec<TestCase>> {
        if !fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
            return Err(RefineError::CorpusNotFound(dir.to_path_buf()));
        }

        let mut files = list_json_files(dir).await?;
        files.sort();

        let mut cases = Vec::with_capacity(files.len());
        for path in &files {
            match read_case(path).await {
                Ok(case) => cases.push(case),
                Err(reason) => warn!(file = %path.display(), %reason, "Skipping test case"),
            }
        }

        if cases.is_empty() {
            return Err(RefineError::EmptyCorpus(dir.to_path_buf()));
        }

        info!(dir = %dir.display(), cases = cases.len(), skipped = files.len() - cases.len(), "Loaded test corpus");
        Ok(cases)
    }
}

async fn list_json_files(dir: &Path) -> RefineResult<Vec<PathBuf>> {
    let io_err = |e: std::io::Error| RefineError::Store(StoreError::io(dir, e));

    let mut entries = fs::read_dir(dir).await.map_err(io_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && entry.file_type().await.is_ok_and(|t| t.is_file()) {
            files.push(path);
        }
    }
    Ok(files)
}

async fn read_case(path: &Path) -> Result<TestCase, String> {
    let raw = fs::read_to_string(path).await.map_err(|e| e.to_string())?;
    let case: TestCase = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    if case.ground_truth.trim().is_empty() {
        return Err("empty ground truth".to_string());
    }
    Ok(case.normalized())
}
