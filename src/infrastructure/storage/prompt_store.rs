use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::atomic::write_json_atomic;
use crate::domain::StoreError;
use crate::domain::models::{PromptSet, VERSION_KEY};
use crate::domain::ports::DiagnosisService;

/// Versioned prompts file shared with the diagnosis service.
///
/// This process is the only writer. The service re-reads the file when
/// [`push_reload`](Self::push_reload) succeeds.
pub struct PromptStore {
    path: PathBuf,
    last_good: RwLock<Option<PromptSet>>,
}

impl PromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: RwLock::new(None),
        }
    }

    /// Read the file. A missing file yields the built-in defaults; a file that
    /// does not parse yields the last good copy (or the defaults).
    pub async fn load(&self) -> Result<PromptSet, StoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Prompts file not found, using defaults");
                return Ok(PromptSet::default());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        match parse_prompt_set(&self.path, &raw) {
            Ok(set) => {
                for key in set.unknown_keys() {
                    warn!(key, "Unknown key in prompts file, preserving as-is");
                }
                *self.last_good.write().await = Some(set.clone());
                Ok(set)
            }
            Err(e) => {
                warn!(error = %e, "Prompts file is unreadable, keeping last good copy");
                Ok(self.last_good.read().await.clone().unwrap_or_default())
            }
        }
    }

    /// Merge the role fields into the file, bump `_version`, write atomically.
    ///
    /// The new version is `max(on-disk version, set.version) + 1`, so it
    /// strictly increases on every write. Returns the new version.
    pub async fn save(&self, set: &PromptSet) -> Result<u64, StoreError> {
        let mut merged = self.read_object().await;
        let disk_version = merged.get(VERSION_KEY).and_then(Value::as_u64).unwrap_or(0);
        let version = disk_version.max(set.version) + 1;

        if let Value::Object(fields) = serde_json::to_value(set)? {
            merged.extend(fields);
        }
        merged.insert(VERSION_KEY.to_string(), Value::from(version));

        write_json_atomic(&self.path, &merged).await?;

        let mut saved = set.clone();
        saved.version = version;
        *self.last_good.write().await = Some(saved);

        info!(path = %self.path.display(), version, "Prompts saved");
        Ok(version)
    }

    /// Ask the service to reload. Failure is logged and reported as `false`.
    pub async fn push_reload(&self, service: &dyn DiagnosisService) -> bool {
        match service.reload_prompts().await {
            Ok(ack) => {
                info!(
                    status = %ack.status,
                    version = ?ack.version,
                    keys = ?ack.keys,
                    "Service reloaded prompts"
                );
                true
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Service did not reload prompts; check {}/admin/reload-prompts",
                    service.base_url()
                );
                false
            }
        }
    }

    /// The current file as a JSON object, or empty when absent or unusable.
    async fn read_object(&self) -> Map<String, Value> {
        let Ok(raw) = fs::read_to_string(&self.path).await else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn parse_prompt_set(path: &Path, raw: &str) -> Result<PromptSet, StoreError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| StoreError::parse(path, e))?;
    if !value.is_object() {
        return Err(StoreError::NotAnObject(path.to_path_buf()));
    }
    serde_json::from_value(value).map_err(|e| StoreError::parse(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PromptRole;
    use serde_json::json;

    fn long(text: &str) -> String {
        format!("{text} {}", "x".repeat(60))
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("prompts.json"));

        let set = store.load().await.unwrap();
        assert!(set.same_prompts(&PromptSet::default()));
        assert_eq!(set.version, 0);
    }

    #[tokio::test]
    async fn test_save_preserves_unknown_and_metadata_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(
            &path,
            json!({
                "symptom_extraction_system": "old",
                "diagnosis_system": "old",
                "triage_system": "keep me",
                "_comment": "hand edited",
                "_version": 4
            })
            .to_string(),
        )
        .unwrap();

        let store = PromptStore::new(&path);
        let set = store.load().await.unwrap();
        let version = store
            .save(&set.with(PromptRole::Diagnosis, long("new")))
            .await
            .unwrap();
        assert_eq!(version, 5);

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["triage_system"], "keep me");
        assert_eq!(on_disk["_comment"], "hand edited");
        assert_eq!(on_disk[VERSION_KEY], 5);
        assert!(on_disk["diagnosis_system"].as_str().unwrap().starts_with("new"));
    }

    #[tokio::test]
    async fn test_version_strictly_increases() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("prompts.json"));
        let set = PromptSet::default();

        let v1 = store.save(&set).await.unwrap();
        let v2 = store.save(&set).await.unwrap();
        let mut ahead = set.clone();
        ahead.version = 100;
        let v3 = store.save(&ahead).await.unwrap();

        assert!(v1 < v2);
        assert_eq!(v3, 101);
        assert_eq!(store.load().await.unwrap().version, 101);
    }

    #[tokio::test]
    async fn test_parse_error_returns_last_good_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        let store = PromptStore::new(&path);

        let tuned = PromptSet::default().with(PromptRole::Diagnosis, long("tuned"));
        store.save(&tuned).await.unwrap();
        assert!(store.load().await.unwrap().same_prompts(&tuned));

        std::fs::write(&path, "{ not json").unwrap();
        let loaded = store.load().await.unwrap();
        assert!(loaded.same_prompts(&tuned));

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(store.load().await.unwrap().same_prompts(&tuned));
    }

    #[tokio::test]
    async fn test_non_ascii_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        let store = PromptStore::new(&path);

        store
            .save(&PromptSet::default().with(PromptRole::Diagnosis, long("Диагноз")))
            .await
            .unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Диагноз"));
    }
}
