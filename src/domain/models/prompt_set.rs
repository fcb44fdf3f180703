//! The versioned set of system prompts the diagnosis service runs with.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of the version stamp inside the prompts file.
pub const VERSION_KEY: &str = "_version";

/// The fixed set of prompt roles the service recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// Turns a free-text anamnesis into structured symptoms
    SymptomExtraction,
    /// Produces the ranked diagnosis from symptoms and retrieved protocols
    Diagnosis,
}

impl PromptRole {
    pub const ALL: [Self; 2] = [Self::SymptomExtraction, Self::Diagnosis];

    /// The key this role is stored under in the prompts file.
    pub const fn key(self) -> &'static str {
        match self {
            Self::SymptomExtraction => "symptom_extraction_system",
            Self::Diagnosis => "diagnosis_system",
        }
    }
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn default_symptom_extraction() -> String {
    concat!(
        "Ты медицинский ассистент. Извлеки из анамнеза ключевые симптомы. ",
        "Верни ТОЛЬКО JSON: {\"symptoms\": [...], \"duration\": null, ",
        "\"severity\": null, \"patient_info\": null}"
    )
    .to_string()
}

fn default_diagnosis() -> String {
    concat!(
        "Ты опытный врач. На основе анамнеза и выдержек из протоколов РК, ",
        "поставь наиболее вероятный диагноз. Обязательно укажи название и ссылку на протокол РК. ",
        "Формат: 1. Диагноз 2. МКБ-10: [код] 3. Протокол РК 4. Источник 5. Обоснование."
    )
    .to_string()
}

/// Typed view of the prompts file.
///
/// Known roles are named fields. Every other key lands in `extra` and is
/// written back untouched; underscore-prefixed keys are metadata and never
/// treated as prompt text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSet {
    #[serde(default = "default_symptom_extraction")]
    pub symptom_extraction_system: String,

    #[serde(default = "default_diagnosis")]
    pub diagnosis_system: String,

    #[serde(rename = "_version", default)]
    pub version: u64,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            symptom_extraction_system: default_symptom_extraction(),
            diagnosis_system: default_diagnosis(),
            version: 0,
            extra: BTreeMap::new(),
        }
    }
}

impl PromptSet {
    pub fn get(&self, role: PromptRole) -> &str {
        match role {
            PromptRole::SymptomExtraction => &self.symptom_extraction_system,
            PromptRole::Diagnosis => &self.diagnosis_system,
        }
    }

    pub fn set(&mut self, role: PromptRole, text: impl Into<String>) {
        let slot = match role {
            PromptRole::SymptomExtraction => &mut self.symptom_extraction_system,
            PromptRole::Diagnosis => &mut self.diagnosis_system,
        };
        *slot = text.into();
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, role: PromptRole, text: impl Into<String>) -> Self {
        self.set(role, text);
        self
    }

    /// Compare prompt text only, ignoring version and extra keys.
    pub fn same_prompts(&self, other: &Self) -> bool {
        PromptRole::ALL
            .into_iter()
            .all(|role| self.get(role) == other.get(role))
    }

    /// Extra keys that are neither metadata nor a known role.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.extra
            .keys()
            .map(String::as_str)
            .filter(|k| !k.starts_with('_'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_separates_roles_metadata_and_unknown_keys() {
        let raw = json!({
            "symptom_extraction_system": "extract",
            "diagnosis_system": "diagnose",
            "_version": 7,
            "_comment": "edited by hand",
            "triage_system": "future role"
        });

        let set: PromptSet = serde_json::from_value(raw).unwrap();
        assert_eq!(set.get(PromptRole::SymptomExtraction), "extract");
        assert_eq!(set.get(PromptRole::Diagnosis), "diagnose");
        assert_eq!(set.version, 7);
        assert!(set.extra.contains_key("_comment"));
        assert_eq!(set.unknown_keys().collect::<Vec<_>>(), vec!["triage_system"]);
    }

    #[test]
    fn test_missing_roles_fall_back_to_defaults() {
        let set: PromptSet = serde_json::from_value(json!({"_version": 1})).unwrap();
        assert!(set.same_prompts(&PromptSet::default()));
        assert_eq!(set.version, 1);
    }

    #[test]
    fn test_serialize_writes_version_key_and_extras() {
        let mut set = PromptSet::default();
        set.version = 3;
        set.extra.insert("_note".into(), json!("x"));

        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value[VERSION_KEY], json!(3));
        assert_eq!(value["_note"], json!("x"));
        assert!(value.get("version").is_none());
    }

    #[test]
    fn test_same_prompts_ignores_version() {
        let a = PromptSet::default();
        let mut b = a.clone();
        b.version = 42;
        assert!(a.same_prompts(&b));

        let c = a.clone().with(PromptRole::Diagnosis, "other");
        assert!(!a.same_prompts(&c));
    }
}
