use std::cmp::Ordering;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::EvalError;

/// One ranked entry of a diagnose response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedDiagnosis {
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub icd10_code: String,
    #[serde(default)]
    pub explanation: String,
}

/// Body of `POST /diagnose`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnoseResponse {
    #[serde(default)]
    pub diagnoses: Vec<RankedDiagnosis>,
    /// Duration of the attempt that produced this response, retries and
    /// backoff excluded. Set by the adapter, never read from the wire.
    #[serde(skip)]
    pub attempt_latency: Option<Duration>,
}

impl DiagnoseResponse {
    /// Entries with a code, ordered by rank. Unranked entries sort last and
    /// keep their response order.
    pub fn ranked(&self) -> Vec<&RankedDiagnosis> {
        let mut entries: Vec<&RankedDiagnosis> = self
            .diagnoses
            .iter()
            .filter(|d| !d.icd10_code.trim().is_empty())
            .collect();
        entries.sort_by(|a, b| match (a.rank, b.rank) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        entries
    }

    /// Predicted codes by rank, plus the explanation attached to the top one.
    pub fn predictions(&self) -> (Vec<String>, Option<String>) {
        let ranked = self.ranked();
        let explanation = ranked
            .first()
            .map(|d| d.explanation.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        let codes = ranked
            .into_iter()
            .map(|d| d.icd10_code.trim().to_string())
            .collect();
        (codes, explanation)
    }
}

/// Body of `POST /admin/reload-prompts`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadAck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagStatus {
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub total_vectors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptsStatus {
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub rag: RagStatus,
    #[serde(default)]
    pub prompts: PromptsStatus,
}

/// The live diagnosis service under optimization.
#[async_trait]
pub trait DiagnosisService: Send + Sync {
    /// Diagnose one free-text query. Retries are exhausted before an error
    /// is returned.
    async fn diagnose(&self, query: &str) -> Result<DiagnoseResponse, EvalError>;

    /// Ask the service to re-read its prompts file.
    async fn reload_prompts(&self) -> Result<ReloadAck>;

    /// Liveness and readiness check.
    async fn health(&self) -> Result<HealthReport>;

    /// Base URL, for log and error messages.
    fn base_url(&self) -> &str;
}
