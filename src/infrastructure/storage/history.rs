use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use super::atomic::{write_atomic, write_json_atomic};
use crate::domain::StoreError;
use crate::domain::models::IterationRecord;

const CSV_HEADER: &str = "iteration,accuracy_at_1,recall_at_3,failures,latency_avg_s";
const EMPTY_HISTORY: &str = "(first iteration, no history yet)";

/// Append-only iteration history, persisted as a JSON array after every append.
pub struct HistoryLedger {
    path: PathBuf,
    records: Vec<IterationRecord>,
}

impl HistoryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    /// Append a record and rewrite the history file.
    pub async fn append(&mut self, record: IterationRecord) -> Result<(), StoreError> {
        self.records.push(record);
        write_json_atomic(&self.path, &self.records).await?;
        info!(path = %self.path.display(), records = self.records.len(), "History saved");
        Ok(())
    }

    /// One line per prior iteration, for the refiner.
    pub fn summary(&self) -> String {
        if self.records.is_empty() {
            return EMPTY_HISTORY.to_string();
        }
        self.records
            .iter()
            .map(IterationRecord::digest)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Per-iteration CSV; ratios rendered as percentages.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(64 * (self.records.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');
        for r in &self.records {
            let _ = writeln!(
                out,
                "{},{:.2},{:.2},{},{:.3}",
                r.iteration,
                r.metrics.accuracy_pct(),
                r.metrics.recall_pct(),
                r.failures,
                r.metrics.latency_avg_s
            );
        }
        out
    }

    pub async fn write_csv(&self, path: &Path) -> Result<(), StoreError> {
        write_atomic(path, self.to_csv().as_bytes()).await?;
        info!(path = %path.display(), "CSV summary saved");
        Ok(())
    }
}
