//! Per-iteration audit records and the best-observed state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::Metrics;
use super::prompt_set::PromptSet;

/// One completed optimizer iteration. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration index
    pub iteration: u32,
    pub metrics: Metrics,
    /// Error-free cases whose top-1 prediction missed
    pub failures: usize,
    /// Version of the prompts that were evaluated
    pub prompts_version: u64,
    /// The prompts active after this iteration's commit
    pub prompts: PromptSet,
    pub failure_analysis: String,
    pub improvement_notes: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IterationRecord {
    /// One-line digest fed back to the refiner as run history.
    pub fn digest(&self) -> String {
        format!(
            "Iteration {}: Accuracy@1={:.1}%, Recall@3={:.1}%, failures={}. Changes: {}",
            self.iteration,
            self.metrics.accuracy_pct(),
            self.metrics.recall_pct(),
            self.failures,
            super::evaluation::truncate_chars(&self.improvement_notes, 200),
        )
    }
}

/// Best accuracy seen so far and the prompts that produced it.
///
/// Only ever replaced by a strictly higher accuracy, so it never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct BestState {
    pub accuracy: f64,
    pub iteration: u32,
    pub prompts: PromptSet,
}

impl BestState {
    /// Offer an observation; returns `true` when it became the new best.
    pub fn offer(best: &mut Option<Self>, accuracy: f64, iteration: u32, prompts: &PromptSet) -> bool {
        let improved = best.as_ref().map_or(true, |b| accuracy > b.accuracy);
        if improved {
            *best = Some(Self {
                accuracy,
                iteration,
                prompts: prompts.clone(),
            });
        }
        improved
    }
}
