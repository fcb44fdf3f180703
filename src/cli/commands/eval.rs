//! Implementation of the `clinrefine eval` command: one evaluation pass over
//! the corpus with the prompts currently on disk. Nothing is refined; the
//! per-case report is written to `paths.eval_results_file`.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::ServiceOverrides;
use crate::cli::output::progress::progress_factory;
use crate::cli::output::{CommandOutput, TableFormatter, output};
use crate::domain::models::{CaseStatus, CodeMatch, Config, EvalResult, Metrics};
use crate::infrastructure::diagnosis::DiagnosisClient;
use crate::infrastructure::storage::PromptStore;
use crate::infrastructure::storage::atomic::write_json_atomic;
use crate::services::{CorpusLoader, Evaluator};

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// How predicted codes are compared with the labels (exact or category)
    #[arg(long = "match", value_name = "MODE", default_value_t = CodeMatch::Exact)]
    pub match_mode: CodeMatch,

    /// Failing cases to list
    #[arg(long, default_value_t = 10)]
    pub show_failures: usize,

    #[command(flatten)]
    pub overrides: ServiceOverrides,
}

#[derive(Debug, Serialize)]
pub struct EvalOutput {
    pub match_mode: CodeMatch,
    pub prompts_version: u64,
    pub metrics: Metrics,
    /// Misses and errors, in corpus order, capped at `--show-failures`
    pub failures: Vec<EvalResult>,
    pub total_failures: usize,
    pub results_file: PathBuf,
}

impl EvalOutput {
    fn new(
        match_mode: CodeMatch,
        prompts_version: u64,
        results: &[EvalResult],
        limit: usize,
        results_file: &Path,
    ) -> Self {
        let failing: Vec<&EvalResult> = results
            .iter()
            .filter(|r| r.is_error() || !r.is_top1_hit(match_mode))
            .collect();
        Self {
            match_mode,
            prompts_version,
            metrics: Metrics::aggregate(results, match_mode),
            total_failures: failing.len(),
            failures: failing.into_iter().take(limit).cloned().collect(),
            results_file: results_file.to_path_buf(),
        }
    }
}

impl CommandOutput for EvalOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut out = format!(
            "{}\n{}",
            style(format!("Evaluation of prompts version {}", self.prompts_version)).bold(),
            formatter.format_metrics(&self.metrics, self.match_mode)
        );
        if !self.failures.is_empty() {
            let shown: Vec<&EvalResult> = self.failures.iter().collect();
            out.push_str(&format!(
                "\n\n{}\n{}",
                style(format!("Failing cases ({} of {})", shown.len(), self.total_failures)).bold(),
                formatter.format_failures(&shown)
            ));
        }
        out.push_str(&format!("\n\nReport: {}", self.results_file.display()));
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Per-case line of the report file.
#[derive(Debug, Serialize)]
pub struct CaseReport<'a> {
    pub case_id: &'a str,
    pub ground_truth: &'a str,
    pub valid_codes: &'a [String],
    /// Top three predictions
    pub predicted: &'a [String],
    pub status: CaseStatus,
    pub latency_s: f64,
}

/// Contents of the report file.
#[derive(Debug, Serialize)]
pub struct EvalReport<'a> {
    pub match_mode: CodeMatch,
    pub prompts_version: u64,
    pub accuracy_at_1: f64,
    pub recall_at_3: f64,
    pub total: usize,
    /// Cases that got an answer; the ratios' denominator
    pub success: usize,
    pub correct_at_1: usize,
    pub hit_at_3: usize,
    pub errors: usize,
    pub total_time_s: f64,
    pub results: Vec<CaseReport<'a>>,
}

impl<'a> EvalReport<'a> {
    pub fn new(
        match_mode: CodeMatch,
        prompts_version: u64,
        results: &'a [EvalResult],
        metrics: &Metrics,
        elapsed: Duration,
    ) -> Self {
        Self {
            match_mode,
            prompts_version,
            accuracy_at_1: round_to(metrics.accuracy_at_1, 4),
            recall_at_3: round_to(metrics.recall_at_3, 4),
            total: metrics.total_cases,
            success: metrics.evaluated,
            correct_at_1: metrics.exact_hits,
            hit_at_3: metrics.recall_hits,
            errors: metrics.error_count,
            total_time_s: round_to(elapsed.as_secs_f64(), 1),
            results: results
                .iter()
                .map(|r| CaseReport {
                    case_id: &r.case_id,
                    ground_truth: &r.ground_truth,
                    valid_codes: &r.valid_codes,
                    predicted: r.top_three(),
                    status: r.status(match_mode),
                    latency_s: round_to(r.latency_secs(), 1),
                })
                .collect(),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

pub async fn execute(args: &EvalArgs, config: &Config, json_mode: bool) -> Result<()> {
    let service = Arc::new(DiagnosisClient::new(&config.server).context("Failed to build diagnosis client")?);
    let store = PromptStore::new(&config.paths.prompts_file);
    let prompts = store.load().await.context("Failed to read the prompts file")?;
    let cases = CorpusLoader::load(&config.paths.test_dir)
        .await
        .context("Failed to load test cases")?;

    // the service must run the prompts on disk for the version to mean anything
    if !store.push_reload(service.as_ref()).await {
        warn!(version = prompts.version, "Evaluating with whatever prompts the service has loaded");
    }

    let evaluator = Evaluator::new(service, config.refine.parallelism);
    let progress = progress_factory(json_mode)(cases.len() as u64);
    let started = Instant::now();
    let results = evaluator.evaluate(&cases, &progress).await;
    let elapsed = started.elapsed();

    let results_file = &config.paths.eval_results_file;
    let summary = EvalOutput::new(
        args.match_mode,
        prompts.version,
        &results,
        args.show_failures,
        results_file,
    );
    let report = EvalReport::new(args.match_mode, prompts.version, &results, &summary.metrics, elapsed);
    write_json_atomic(results_file, &report)
        .await
        .with_context(|| format!("Failed to write {}", results_file.display()))?;

    output(&summary, json_mode);
    Ok(())
}
