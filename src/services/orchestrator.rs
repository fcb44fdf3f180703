//! The optimization loop.
//!
//! Each iteration evaluates the active prompts against the corpus, asks the
//! judge why the misses happened, asks the refiner for better prompts and
//! commits the candidate. The best-scoring prompts are tracked throughout and
//! restored as active when the loop ends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::corpus_loader::CorpusLoader;
use super::evaluator::Evaluator;
use super::failure_sampler::FailureSample;
use super::judge::Judge;
use super::refiner::Refiner;
use crate::domain::errors::{RefineError, RefineResult};
use crate::domain::models::{
    BestState, CodeMatch, IterationRecord, LoopPhase, Metrics, PathsConfig, PromptSet, RefineConfig,
    TestCase,
};
use crate::domain::ports::{DiagnosisService, LlmClient};
use crate::infrastructure::storage::{HistoryLedger, PromptStore};

const NO_FAILURES_NOTE: &str = "No failures: every case matched at top-1.";
const NO_ANALYSIS_NOTE: &str = "No failure analysis: prompts unchanged.";

/// Everything a run needs, built once at startup.
pub struct RefineContext {
    pub service: Arc<dyn DiagnosisService>,
    pub llm: Arc<dyn LlmClient>,
    pub settings: RefineConfig,
    pub paths: PathsConfig,
    /// Creates the progress bar shown while a pass is evaluated
    pub progress: fn(u64) -> ProgressBar,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub iterations: u32,
    pub total_cases: usize,
    pub first_accuracy: f64,
    pub last_accuracy: f64,
    pub best_accuracy: f64,
    pub best_iteration: u32,
    /// `best_accuracy - first_accuracy`
    pub best_delta: f64,
    /// `last_accuracy - first_accuracy`
    pub last_delta: f64,
    pub records: Vec<IterationRecord>,
    pub prompts_file: PathBuf,
    pub best_prompts_file: PathBuf,
    pub history_file: PathBuf,
    pub summary_file: PathBuf,
}

type Observer = Box<dyn Fn(&IterationRecord) + Send + Sync>;

/// Drives the loop through its phases.
pub struct Orchestrator {
    ctx: RefineContext,
    phase: LoopPhase,
    store: PromptStore,
    best_store: PromptStore,
    history: HistoryLedger,
    evaluator: Evaluator,
    judge: Judge,
    refiner: Refiner,
    observer: Option<Observer>,
}

impl Orchestrator {
    pub fn new(ctx: RefineContext) -> Self {
        let settings = &ctx.settings;
        Self {
            phase: LoopPhase::Init,
            store: PromptStore::new(&ctx.paths.prompts_file),
            best_store: PromptStore::new(&ctx.paths.best_prompts_file),
            history: HistoryLedger::new(&ctx.paths.history_file),
            evaluator: Evaluator::new(ctx.service.clone(), settings.parallelism),
            judge: Judge::new(ctx.llm.clone(), settings.max_query_chars),
            refiner: Refiner::new(
                ctx.llm.clone(),
                settings.min_prompt_chars,
                settings.prompt_language.clone(),
            ),
            observer: None,
            ctx,
        }
    }

    /// Called with every record right after it is appended to the history.
    #[must_use]
    pub fn with_observer(mut self, observer: impl Fn(&IterationRecord) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    fn advance(&mut self, next: LoopPhase) -> RefineResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(RefineError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
        Ok(())
    }

    pub async fn run(mut self) -> RefineResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let iterations = self.ctx.settings.iterations;
        info!(%run_id, iterations, server = self.ctx.service.base_url(), "Starting optimization run");

        self.check_health().await?;
        let cases = CorpusLoader::load(&self.ctx.paths.test_dir).await?;

        let mut best: Option<BestState> = None;
        for iteration in 1..=iterations {
            self.run_iteration(iteration, &cases, &mut best).await?;

            if iteration < iterations && self.ctx.settings.iteration_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.ctx.settings.iteration_pause_ms)).await;
            }
        }

        self.advance(LoopPhase::RestoreBest)?;
        if let Some(best) = &best {
            info!(
                iteration = best.iteration,
                accuracy = %format!("{:.1}%", best.accuracy * 100.0),
                "Restoring best prompts as active"
            );
            self.store.save(&best.prompts).await?;
            self.store.push_reload(self.ctx.service.as_ref()).await;
        }

        self.advance(LoopPhase::Done)?;
        self.history.write_csv(&self.ctx.paths.summary_file).await?;

        Ok(self.summarize(run_id, cases.len(), best.as_ref()))
    }

    async fn check_health(&self) -> RefineResult<()> {
        let service = self.ctx.service.as_ref();
        let report = service
            .health()
            .await
            .map_err(|e| RefineError::ServiceUnreachable {
                url: service.base_url().to_string(),
                reason: format!("{e:#}"),
            })?;

        if !report.rag.loaded {
            warn!("Service reports its retrieval index is not loaded; results will be poor");
        }
        info!(
            status = %report.status,
            vectors = report.rag.total_vectors,
            prompts_version = ?report.prompts.version,
            "Service is healthy"
        );
        Ok(())
    }

    async fn run_iteration(
        &mut self,
        iteration: u32,
        cases: &[TestCase],
        best: &mut Option<BestState>,
    ) -> RefineResult<()> {
        let last = iteration == self.ctx.settings.iterations;
        let started_at = Utc::now();
        info!(iteration, total = self.ctx.settings.iterations, "Iteration started");

        self.advance(LoopPhase::Evaluate)?;
        let prompts = self.store.load().await?;
        let progress = (self.ctx.progress)(cases.len() as u64);
        let results = self.evaluator.evaluate(cases, &progress).await;
        let metrics = Metrics::aggregate(&results, CodeMatch::Exact);
        info!(
            iteration,
            accuracy = %format!("{:.1}%", metrics.accuracy_pct()),
            recall = %format!("{:.1}%", metrics.recall_pct()),
            errors = metrics.error_count,
            latency_avg_s = %format!("{:.2}", metrics.latency_avg_s),
            latency_p95_s = %format!("{:.2}", metrics.latency_p95_s),
            "Evaluation complete"
        );

        self.advance(LoopPhase::Analyze)?;
        let sample = FailureSample::collect(&results, self.ctx.settings.max_failures_for_judge);

        let (analysis, analyzed) = if sample.is_empty() {
            (NO_FAILURES_NOTE.to_string(), true)
        } else {
            match self.judge.analyze(&sample, &prompts, &metrics, iteration).await {
                Ok(text) => (text, true),
                Err(e) => {
                    warn!(error = %e, "Judge failed, prompts stay unchanged this iteration");
                    (format!("Failure analysis unavailable: {e}"), false)
                }
            }
        };

        let (candidate, notes) = if last {
            (prompts.clone(), "Final iteration: prompts not refined.".to_string())
        } else if sample.is_empty() {
            (prompts.clone(), "No failures: prompts unchanged.".to_string())
        } else if !analyzed {
            (prompts.clone(), NO_ANALYSIS_NOTE.to_string())
        } else {
            self.advance(LoopPhase::Refine)?;
            let history = self.history.summary();
            match self
                .refiner
                .refine(&prompts, &analysis, &metrics, iteration, &history)
                .await
            {
                Ok(refinement) => (refinement.prompts, refinement.notes),
                Err(e) => {
                    warn!(error = %e, "Refiner failed, keeping current prompts");
                    (prompts.clone(), format!("Refinement failed: {e}"))
                }
            }
        };

        self.advance(LoopPhase::Commit)?;
        if BestState::offer(best, metrics.accuracy_at_1, iteration, &prompts) {
            info!(iteration, "New best accuracy, saving best prompts");
            self.best_store.save(&prompts).await?;
        }

        let active = if candidate.same_prompts(&prompts) {
            debug!(iteration, "Candidate prompts unchanged, nothing to commit");
            prompts.clone()
        } else {
            let version = self.store.save(&candidate).await?;
            self.store.push_reload(self.ctx.service.as_ref()).await;
            PromptSet { version, ..candidate }
        };

        let record = IterationRecord {
            iteration,
            metrics,
            failures: sample.total,
            prompts_version: prompts.version,
            prompts: active,
            failure_analysis: analysis,
            improvement_notes: notes,
            started_at,
            finished_at: Utc::now(),
        };
        self.history.append(record).await?;
        if let (Some(observer), Some(record)) = (&self.observer, self.history.records().last()) {
            observer(record);
        }
        Ok(())
    }

    fn summarize(&self, run_id: Uuid, total_cases: usize, best: Option<&BestState>) -> RunSummary {
        let records = self.history.records();
        let accuracy = |r: Option<&IterationRecord>| r.map_or(0.0, |r| r.metrics.accuracy_at_1);
        let first_accuracy = accuracy(records.first());
        let last_accuracy = accuracy(records.last());
        let (best_accuracy, best_iteration) = best.map_or((0.0, 0), |b| (b.accuracy, b.iteration));

        let paths = &self.ctx.paths;
        RunSummary {
            run_id,
            iterations: u32::try_from(records.len()).unwrap_or(u32::MAX),
            total_cases,
            first_accuracy,
            last_accuracy,
            best_accuracy,
            best_iteration,
            best_delta: best_accuracy - first_accuracy,
            last_delta: last_accuracy - first_accuracy,
            records: records.to_vec(),
            prompts_file: paths.prompts_file.clone(),
            best_prompts_file: paths.best_prompts_file.clone(),
            history_file: paths.history_file.clone(),
            summary_file: paths.summary_file.clone(),
        }
    }
}
