//! Implementation of the `clinrefine run` command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::sync::Arc;

use super::ServiceOverrides;
use crate::cli::output::progress::progress_factory;
use crate::cli::output::{CommandOutput, TableFormatter, output};
use crate::domain::models::{Config, IterationRecord};
use crate::infrastructure::diagnosis::DiagnosisClient;
use crate::infrastructure::llm::{ChatClient, ChatClientConfig};
use crate::services::{Orchestrator, RefineContext, RunSummary};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of optimization iterations
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// Model used by the judge and the refiner
    #[arg(short, long)]
    pub model: Option<String>,

    /// API key for the model endpoint
    #[arg(long)]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub overrides: ServiceOverrides,
}

impl RunArgs {
    pub fn apply(&self, config: &mut Config) {
        self.overrides.apply(config);
        if let Some(n) = self.iterations {
            config.refine.iterations = n;
        }
        if let Some(model) = &self.model {
            config.llm.model.clone_from(model);
        }
        if let Some(key) = &self.api_key {
            config.llm.api_key = Some(key.clone());
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub summary: RunSummary,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let pct = |v: f64| format!("{:.1}%", v * 100.0);
        let delta = |v: f64| {
            let text = format!("{:+.1} pp", v * 100.0);
            if v > 0.0 {
                style(text).green().to_string()
            } else if v < 0.0 {
                style(text).red().to_string()
            } else {
                text
            }
        };

        let lines = [
            style(format!("Run {} finished: {} iterations over {} cases", s.run_id, s.iterations, s.total_cases))
                .bold()
                .to_string(),
            TableFormatter::new().format_iterations(&s.records),
            format!("First accuracy: {}", pct(s.first_accuracy)),
            format!(
                "Best accuracy:  {} (iteration {}, {})",
                pct(s.best_accuracy),
                s.best_iteration,
                delta(s.best_delta)
            ),
            format!("Last accuracy:  {} ({})", pct(s.last_accuracy), delta(s.last_delta)),
            String::new(),
            format!("Active prompts (restored best): {}", s.prompts_file.display()),
            format!("Best prompts:                   {}", s.best_prompts_file.display()),
            format!("History:                        {}", s.history_file.display()),
            format!("Summary CSV:                    {}", s.summary_file.display()),
        ];
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn print_iteration(record: &IterationRecord) {
    let m = &record.metrics;
    println!(
        "{} Acc@1 {:.1}%  Rec@3 {:.1}%  failures {}  errors {}",
        style(format!("[iteration {}]", record.iteration)).cyan().bold(),
        m.accuracy_pct(),
        m.recall_pct(),
        record.failures,
        m.error_count,
    );
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let api_key = config
        .llm
        .resolve_api_key()
        .context("No API key for the model endpoint: set llm.api_key, CLINREFINE_LLM_API_KEY or OPENAI_API_KEY")?;

    let service = Arc::new(DiagnosisClient::new(&config.server).context("Failed to build diagnosis client")?);
    let llm = Arc::new(
        ChatClient::new(ChatClientConfig::from_config(&config.llm, &config.retry, api_key))
            .context("Failed to build model client")?,
    );

    let ctx = RefineContext {
        service,
        llm,
        settings: config.refine.clone(),
        paths: config.paths.clone(),
        progress: progress_factory(json_mode),
    };

    let mut orchestrator = Orchestrator::new(ctx);
    if !json_mode {
        orchestrator = orchestrator.with_observer(print_iteration);
    }
    let summary = orchestrator.run().await.context("Optimization run failed")?;

    output(&RunOutput { summary }, json_mode);
    Ok(())
}
