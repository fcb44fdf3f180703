//! Implementation of the `clinrefine health` command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;

use crate::cli::output::progress::create_spinner;
use crate::cli::output::{CommandOutput, output};
use crate::domain::models::Config;
use crate::domain::ports::{DiagnosisService, HealthReport};
use crate::infrastructure::diagnosis::DiagnosisClient;

#[derive(Args, Debug, Default)]
pub struct HealthArgs {
    /// Diagnosis service base URL
    #[arg(short, long)]
    pub server: Option<String>,
}

impl HealthArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.server.url.clone_from(server);
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthOutput {
    pub url: String,
    #[serde(flatten)]
    pub report: HealthReport,
}

impl CommandOutput for HealthOutput {
    fn to_human(&self) -> String {
        let rag = if self.report.rag.loaded {
            style(format!("loaded ({} vectors)", self.report.rag.total_vectors)).green()
        } else {
            style("NOT loaded".to_string()).red().bold()
        };
        let version = self
            .report
            .prompts
            .version
            .map_or_else(|| "unknown".to_string(), |v| v.to_string());

        let mut lines = vec![
            format!("{} {}", style("Service").bold(), self.url),
            format!("  status:  {}", self.report.status),
            format!("  index:   {rag}"),
            format!("  prompts: version {version}"),
        ];
        if let Some(file) = &self.report.prompts.file {
            lines.push(format!("           {file}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let client = DiagnosisClient::new(&config.server).context("Failed to build diagnosis client")?;

    let spinner = (!json_mode).then(|| create_spinner(format!("Probing {}", client.base_url())));
    let report = client.health().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = report.with_context(|| format!("Diagnosis service unreachable at {}", client.base_url()))?;

    output(
        &HealthOutput {
            url: client.base_url().to_string(),
            report,
        },
        json_mode,
    );
    Ok(())
}
