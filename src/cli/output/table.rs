//! Table output for iteration history, metrics and failing cases using comfy-table.

use crate::domain::models::{CodeMatch, EvalResult, IterationRecord, Metrics, truncate_chars};
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets};
use std::env;

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per iteration; the best accuracy is highlighted.
    pub fn format_iterations(&self, records: &[IterationRecord]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "Iter", "Acc@1", "Rec@3", "Failures", "Errors", "Avg (s)", "P95 (s)", "Version",
        ]));

        let best = records
            .iter()
            .map(|r| r.metrics.accuracy_at_1)
            .fold(f64::NEG_INFINITY, f64::max);

        for record in records {
            let m = &record.metrics;
            let accuracy = Cell::new(format!("{:.1}%", m.accuracy_pct()));
            let accuracy = if self.use_colors && (m.accuracy_at_1 - best).abs() < f64::EPSILON {
                accuracy.fg(Color::Green).add_attribute(Attribute::Bold)
            } else {
                accuracy
            };
            let errors = Cell::new(m.error_count);
            let errors = if self.use_colors && m.error_count > 0 {
                errors.fg(Color::Red)
            } else {
                errors
            };

            table.add_row(vec![
                Cell::new(record.iteration),
                accuracy,
                Cell::new(format!("{:.1}%", m.recall_pct())),
                Cell::new(record.failures),
                errors,
                Cell::new(format!("{:.2}", m.latency_avg_s)),
                Cell::new(format!("{:.2}", m.latency_p95_s)),
                Cell::new(record.prompts_version),
            ]);
        }

        table.to_string()
    }

    pub fn format_metrics(&self, metrics: &Metrics, mode: CodeMatch) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Metric", "Value"]));

        let rows = [
            ("Match mode", mode.to_string()),
            ("Cases", metrics.total_cases.to_string()),
            ("Evaluated", metrics.evaluated.to_string()),
            ("Errors", metrics.error_count.to_string()),
            (
                "Accuracy@1",
                format!("{:.1}% ({}/{})", metrics.accuracy_pct(), metrics.exact_hits, metrics.evaluated),
            ),
            (
                "Recall@3",
                format!("{:.1}% ({}/{})", metrics.recall_pct(), metrics.recall_hits, metrics.evaluated),
            ),
            ("Latency avg", format!("{:.2}s", metrics.latency_avg_s)),
            ("Latency p95", format!("{:.2}s", metrics.latency_p95_s)),
        ];
        for (name, value) in rows {
            table.add_row(vec![Cell::new(name), Cell::new(value)]);
        }

        table.to_string()
    }

    /// Failing or errored cases with what the service predicted.
    pub fn format_failures(&self, results: &[&EvalResult]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Case", "Expected", "Predicted (top-3)", "Error"]));

        for r in results {
            let predicted = if r.predicted_codes.is_empty() {
                "-".to_string()
            } else {
                r.top_three().join(", ")
            };
            let error = r
                .error
                .as_ref()
                .map_or_else(String::new, |e| truncate_chars(&e.to_string(), 60));
            let error = if self.use_colors && !error.is_empty() {
                Cell::new(error).fg(Color::Red)
            } else {
                Cell::new(error)
            };
            table.add_row(vec![
                Cell::new(&r.case_id),
                Cell::new(&r.ground_truth),
                Cell::new(predicted),
                error,
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(u16::try_from(width).unwrap_or(u16::MAX));
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM"), Ok(term) if term == "dumb")
}
