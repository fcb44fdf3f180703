//! Summary statistics over one evaluation pass.

use serde::{Deserialize, Serialize};

use super::evaluation::{CodeMatch, EvalResult};

/// Minimum error-free samples before p95 is interpolated instead of taking the max.
const MIN_P95_SAMPLES: usize = 4;

/// Metrics for one evaluation pass. Ratios are fractions in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_cases: usize,
    pub error_count: usize,
    /// Error-free cases; the denominator of both ratios
    pub evaluated: usize,
    pub exact_hits: usize,
    pub recall_hits: usize,
    pub accuracy_at_1: f64,
    pub recall_at_3: f64,
    pub latency_avg_s: f64,
    pub latency_p95_s: f64,
}

impl Metrics {
    /// Reduce a result set. Insensitive to the order of `results`.
    pub fn aggregate(results: &[EvalResult], mode: CodeMatch) -> Self {
        let ok: Vec<&EvalResult> = results.iter().filter(|r| !r.is_error()).collect();
        let evaluated = ok.len();

        let exact_hits = ok.iter().filter(|r| r.is_top1_hit(mode)).count();
        let recall_hits = ok.iter().filter(|r| r.is_top3_hit(mode)).count();

        let mut latencies: Vec<f64> = ok.iter().map(|r| r.latency_secs()).collect();
        latencies.sort_by(f64::total_cmp);

        Self {
            total_cases: results.len(),
            error_count: results.len() - evaluated,
            evaluated,
            exact_hits,
            recall_hits,
            accuracy_at_1: ratio(exact_hits, evaluated),
            recall_at_3: ratio(recall_hits, evaluated),
            latency_avg_s: mean(&latencies),
            latency_p95_s: p95(&latencies),
        }
    }

    /// Accuracy@1 as a percentage, for display and CSV output.
    pub fn accuracy_pct(&self) -> f64 {
        self.accuracy_at_1 * 100.0
    }

    /// Recall@3 as a percentage, for display and CSV output.
    pub fn recall_pct(&self) -> f64 {
        self.recall_at_3 * 100.0
    }
}

fn ratio(hits: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        hits as f64 / denominator as f64
    }
}

fn mean(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// 95th percentile: the last cut point of 20 exclusive-method quantiles,
/// or the maximum when the sample is too small to interpolate.
fn p95(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n < MIN_P95_SAMPLES {
        return sorted.last().copied().unwrap_or(0.0);
    }

    const PARTS: usize = 20;
    const CUT: usize = 19;
    let m = n + 1;
    let j = (CUT * m / PARTS).clamp(1, n - 1);
    let delta = (CUT * m) as f64 - (j * PARTS) as f64;
    (sorted[j - 1] * (PARTS as f64 - delta) + sorted[j] * delta) / PARTS as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EvalError, TestCase};
    use std::time::Duration;

    fn case(id: &str, gt: &str, valid: &[&str]) -> TestCase {
        TestCase {
            id: id.into(),
            query_text: format!("query {id}"),
            ground_truth: gt.into(),
            valid_codes: valid.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn ok(case: &TestCase, codes: &[&str], latency_ms: u64) -> EvalResult {
        EvalResult::success(
            case,
            codes.iter().map(|s| (*s).to_string()).collect(),
            None,
            Duration::from_millis(latency_ms),
        )
    }

    #[test]
    fn test_three_case_example() {
        // A: top-1 correct; B: ground truth only at rank 2; C: errors out
        let a = case("A", "J18.9", &["J18.9"]);
        let b = case("B", "K35.8", &["K35.8"]);
        let c = case("C", "I10", &["I10"]);

        let results = vec![
            ok(&a, &["J18.9", "J18.0", "J15"], 1000),
            ok(&b, &["K35.2", "K35.8", "K37"], 3000),
            EvalResult::failure(&c, EvalError::Timeout, Duration::from_secs(90)),
        ];

        let m = Metrics::aggregate(&results, CodeMatch::Exact);
        assert_eq!(m.total_cases, 3);
        assert_eq!(m.error_count, 1);
        assert_eq!(m.evaluated, 2);
        assert!((m.accuracy_at_1 - 0.5).abs() < 1e-9);
        assert!((m.recall_at_3 - 1.0).abs() < 1e-9);
        assert!((m.accuracy_pct() - 50.0).abs() < 1e-9);
        // errored latency excluded
        assert!((m.latency_avg_s - 2.0).abs() < 1e-9);
        assert!((m.latency_p95_s - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_and_all_errors_yield_zero_ratios() {
        let m = Metrics::aggregate(&[], CodeMatch::Exact);
        assert_eq!(m, Metrics::default());

        let c = case("X", "A00", &["A00"]);
        let results = vec![EvalResult::failure(
            &c,
            EvalError::transport("connection refused"),
            Duration::from_millis(5),
        )];
        let m = Metrics::aggregate(&results, CodeMatch::Exact);
        assert_eq!(m.total_cases, 1);
        assert_eq!(m.error_count, 1);
        assert_eq!(m.accuracy_at_1, 0.0);
        assert_eq!(m.recall_at_3, 0.0);
        assert_eq!(m.latency_p95_s, 0.0);
    }

    #[test]
    fn test_p95_interpolates_with_enough_samples() {
        let samples: Vec<f64> = (1..=20).map(f64::from).collect();
        // m = 21, j = 19, delta = 399 - 380 = 19 -> (19*1 + 20*19) / 20
        assert!((p95(&samples) - 19.95).abs() < 1e-9);

        let four = [1.0, 2.0, 3.0, 4.0];
        // m = 5, j = 4 -> clamped to 3, delta = 95 - 60 = 35
        let expected = (3.0 * (20.0 - 35.0) + 4.0 * 35.0) / 20.0;
        assert!((p95(&four) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_p95_falls_back_to_max_for_small_samples() {
        assert_eq!(p95(&[0.5, 1.0, 2.5]), 2.5);
        assert_eq!(p95(&[]), 0.0);
    }

    #[test]
    fn test_category_mode_counts_block_matches() {
        let c = case("A", "J18.9", &["J18.9"]);
        let results = vec![ok(&c, &["J18.0"], 100)];
        assert_eq!(Metrics::aggregate(&results, CodeMatch::Exact).exact_hits, 0);
        assert_eq!(Metrics::aggregate(&results, CodeMatch::Category).exact_hits, 1);
    }

    #[test]
    fn test_aggregate_ignores_result_order() {
        let a = case("A", "A00", &["A00"]);
        let b = case("B", "B00", &["B00", "B01"]);
        let mut results = vec![ok(&a, &["A00"], 100), ok(&b, &["B01"], 700)];
        let forward = Metrics::aggregate(&results, CodeMatch::Exact);
        results.reverse();
        assert_eq!(forward, Metrics::aggregate(&results, CodeMatch::Exact));
    }
}
