use crate::domain::models::{CodeMatch, EvalResult};

/// Error-free results whose top-1 prediction missed, capped for the judge.
#[derive(Debug, Clone)]
pub struct FailureSample<'a> {
    /// All failing results, before the cap
    pub total: usize,
    /// The first `cap` failures, in evaluation order
    pub cases: Vec<&'a EvalResult>,
}

impl<'a> FailureSample<'a> {
    pub fn collect(results: &'a [EvalResult], cap: usize) -> Self {
        let failures: Vec<&EvalResult> = results
            .iter()
            .filter(|r| !r.is_error() && !r.is_top1_hit(CodeMatch::Exact))
            .collect();
        let total = failures.len();
        let cases = failures.into_iter().take(cap).collect();
        Self { total, cases }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
