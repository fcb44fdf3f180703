use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

use crate::domain::models::{EvalError, EvalResult, TestCase};
use crate::domain::ports::DiagnosisService;

/// Runs every test case against the live service with bounded concurrency.
pub struct Evaluator {
    service: Arc<dyn DiagnosisService>,
    parallelism: usize,
}

impl Evaluator {
    pub fn new(service: Arc<dyn DiagnosisService>, parallelism: usize) -> Self {
        Self {
            service,
            parallelism: parallelism.max(1),
        }
    }

    /// One result per case, in input order, whatever the completion order.
    ///
    /// Each call holds a semaphore permit for its whole duration, so at most
    /// `parallelism` requests are in flight.
    pub async fn evaluate(&self, cases: &[TestCase], progress: &ProgressBar) -> Vec<EvalResult> {
        progress.set_length(cases.len() as u64);
        progress.set_position(0);

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let (tx, mut rx) = mpsc::channel::<(usize, EvalResult)>(cases.len().max(1));

        for (slot, case) in cases.iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let service = self.service.clone();
            let case = case.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let result = evaluate_case(service.as_ref(), &case).await;
                let _ = tx.send((slot, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<EvalResult>> = vec![None; cases.len()];
        while let Some((slot, result)) = rx.recv().await {
            if let Some(err) = &result.error {
                progress.set_message(format!("{}: {}", result.case_id, err));
            }
            slots[slot] = Some(result);
            progress.inc(1);
        }
        progress.finish_and_clear();

        slots
            .into_iter()
            .zip(cases)
            .map(|(result, case)| {
                result.unwrap_or_else(|| {
                    warn!(case = %case.id, "Evaluation task ended without a result");
                    EvalResult::failure(
                        case,
                        EvalError::transport("evaluation task aborted"),
                        std::time::Duration::ZERO,
                    )
                })
            })
            .collect()
    }
}

async fn evaluate_case(service: &dyn DiagnosisService, case: &TestCase) -> EvalResult {
    let started = Instant::now();
    let outcome = service.diagnose(&case.query_text).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(response) => {
            // retry backoff must not count as service latency
            let latency = response.attempt_latency.unwrap_or(elapsed);
            let (codes, explanation) = response.predictions();
            debug!(case = %case.id, predicted = ?codes.first(), ?latency, "Case evaluated");
            EvalResult::success(case, codes, explanation, latency)
        }
        Err(err) => {
            debug!(case = %case.id, error = %err, "Case failed");
            EvalResult::failure(case, err, elapsed)
        }
    }
}
