use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::failure_sampler::FailureSample;
use crate::domain::models::{Metrics, PromptRole, PromptSet, truncate_chars};
use crate::domain::ports::{CompletionRequest, LlmClient};

const JUDGE_TEMPERATURE: f32 = 0.2;
const JUDGE_MAX_TOKENS: u32 = 1500;
/// Characters of each current prompt shown to the judge
const PROMPT_PREVIEW_CHARS: usize = 600;
/// Characters of the service's explanation shown per case
const EXPLANATION_CHARS: usize = 200;
/// Valid codes listed per case
const VALID_CODES_SHOWN: usize = 5;

const SYSTEM_PROMPT: &str = "You are an expert in evaluating medical AI systems. \
Your task is to analyze misdiagnosed cases and identify systematic error patterns. \
Answer clearly and in a structured way.";

/// Asks the model why the failing cases failed.
pub struct Judge {
    llm: Arc<dyn LlmClient>,
    max_query_chars: usize,
}

impl Judge {
    pub fn new(llm: Arc<dyn LlmClient>, max_query_chars: usize) -> Self {
        Self {
            llm,
            max_query_chars,
        }
    }

    /// Free-text failure analysis. Errors are the caller's to absorb.
    pub async fn analyze(
        &self,
        sample: &FailureSample<'_>,
        prompts: &PromptSet,
        metrics: &Metrics,
        iteration: u32,
    ) -> Result<String> {
        info!(
            sampled = sample.cases.len(),
            total = sample.total,
            "Judge: analyzing failing cases"
        );
        let request = self.build_request(sample, prompts, metrics, iteration);
        let analysis = self.llm.complete(request).await?;
        info!(chars = analysis.chars().count(), "Judge: analysis complete");
        Ok(analysis)
    }

    pub fn build_request(
        &self,
        sample: &FailureSample<'_>,
        prompts: &PromptSet,
        metrics: &Metrics,
        iteration: u32,
    ) -> CompletionRequest {
        let mut cases = String::new();
        for (i, r) in sample.cases.iter().enumerate() {
            let query = truncate_chars(&r.query_text, self.max_query_chars).replace('\n', " ");
            let predicted = if r.predicted_codes.is_empty() {
                "(empty)".to_string()
            } else {
                r.top_three().join(", ")
            };
            let valid: Vec<&str> = r
                .valid_codes
                .iter()
                .take(VALID_CODES_SHOWN)
                .map(String::as_str)
                .collect();

            let _ = write!(
                cases,
                "\n--- Case {} ---\nAnamnesis: {}...\nExpected: {} (valid: {})\nPredicted (top-3): {}\n",
                i + 1,
                query,
                r.ground_truth,
                valid.join(", "),
                predicted
            );
            if let Some(explanation) = &r.top_explanation {
                let _ = writeln!(
                    cases,
                    "Service explanation: {}...",
                    truncate_chars(explanation, EXPLANATION_CHARS)
                );
            }
        }

        let mut current = String::new();
        for role in PromptRole::ALL {
            let _ = write!(
                current,
                "\n### {}:\n{}\n",
                role,
                truncate_chars(prompts.get(role), PROMPT_PREVIEW_CHARS)
            );
        }

        let user = format!(
            "## Iteration {iteration}. Current metrics\n\
             - Accuracy@1: {acc:.1}%\n\
             - Recall@3: {rec:.1}%\n\
             - Failures: {failures} of {total}\n\n\
             ## Current prompts\n{current}\n\
             ## Failing cases (sample of {shown} out of {failures}):\n{cases}\n\
             ## Task\n\
             Analyze the errors and answer:\n\n\
             1. **Main error patterns** (3-5 concrete problems): what goes wrong, and at which step \
             (symptom extraction / retrieval / diagnosis)?\n\
             2. **Hypotheses about the causes**: why do the prompts fall short?\n\
             3. **Concrete prompt improvements** with example wording: what to add, remove or change \
             in the symptom extraction prompt and in the diagnosis prompt, and how the ICD-10 code \
             must be formatted in the answer.",
            acc = metrics.accuracy_pct(),
            rec = metrics.recall_pct(),
            failures = sample.total,
            total = metrics.total_cases,
            shown = sample.cases.len(),
        );

        CompletionRequest::new(SYSTEM_PROMPT, user)
            .with_temperature(JUDGE_TEMPERATURE)
            .with_max_tokens(JUDGE_MAX_TOKENS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EvalResult, TestCase};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Unused;

    #[async_trait]
    impl LlmClient for Unused {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            anyhow::bail!("not called")
        }
    }

    fn failing(query: &str, explanation: Option<&str>) -> EvalResult {
        let case = TestCase {
            id: "p1".into(),
            query_text: query.into(),
            ground_truth: "J18.9".into(),
            valid_codes: vec!["J18.9".into(), "J18.0".into()],
        };
        EvalResult::success(
            &case,
            vec!["J20.9".into(), "J06.9".into(), "J45".into(), "J44".into()],
            explanation.map(str::to_string),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_request_truncates_and_flattens() {
        let judge = Judge::new(Arc::new(Unused), 20);
        let long_query = format!("line one\nline two {}", "x".repeat(100));
        let explanation = "e".repeat(500);
        let results = vec![failing(&long_query, Some(&explanation))];
        let sample = FailureSample::collect(&results, 20);
        let prompts = PromptSet::default().with(PromptRole::Diagnosis, "d".repeat(1000));
        let metrics = Metrics {
            total_cases: 10,
            accuracy_at_1: 0.3,
            ..Metrics::default()
        };

        let request = judge.build_request(&sample, &prompts, &metrics, 2);
        assert_eq!(request.temperature, JUDGE_TEMPERATURE);
        assert_eq!(request.max_tokens, JUDGE_MAX_TOKENS);

        let user = &request.messages[1].content;
        assert!(user.contains("Anamnesis: line one line two x"));
        assert!(!user.contains(&"x".repeat(30)));
        assert!(user.contains(&"e".repeat(EXPLANATION_CHARS)));
        assert!(!user.contains(&"e".repeat(EXPLANATION_CHARS + 1)));
        assert!(user.contains(&"d".repeat(PROMPT_PREVIEW_CHARS)));
        assert!(!user.contains(&"d".repeat(PROMPT_PREVIEW_CHARS + 1)));
        assert!(user.contains("Predicted (top-3): J20.9, J06.9, J45\n"));
        assert!(user.contains("Accuracy@1: 30.0%"));
        assert!(user.contains("Failures: 1 of 10"));
    }

    #[test]
    fn test_empty_predictions_marked() {
        let judge = Judge::new(Arc::new(Unused), 400);
        let case = TestCase {
            id: "p2".into(),
            query_text: "q".into(),
            ground_truth: "A00".into(),
            valid_codes: vec!["A00".into()],
        };
        let results = vec![EvalResult::success(&case, vec![], None, Duration::ZERO)];
        let sample = FailureSample::collect(&results, 20);

        let request = judge.build_request(&sample, &PromptSet::default(), &Metrics::default(), 1);
        assert!(request.messages[1].content.contains("Predicted (top-3): (empty)"));
        assert!(!request.messages[1].content.contains("Service explanation"));
    }
}
