use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};

use super::json_extract::extract_json_object;
use crate::domain::models::{Metrics, PromptRole, PromptSet, truncate_chars};
use crate::domain::ports::{CompletionRequest, LlmClient};

const REFINE_TEMPERATURE: f32 = 0.4;
const REFINE_MAX_TOKENS: u32 = 2000;
/// Characters of an unparseable reply kept in the notes
const RAW_REPLY_CHARS: usize = 300;
const NOTES_KEY: &str = "improvement_notes";

/// Candidate prompts produced by one refinement call
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub prompts: PromptSet,
    pub notes: String,
    /// Roles whose text was replaced
    pub changed: Vec<PromptRole>,
}

/// Rewrites the prompts from the judge's analysis.
pub struct Refiner {
    llm: Arc<dyn LlmClient>,
    min_prompt_chars: usize,
    language: String,
}

impl Refiner {
    pub fn new(llm: Arc<dyn LlmClient>, min_prompt_chars: usize, language: impl Into<String>) -> Self {
        Self {
            llm,
            min_prompt_chars,
            language: language.into(),
        }
    }

    pub async fn refine(
        &self,
        current: &PromptSet,
        analysis: &str,
        metrics: &Metrics,
        iteration: u32,
        history: &str,
    ) -> Result<Refinement> {
        info!(iteration, "Refiner: generating candidate prompts");
        let request = self.build_request(current, analysis, metrics, iteration, history);
        let reply = self.llm.complete(request).await?;
        Ok(self.apply_reply(current, &reply))
    }

    pub fn build_request(
        &self,
        current: &PromptSet,
        analysis: &str,
        metrics: &Metrics,
        iteration: u32,
        history: &str,
    ) -> CompletionRequest {
        let keys: Vec<String> = PromptRole::ALL
            .iter()
            .map(|r| format!("  \"{}\": \"new prompt...\",", r.key()))
            .collect();

        let system = format!(
            "You are an experienced prompt engineer for medical AI systems.\n\
             Your task is to improve the system prompts so the service determines ICD-10 codes more accurately.\n\n\
             MANDATORY CONSTRAINTS:\n\
             1. The symptom extraction prompt must make the model return ONLY valid JSON (no other words).\n\
             2. The diagnosis prompt MUST require an explicit ICD-10 code in the format \"МКБ-10: X00.0\".\n\
             3. The prompts must be written in {language}.\n\
             4. Keep each prompt short (about 600 characters at most).\n\n\
             Return ONLY valid JSON without markdown fences:\n\
             {{\n{keys}\n  \"{NOTES_KEY}\": \"what you changed and why\"\n}}",
            language = self.language,
            keys = keys.join("\n"),
        );

        let mut prompts = String::new();
        for role in PromptRole::ALL {
            let _ = write!(prompts, "\n### {}:\n{}\n", role, current.get(role));
        }

        let user = format!(
            "## Iteration {iteration}. Current results\n\
             - Accuracy@1: {acc:.1}% (goal: maximize)\n\
             - Recall@3: {rec:.1}%\n\n\
             ## Previous iterations\n{history}\n\n\
             ## Analysis of current errors\n{analysis}\n\n\
             ## Current prompts (to edit)\n{prompts}\n\
             ## Task\n\
             Rewrite both prompts to fix the problems found.\n\
             Remember: the main goal is an exact match of the ICD-10 code with the ground truth.",
            acc = metrics.accuracy_pct(),
            rec = metrics.recall_pct(),
        );

        CompletionRequest::new(system, user)
            .with_temperature(REFINE_TEMPERATURE)
            .with_max_tokens(REFINE_MAX_TOKENS)
    }

    /// Parse a reply into candidate prompts, falling back field by field.
    ///
    /// A role keeps its current text when the reply omits it, gives a
    /// non-string, or gives fewer than `min_prompt_chars` characters.
    pub fn apply_reply(&self, current: &PromptSet, reply: &str) -> Refinement {
        let Some((object, strategy)) = extract_json_object(reply) else {
            warn!("Refiner reply is not JSON, keeping current prompts");
            return Refinement {
                prompts: current.clone(),
                notes: format!(
                    "Failed to parse refiner reply. Raw reply: {}",
                    truncate_chars(reply, RAW_REPLY_CHARS)
                ),
                changed: Vec::new(),
            };
        };

        let mut prompts = current.clone();
        let mut changed = Vec::new();
        for role in PromptRole::ALL {
            match object.get(role.key()) {
                Some(Value::String(text)) if text.chars().count() >= self.min_prompt_chars => {
                    if text != current.get(role) {
                        changed.push(role);
                    }
                    prompts.set(role, text.clone());
                }
                Some(_) => warn!(%role, "Refined prompt is too short or not text, keeping the old one"),
                None => warn!(%role, "Refined prompt missing, keeping the old one"),
            }
        }

        let notes = match object.get(NOTES_KEY) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        info!(?strategy, changed = changed.len(), "Refiner reply parsed");
        Refinement {
            prompts,
            notes,
            changed,
        }
    }
}
