//! Per-case evaluation results and code matching rules.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::test_case::TestCase;

/// Maximum length of transport error text kept on a result.
pub const MAX_ERROR_CHARS: usize = 200;

/// Why a single evaluation call produced no predictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EvalError {
    /// The call exceeded its timeout (after retries)
    Timeout,
    /// Connection-level failure
    Transport(String),
    /// The service answered with a non-success status
    Status(u16, String),
    /// The service answered 2xx with a body we could not interpret
    MalformedResponse(String),
}

impl EvalError {
    /// Build a transport error, truncating the message.
    pub fn transport(message: impl AsRef<str>) -> Self {
        Self::Transport(truncate_chars(message.as_ref(), MAX_ERROR_CHARS))
    }

    /// Build a status error, truncating the body.
    pub fn status(code: u16, body: impl AsRef<str>) -> Self {
        Self::Status(code, truncate_chars(body.as_ref(), MAX_ERROR_CHARS))
    }

    /// Build a malformed-response error, truncating the message.
    pub fn malformed(message: impl AsRef<str>) -> Self {
        Self::MalformedResponse(truncate_chars(message.as_ref(), MAX_ERROR_CHARS))
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Transport(msg) => write!(f, "{msg}"),
            Self::Status(code, body) => write!(f, "HTTP {code}: {body}"),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

/// How a predicted code is compared against the labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeMatch {
    /// Verbatim equality; what the optimizer scores with
    #[default]
    Exact,
    /// Normalized equality or same three-character category
    Category,
}

impl CodeMatch {
    /// Whether `predicted` matches `label` under this rule.
    pub fn matches(self, predicted: &str, label: &str) -> bool {
        match self {
            Self::Exact => predicted == label,
            Self::Category => {
                let pred = normalize_code(predicted);
                let label = normalize_code(label);
                if pred.is_empty() || label.is_empty() {
                    return false;
                }
                pred == label || pred.chars().take(3).eq(label.chars().take(3))
            }
        }
    }
}

impl FromStr for CodeMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "category" => Ok(Self::Category),
            other => Err(format!("unknown match mode '{other}' (expected exact or category)")),
        }
    }
}

impl fmt::Display for CodeMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Category => write!(f, "category"),
        }
    }
}

/// Verdict for one case in an evaluation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseStatus {
    /// Top-1 hit
    Ok,
    /// Missed at top-1, hit within the top three
    R3,
    Miss,
    Error,
}

/// Strip dots and whitespace, uppercase: `j18.9 ` -> `J189`.
pub fn normalize_code(code: &str) -> String {
    code.trim().replace('.', "").to_uppercase()
}

/// The outcome of evaluating one test case against the live service.
///
/// Carries a copy of the case's labels so the aggregator and the judge can
/// work from results alone.
#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub case_id: String,
    pub query_text: String,
    pub ground_truth: String,
    pub valid_codes: Vec<String>,
    /// Predicted codes ordered by rank
    pub predicted_codes: Vec<String>,
    /// Service explanation attached to the top-ranked prediction
    pub top_explanation: Option<String>,
    #[serde(rename = "latency_s", serialize_with = "serialize_secs")]
    pub latency: Duration,
    pub error: Option<EvalError>,
}

fn serialize_secs<S: serde::Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(latency.as_secs_f64())
}

impl EvalResult {
    /// A successful call.
    pub fn success(
        case: &TestCase,
        predicted_codes: Vec<String>,
        top_explanation: Option<String>,
        latency: Duration,
    ) -> Self {
        Self {
            case_id: case.id.clone(),
            query_text: case.query_text.clone(),
            ground_truth: case.ground_truth.clone(),
            valid_codes: case.valid_codes.clone(),
            predicted_codes,
            top_explanation,
            latency,
            error: None,
        }
    }

    /// A failed call: no predictions, error recorded.
    pub fn failure(case: &TestCase, error: EvalError, latency: Duration) -> Self {
        Self {
            case_id: case.id.clone(),
            query_text: case.query_text.clone(),
            ground_truth: case.ground_truth.clone(),
            valid_codes: case.valid_codes.clone(),
            predicted_codes: Vec::new(),
            top_explanation: None,
            latency,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn top_prediction(&self) -> Option<&str> {
        self.predicted_codes.first().map(String::as_str)
    }

    pub fn top_three(&self) -> &[String] {
        let end = self.predicted_codes.len().min(3);
        &self.predicted_codes[..end]
    }

    /// Top-1 hit. Exact mode compares against the ground truth only; category
    /// mode accepts any valid code's category.
    pub fn is_top1_hit(&self, mode: CodeMatch) -> bool {
        if self.is_error() {
            return false;
        }
        let Some(top) = self.top_prediction() else {
            return false;
        };
        match mode {
            CodeMatch::Exact => top == self.ground_truth,
            CodeMatch::Category => self.valid_codes.iter().any(|v| mode.matches(top, v)),
        }
    }

    /// Any of the top three predictions is a valid code.
    pub fn is_top3_hit(&self, mode: CodeMatch) -> bool {
        if self.is_error() {
            return false;
        }
        self.top_three()
            .iter()
            .any(|p| self.valid_codes.iter().any(|v| mode.matches(p, v)))
    }

    pub fn status(&self, mode: CodeMatch) -> CaseStatus {
        if self.is_error() {
            CaseStatus::Error
        } else if self.is_top1_hit(mode) {
            CaseStatus::Ok
        } else if self.is_top3_hit(mode) {
            CaseStatus::R3
        } else {
            CaseStatus::Miss
        }
    }

    pub fn latency_secs(&self) -> f64 {
        self.latency.as_secs_f64()
    }
}

/// Truncate on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
