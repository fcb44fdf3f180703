use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for clinrefine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Live diagnosis service
    #[serde(default)]
    pub server: ServerConfig,

    /// Generative model used by the judge and the refiner
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retry policy for generative-model calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Optimization loop settings
    #[serde(default)]
    pub refine: RefineConfig,

    /// Input and output file locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Diagnosis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Base URL of the service
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Timeout for a single /diagnose call in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for /health and /admin/reload-prompts in seconds
    #[serde(default = "default_control_timeout_secs")]
    pub control_timeout_secs: u64,

    /// Retries for transient /diagnose failures
    #[serde(default = "default_server_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between /diagnose retries in milliseconds
    #[serde(default = "default_server_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff between /diagnose retries in milliseconds
    #[serde(default = "default_server_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    90
}

const fn default_control_timeout_secs() -> u64 {
    10
}

const fn default_server_max_retries() -> u32 {
    1
}

const fn default_server_backoff_ms() -> u64 {
    1000
}

const fn default_server_max_backoff_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            request_timeout_secs: default_request_timeout_secs(),
            control_timeout_secs: default_control_timeout_secs(),
            max_retries: default_server_max_retries(),
            initial_backoff_ms: default_server_backoff_ms(),
            max_backoff_ms: default_server_max_backoff_ms(),
        }
    }
}

/// Generative model configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// API base URL, without the `/v1/...` suffix
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Bearer token; falls back to `CLINREFINE_LLM_API_KEY` / `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per second allowed
    #[serde(default = "default_llm_rate_limit_rps")]
    pub rate_limit_rps: f64,
}

fn default_llm_base_url() -> String {
    "https://hub.qazcode.ai".to_string()
}

fn default_llm_model() -> String {
    "oss-120b".to_string()
}

const fn default_llm_timeout_secs() -> u64 {
    90
}

const fn default_llm_rate_limit_rps() -> f64 {
    2.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
            rate_limit_rps: default_llm_rate_limit_rps(),
        }
    }
}

impl LlmConfig {
    /// Configured key, else the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("CLINREFINE_LLM_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    2000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Optimization loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RefineConfig {
    /// Number of evaluate/analyze/refine iterations
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Concurrent /diagnose calls (1-64)
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Failing cases shown to the judge
    #[serde(default = "default_max_failures_for_judge")]
    pub max_failures_for_judge: usize,

    /// Characters of each query shown to the judge
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    /// Refined prompts shorter than this keep their previous text
    #[serde(default = "default_min_prompt_chars")]
    pub min_prompt_chars: usize,

    /// Pause between iterations in milliseconds
    #[serde(default = "default_iteration_pause_ms")]
    pub iteration_pause_ms: u64,

    /// Language the refined prompts must be written in
    #[serde(default = "default_prompt_language")]
    pub prompt_language: String,
}

const fn default_iterations() -> u32 {
    5
}

const fn default_parallelism() -> usize {
    3
}

const fn default_max_failures_for_judge() -> usize {
    20
}

const fn default_max_query_chars() -> usize {
    400
}

const fn default_min_prompt_chars() -> usize {
    50
}

const fn default_iteration_pause_ms() -> u64 {
    2000
}

fn default_prompt_language() -> String {
    "Russian".to_string()
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            parallelism: default_parallelism(),
            max_failures_for_judge: default_max_failures_for_judge(),
            max_query_chars: default_max_query_chars(),
            min_prompt_chars: default_min_prompt_chars(),
            iteration_pause_ms: default_iteration_pause_ms(),
            prompt_language: default_prompt_language(),
        }
    }
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    /// Directory of `*.json` test cases
    #[serde(default = "default_test_dir")]
    pub test_dir: PathBuf,

    /// Active prompts file, shared with the service
    #[serde(default = "default_prompts_file")]
    pub prompts_file: PathBuf,

    /// Best prompts observed during the run
    #[serde(default = "default_best_prompts_file")]
    pub best_prompts_file: PathBuf,

    /// Iteration history (JSON)
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,

    /// Per-iteration summary (CSV)
    #[serde(default = "default_summary_file")]
    pub summary_file: PathBuf,

    /// Report written by `clinrefine eval`
    #[serde(default = "default_eval_results_file")]
    pub eval_results_file: PathBuf,
}

fn default_test_dir() -> PathBuf {
    PathBuf::from("data/test_set")
}

fn default_prompts_file() -> PathBuf {
    PathBuf::from("prompts.json")
}

fn default_best_prompts_file() -> PathBuf {
    PathBuf::from("prompts_best.json")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("self_refine_history.json")
}

fn default_summary_file() -> PathBuf {
    PathBuf::from("self_refine_results.csv")
}

fn default_eval_results_file() -> PathBuf {
    PathBuf::from("eval_results.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            test_dir: default_test_dir(),
            prompts_file: default_prompts_file(),
            best_prompts_file: default_best_prompts_file(),
            history_file: default_history_file(),
            summary_file: default_summary_file(),
            eval_results_file: default_eval_results_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: compact, pretty or json
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for daily-rotated JSON log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
