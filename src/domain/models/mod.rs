pub mod config;
pub mod evaluation;
pub mod iteration;
pub mod metrics;
pub mod phase;
pub mod prompt_set;
pub mod test_case;

pub use config::{
    Config, LlmConfig, LoggingConfig, PathsConfig, RefineConfig, RetryConfig, ServerConfig,
};
pub use evaluation::{CaseStatus, CodeMatch, EvalError, EvalResult, normalize_code, truncate_chars};
pub use iteration::{BestState, IterationRecord};
pub use metrics::Metrics;
pub use phase::LoopPhase;
pub use prompt_set::{PromptRole, PromptSet, VERSION_KEY};
pub use test_case::TestCase;
