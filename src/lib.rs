//! clinrefine - iterative prompt optimizer for a clinical diagnosis service
//!
//! Repeatedly evaluates a live ICD-10 diagnosis service against a labeled
//! corpus, has a generative model explain the misses, has it rewrite the
//! service's system prompts, hot-reloads them into the service and keeps the
//! best-scoring prompts.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the ports the loop talks through
//! - **Service Layer** (`services`): corpus loading, evaluation, judging, refining and the loop itself
//! - **Infrastructure Layer** (`infrastructure`): HTTP clients, prompt and history files, config, logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{
    CodeMatch, Config, EvalResult, IterationRecord, LoopPhase, Metrics, PromptRole, PromptSet,
    TestCase,
};
pub use domain::ports::{DiagnosisService, LlmClient};
pub use domain::{RefineError, RefineResult, StoreError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Orchestrator, RefineContext, RunSummary};
