//! Services: the optimization loop and the stages it runs.

pub mod corpus_loader;
pub mod evaluator;
pub mod failure_sampler;
pub mod json_extract;
pub mod judge;
pub mod orchestrator;
pub mod refiner;

pub use corpus_loader::CorpusLoader;
pub use evaluator::Evaluator;
pub use failure_sampler::FailureSample;
pub use json_extract::{ExtractionStrategy, extract_json_object};
pub use judge::Judge;
pub use orchestrator::{Orchestrator, RefineContext, RunSummary};
pub use refiner::{Refinement, Refiner};
