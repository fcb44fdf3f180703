//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the infrastructure adapters implement:
//! - DiagnosisService: the live diagnosis service (diagnose, reload, health)
//! - LlmClient: the generative model behind the judge and the refiner
//!
//! The services layer depends only on these traits, so the optimizer loop can
//! be driven against in-memory fakes in tests.

pub mod diagnosis_service;
pub mod llm_client;

pub use diagnosis_service::{
    DiagnoseResponse, DiagnosisService, HealthReport, PromptsStatus, RagStatus, RankedDiagnosis,
    ReloadAck,
};
pub use llm_client::{ChatMessage, ChatRole, CompletionRequest, LlmClient};
