//! HTTP adapter for the live diagnosis service

pub mod client;
pub mod errors;

pub use client::DiagnosisClient;
pub use errors::ServiceError;
