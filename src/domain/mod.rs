//! Domain layer for the clinrefine prompt optimizer
//!
//! Core models (test cases, evaluation results, metrics, prompt sets,
//! iteration records), the error taxonomy, and the port traits the
//! infrastructure implements.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{RefineError, RefineResult, StoreError};
