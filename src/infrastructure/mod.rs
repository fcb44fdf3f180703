//! Infrastructure layer: adapters for HTTP services, files, configuration and logging

pub mod config;
pub mod diagnosis;
pub mod llm;
pub mod logging;
pub mod retry;
pub mod storage;
