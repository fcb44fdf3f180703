//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - compact, pretty or JSON terminal output on stderr
//! - optional daily-rotated JSON log files via tracing-appender

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat};
pub use logger::LoggerImpl;
