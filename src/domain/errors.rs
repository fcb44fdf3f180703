//! Domain errors for the clinrefine optimizer.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that abort an optimization run.
///
/// Everything else (judge failures, refiner failures, reload failures, single
/// evaluation errors) is handled locally and never surfaces as a `RefineError`.
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("Diagnosis service unreachable at {url}: {reason}")]
    ServiceUnreachable { url: String, reason: String },

    #[error("Test-case directory not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("No parseable test cases in {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

pub type RefineResult<T> = Result<T, RefineError>;

/// Errors raised while reading or writing the prompt and history files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Expected a JSON object in {}", .0.display())]
    NotAnObject(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
