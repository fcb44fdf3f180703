use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::models::EvalError;
use crate::infrastructure::retry::Transient;

/// Errors from the diagnosis service HTTP API
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("HTTP {0}: {1}")]
    Status(StatusCode, String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

impl Transient for ServiceError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status(status, _) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Malformed(_) => false,
        }
    }
}

impl From<ServiceError> for EvalError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Timeout => Self::Timeout,
            ServiceError::Network(e) => Self::transport(e.to_string()),
            ServiceError::Status(status, body) => Self::status(status.as_u16(), body),
            ServiceError::Malformed(msg) => Self::malformed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ServiceError::Status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(ServiceError::Status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(!ServiceError::Status(StatusCode::UNPROCESSABLE_ENTITY, String::new()).is_transient());
        assert!(!ServiceError::Malformed("x".into()).is_transient());
        assert!(ServiceError::Timeout.is_transient());
    }

    #[test]
    fn test_maps_into_eval_error() {
        assert_eq!(EvalError::from(ServiceError::Timeout), EvalError::Timeout);
        assert_eq!(
            EvalError::from(ServiceError::Status(StatusCode::BAD_REQUEST, "bad".into())),
            EvalError::Status(400, "bad".into())
        );
        match EvalError::from(ServiceError::Malformed("y".repeat(300))) {
            EvalError::MalformedResponse(msg) => assert_eq!(msg.len(), 200),
            other => panic!("unexpected {other:?}"),
        }
    }
}
