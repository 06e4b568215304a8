use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP client or its credentials could not be set up.
    #[error("error creating backend transport: {0}")]
    Transport(String),

    #[error("error sending request: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a Prometheus API error.
    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },

    #[error("server returned HTTP status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("error decoding response: {0}")]
    Decode(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("error fetching access token: {0}")]
    Auth(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
