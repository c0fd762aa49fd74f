use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure kinds a model gateway can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateErrorKind {
    Auth,
    Request,
    RateLimit,
}

impl fmt::Display for GenerateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerateErrorKind::Auth => "auth",
            GenerateErrorKind::Request => "request",
            GenerateErrorKind::RateLimit => "rate_limit",
        };
        f.write_str(name)
    }
}

/// Error returned by a single `ModelGateway::generate` call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerateError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("rate limited: {0}")]
    RateLimit(String),
}

impl GenerateError {
    pub fn kind(&self) -> GenerateErrorKind {
        match self {
            GenerateError::Auth(_) => GenerateErrorKind::Auth,
            GenerateError::Request(_) => GenerateErrorKind::Request,
            GenerateError::RateLimit(_) => GenerateErrorKind::RateLimit,
        }
    }
}

/// Errors raised by the reliability engine
#[derive(Debug, Error)]
pub enum ReliabilityError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown suite '{name}' (available: {available})")]
    UnknownSuite { name: String, available: String },

    #[error(
        "gateway error ({}) for model '{model}', test '{test_id}', attempt {attempt}: {cause}",
        .cause.kind()
    )]
    Gateway {
        model: String,
        test_id: String,
        attempt: usize,
        #[source]
        cause: GenerateError,
    },

    #[error("missing credential: environment variable {var} is not set (export it or add it to a .env file)")]
    MissingCredential { var: String },
}

pub type Result<T, E = ReliabilityError> = std::result::Result<T, E>;
