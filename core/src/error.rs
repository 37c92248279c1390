//! Error types for the readings client.
//!
//! # Design
//! Failures fall into two groups: the base URL could not be resolved (nothing
//! was sent), or the request itself failed. `NotFound` keeps its own variant
//! so callers can tell a missing reading from a broken service, while
//! `ClientError::kind` still folds it into the request group. Context aborts
//! are reported separately so a caller can tell "I gave up" from "it failed".

use thiserror::Error;

/// The base URL of the readings service could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The resolver has no URL for the service yet.
    #[error("no endpoint available for service `{0}`")]
    Unavailable(String),

    /// The resolver produced something that is not a usable base URL.
    #[error("invalid endpoint `{0}`")]
    Invalid(String),

    /// Endpoint parameters could not be read from configuration.
    #[error("invalid endpoint configuration: {0}")]
    Config(String),
}

/// Errors returned by `ReadingClient` operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("endpoint resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// A required argument was empty; the request was not sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service returned 404.
    #[error("resource not found: {body}")]
    NotFound { body: String },

    /// The service returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("call cancelled")]
    Cancelled,

    #[error("call deadline exceeded")]
    DeadlineExceeded,
}

/// Coarse classification of a `ClientError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No request was attempted because the endpoint was unknown.
    Resolution,
    /// Network, status, argument or payload failure.
    Request,
    /// The call context was cancelled or its deadline passed.
    Cancelled,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Resolve(_) => ErrorKind::Resolution,
            ClientError::Cancelled | ClientError::DeadlineExceeded => ErrorKind::Cancelled,
            ClientError::InvalidArgument(_)
            | ClientError::Transport(_)
            | ClientError::NotFound { .. }
            | ClientError::HttpStatus { .. }
            | ClientError::Serialization(_)
            | ClientError::Deserialization(_) => ErrorKind::Request,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}
