//! Error types for remote calendar operations.
//!
//! The codes mirror the failure taxonomy the sync orchestrator branches on:
//! expired credentials are recoverable via refresh, transient outages are
//! retryable on the next run, and a remote-reported duplicate carries the
//! existing event identifier so it can be treated as success upstream.

use std::fmt;
use thiserror::Error;

/// The category of a remote calendar error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorCode {
    /// Credential absent or expired; recoverable via a token refresh.
    Unauthenticated,
    /// The refresh token itself is invalid; requires a new consent flow.
    ReauthorizationRequired,
    /// Transient network or service failure; retryable on the next run.
    Unavailable,
    /// The service reports a duplicate of the event being created.
    Conflict,
    /// The service returned something the client could not parse.
    InvalidResponse,
    /// Missing or invalid client configuration.
    Configuration,
    /// Unexpected internal state.
    Internal,
}

impl RemoteErrorCode {
    /// Returns true if this error is transient and the operation may be
    /// retried on a later run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Returns a stable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::ReauthorizationRequired => "reauthorization_required",
            Self::Unavailable => "unavailable",
            Self::Conflict => "conflict",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from a remote calendar operation.
#[derive(Debug, Error)]
pub struct RemoteError {
    code: RemoteErrorCode,
    message: String,
    /// For `Conflict`: the identifier of the already-existing remote event,
    /// when the service reports one.
    existing_id: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RemoteError {
    /// Creates a new error with the given code and message.
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            existing_id: None,
            source: None,
        }
    }

    /// Creates an `Unauthenticated` error.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::Unauthenticated, message)
    }

    /// Creates a `ReauthorizationRequired` error.
    pub fn reauthorization_required(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::ReauthorizationRequired, message)
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::Unavailable, message)
    }

    /// Creates a `Conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::Conflict, message)
    }

    /// Creates an `InvalidResponse` error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::InvalidResponse, message)
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::Configuration, message)
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::Internal, message)
    }

    /// Attaches the identifier of the already-existing remote event.
    pub fn with_existing_id(mut self, id: impl Into<String>) -> Self {
        self.existing_id = Some(id.into());
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> RemoteErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// For `Conflict` errors, the reported identifier of the existing
    /// remote event, if any.
    pub fn existing_id(&self) -> Option<&str> {
        self.existing_id.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for remote calendar operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
