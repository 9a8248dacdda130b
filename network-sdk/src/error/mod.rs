//! Error handling for the Network SDK
//!
//! This module provides the error taxonomy of the request pipeline:
//! - `ControllerError` classifies every terminal failure by phase
//!   (before the transport call, the transport call itself, after it)
//! - `TransportError` describes failures raised by the transport collaborator
//! - `ConfigError` covers configuration loading and validation
//! - `HttpStatusError` is raised by the bundled delegates for non-success statuses

use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::core::TransportCall;

pub mod mapping;

/// Boxed cause carried by delegate and interceptor failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for delegate and interceptor hooks
pub type StageResult<T> = std::result::Result<T, BoxError>;

/// Result type for pipeline runs
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Which side of the transport dispatch a failure occurred on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Descriptor or request construction, before dispatch
    Preprocessing,
    /// The transport dispatch itself
    Network,
    /// Response parsing or content extraction, after dispatch
    Postprocessing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Preprocessing => "preprocessing",
            Phase::Network => "network",
            Phase::Postprocessing => "postprocessing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error of a pipeline run
///
/// Exactly one phase per failure. The underlying cause is always kept and
/// reachable through `std::error::Error::source`.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Raised by the delegate or the interceptor before the transport call
    #[error("Preprocessing failure: {0}")]
    Preprocessing(#[source] BoxError),

    /// Raised by the transport collaborator
    #[error("Network failure for {call}: {source}")]
    Network {
        /// The exact transport call that was attempted
        call: TransportCall,
        #[source]
        source: TransportError,
    },

    /// Raised by the delegate or the interceptor after the transport call
    #[error("Postprocessing failure: {0}")]
    Postprocessing(#[source] BoxError),
}

impl ControllerError {
    /// Create a preprocessing failure from any error
    pub fn preprocessing(cause: impl Into<BoxError>) -> Self {
        ControllerError::Preprocessing(cause.into())
    }

    /// Create a network failure for the attempted call
    pub fn network(call: TransportCall, source: TransportError) -> Self {
        ControllerError::Network { call, source }
    }

    /// Create a postprocessing failure from any error
    pub fn postprocessing(cause: impl Into<BoxError>) -> Self {
        ControllerError::Postprocessing(cause.into())
    }

    /// Classify a hook failure by the phase it happened in
    pub(crate) fn classify(phase: Phase, cause: BoxError) -> Self {
        match phase {
            Phase::Postprocessing => ControllerError::Postprocessing(cause),
            // Only the transport collaborator produces network failures
            Phase::Preprocessing | Phase::Network => ControllerError::Preprocessing(cause),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            ControllerError::Preprocessing(_) => Phase::Preprocessing,
            ControllerError::Network { .. } => Phase::Network,
            ControllerError::Postprocessing(_) => Phase::Postprocessing,
        }
    }

    /// The transport call that failed, for network failures
    pub fn transport_call(&self) -> Option<&TransportCall> {
        match self {
            ControllerError::Network { call, .. } => Some(call),
            _ => None,
        }
    }

    /// The underlying cause of this failure
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match self {
            ControllerError::Preprocessing(cause) | ControllerError::Postprocessing(cause) => {
                cause.as_ref()
            }
            ControllerError::Network { source, .. } => source,
        }
    }

    /// Attempt to view the cause as a concrete error type
    pub fn downcast_cause<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause().downcast_ref::<E>()
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ControllerError::Network { .. })
    }
}

/// Broad category of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request timed out
    Timeout,
    /// The connection could not be established
    Connect,
    /// The request could not be built or sent
    Request,
    /// The response body could not be read
    Body,
    /// The response could not be decoded
    Decode,
    /// Redirect policy was violated
    Redirect,
    /// Transport was cancelled or otherwise unavailable
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "Timeout",
            TransportErrorKind::Connect => "Connection error",
            TransportErrorKind::Request => "Request error",
            TransportErrorKind::Body => "Body error",
            TransportErrorKind::Decode => "Decode error",
            TransportErrorKind::Redirect => "Redirect error",
            TransportErrorKind::Other => "Transport error",
        };
        f.write_str(name)
    }
}

/// Error returned by a `Transport` dispatch
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Create a connection error
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Create a request error
    pub fn request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Request, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    pub fn is_connect(&self) -> bool {
        self.kind == TransportErrorKind::Connect
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is not set
    #[error("Configuration key not found: {0}")]
    Missing(String),

    /// A key is set but could not be parsed
    #[error("Invalid value for key {key}: {message}")]
    Invalid { key: String, message: String },

    /// A loaded configuration failed validation
    #[error("Configuration error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation(message.into())
    }
}

/// A response arrived with a status the delegate does not accept
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HttpStatusError {
    status: StatusCode,
    category: &'static str,
    message: String,
}

impl HttpStatusError {
    /// Build from a status and the raw response body
    pub fn new(status: StatusCode, body: &[u8]) -> Self {
        Self {
            status,
            category: mapping::classify_http_status(status),
            message: mapping::describe_http_error(status, body),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Status category, e.g. "authentication" or "server"
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Whether a caller-side retry could succeed
    pub fn is_retryable(&self) -> bool {
        mapping::is_retryable_status(self.status)
    }
}
