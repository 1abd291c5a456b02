//! Error types for dispatching.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while registering or dispatching.
///
/// Errors are cheap to clone: a failed param callback is memoized and the
/// same error is raised again when the same value shows up later in the
/// request.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// Invalid path pattern.
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The pattern as registered.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A captured path segment holds malformed percent-encoding.
    #[error("failed to decode param '{value}'")]
    ParamDecode {
        /// The raw captured text.
        value: String,
    },

    /// Unknown HTTP method name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Error carrying an explicit HTTP status chosen by a handler.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Error raised by a handler.
    #[error("{0}")]
    Handler(Arc<dyn StdError + Send + Sync>),

    /// A handler panicked.
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl RouterError {
    /// Creates an error with an explicit status code.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Wraps any error raised by a handler.
    pub fn handler(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Handler(Arc::new(err))
    }

    /// Returns the HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ParamDecode { .. } => 400,
            Self::Status { status, .. } => *status,
            Self::InvalidPattern { .. }
            | Self::UnknownMethod(_)
            | Self::Handler(_)
            | Self::Panic(_) => 500,
        }
    }

    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panic(message)
    }
}

impl From<std::io::Error> for RouterError {
    fn from(err: std::io::Error) -> Self {
        Self::handler(err)
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        Self::handler(err)
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
