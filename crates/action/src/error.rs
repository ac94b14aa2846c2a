use serde::{Deserialize, Serialize};

use crate::ports::{MappingError, SchemaError, SchemaViolation};
use crate::request::HttpError;

/// Error type for engine-level failures.
///
/// Only the *single-event* execution path and the caller-configuration
/// checks surface these. Per-item failures inside a batch are captured as
/// data ([`ErrorOutcome`](crate::multi_status::ErrorOutcome)) so one bad
/// event cannot fail an entire batch.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ActionError {
    /// The caller invoked an operation the definition does not declare
    /// (batch without a batch handler, hook without hook support).
    ///
    /// This is a configuration error, never retried.
    #[error("not implemented: {message}")]
    NotImplemented {
        /// Human-readable description of the missing capability.
        message: String,
    },

    /// The resolved payload failed schema validation.
    #[error(transparent)]
    Validation(#[from] SchemaViolation),

    /// The mapping could not be resolved against the event data.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Field declarations could not be compiled into a schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A partner call failed and the handler propagated the failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Execution cancelled via the bundle's cancellation token.
    #[error("cancelled")]
    Cancelled,

    /// The partner-supplied handler failed for a reason of its own.
    #[error("handler failure: {0}")]
    Handler(String),
}

impl ActionError {
    /// Create a `NotImplemented` error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }

    /// Create a handler failure from an arbitrary message.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// The HTTP status this error maps to when surfaced over the wire.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotImplemented { .. } => 501,
            Self::Validation(_) | Self::Mapping(_) => 400,
            Self::Http(err) => err.response.status,
            Self::Schema(_) | Self::Cancelled | Self::Handler(_) => 500,
        }
    }
}

/// Classification attached to every error outcome in a multi-status result.
///
/// Serialized with the fixed wire names used across the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    /// Request rejected by the destination as malformed.
    BadRequest,
    /// Credentials missing, expired, or rejected.
    InvalidAuthentication,
    /// Authenticated but not allowed.
    Forbidden,
    /// The addressed resource does not exist.
    NotFound,
    /// The destination did not answer in time.
    Timeout,
    /// Request body exceeded the destination's size limit.
    PayloadTooLarge,
    /// The destination throttled the request.
    RateLimited,
    /// The operation is not supported by this action.
    NotImplemented,
    /// The resolved payload failed schema validation before any call was made.
    PayloadValidationFailed,
    /// Destination-side failure that may succeed on a later attempt.
    RetryableError,
    /// Anything the fixed status mapping does not cover.
    UnknownError,
}

impl ErrorCode {
    /// Infer an error code from an HTTP status.
    ///
    /// The mapping is fixed: unlisted 5xx statuses collapse to
    /// [`RetryableError`](Self::RetryableError), everything else to
    /// [`UnknownError`](Self::UnknownError).
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::InvalidAuthentication,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            408 => Self::Timeout,
            413 => Self::PayloadTooLarge,
            429 => Self::RateLimited,
            501 => Self::NotImplemented,
            500 | 502..=599 => Self::RetryableError,
            _ => Self::UnknownError,
        }
    }
}
