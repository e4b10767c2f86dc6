//! Shared error vocabulary.
//!
//! The scheduler, deferral store and duplex session each own a `thiserror`
//! enum; the failure shapes they have in common live in [`CommonError`] and
//! are embedded with `#[from]`:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum DeferralError {
//!     #[error("Stored deferrals for '{key}' are corrupt: {reason}")]
//!     Corrupt { key: String, reason: String },
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! Every one of them implements [`ErrorClassification`] so callers can make
//! the same retry and log-level decisions regardless of where a failure came
//! from.

use std::fmt;
use std::time::Duration;

pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Encoding or decoding of persisted state
    Serialization { format: &'static str, message: String },

    /// An operation outlived its deadline
    Timeout { operation: String, duration: Duration },

    /// Invariant violation; never expected in a healthy process
    Internal { message: String, context: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization { format, message } => {
                write!(f, "Serialization error ({format}): {message}")
            }
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{operation}' timed out after {duration:?}")
            }
            Self::Internal { message, context: Some(ctx) } => {
                write!(f, "Internal error in '{ctx}': {message}")
            }
            Self::Internal { message, context: None } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for CommonError {}

impl CommonError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn internal(message: impl Into<String>, context: Option<&str>) -> Self {
        Self::Internal { message: message.into(), context: context.map(str::to_owned) }
    }

    /// Stable label for structured log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Serialization { .. } => "serialization",
            Self::Timeout { .. } => "timeout",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { format: "JSON", message: err.to_string() }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Uniform view over the crate-specific error enums.
pub trait ErrorClassification {
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Needs attention beyond a log line.
    fn is_critical(&self) -> bool;

    /// Suggested delay before trying again, if the error knows one.
    fn retry_after(&self) -> Option<Duration>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable_warning() {
        let err = CommonError::timeout("handshake", Duration::from_secs(3));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.to_string(), "Operation 'handshake' timed out after 3s");
    }

    #[test]
    fn internal_errors_are_critical() {
        let err = CommonError::internal("no runtime", Some("scheduler"));
        assert!(err.is_critical());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Internal error in 'scheduler': no runtime");
    }

    #[test]
    fn json_errors_map_to_serialization() {
        let err: CommonError = serde_json::from_str::<Vec<u8>>("{not json").unwrap_err().into();
        assert_eq!(err.kind(), "serialization");
        assert!(err.to_string().contains("JSON"));
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn severities_are_ordered() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARNING");
    }
}
