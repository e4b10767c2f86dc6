//! Deferral store error types

use std::time::Duration;

use thiserror::Error;
use tidelink_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use tidelink_domain::TidelinkError;

/// Failures of the durable storage backing the deferral store.
///
/// These never reach request callers; the store logs them and carries on
/// with whatever state it has in memory.
#[derive(Debug, Error)]
pub enum DeferralError {
    #[error("Storage error for '{key}': {message}")]
    Storage { key: String, message: String },

    #[error("Stored deferrals for '{key}' are corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Unsupported deferral format version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl DeferralError {
    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage { key: key.into(), message: message.into() }
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt { key: key.into(), reason: reason.into() }
    }
}

impl From<serde_json::Error> for DeferralError {
    fn from(err: serde_json::Error) -> Self {
        Self::Common(err.into())
    }
}

impl ErrorClassification for DeferralError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Storage { .. } => true,
            Self::Common(err) => err.is_retryable(),
            Self::Corrupt { .. } | Self::UnsupportedVersion(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Storage { .. } => ErrorSeverity::Error,
            Self::Corrupt { .. } | Self::UnsupportedVersion(_) => ErrorSeverity::Warning,
            Self::Common(err) => err.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<DeferralError> for TidelinkError {
    fn from(err: DeferralError) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_state_is_a_warning_not_retryable() {
        let err = DeferralError::corrupt("offline_requests", "checksum mismatch");
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(
            err.to_string(),
            "Stored deferrals for 'offline_requests' are corrupt: checksum mismatch"
        );
    }

    #[test]
    fn json_errors_become_serialization_failures() {
        let json_err = serde_json::from_str::<u8>("nope").unwrap_err();
        let err: DeferralError = json_err.into();
        assert!(matches!(err, DeferralError::Common(CommonError::Serialization { .. })));
    }
}
