//! Session error types

use std::time::Duration;

use thiserror::Error;
use tidelink_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use tidelink_domain::TidelinkError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No Tokio runtime is available to drive the session")]
    NoRuntime,

    #[error("No duplex session is configured")]
    NotConfigured,

    #[error("Handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed by peer")]
    Closed,

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for SessionError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::HandshakeTimeout(_) | Self::Transport(_) | Self::Closed => true,
            Self::NoRuntime | Self::NotConfigured => false,
            Self::Common(err) => err.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::HandshakeTimeout(_) | Self::Closed => ErrorSeverity::Warning,
            Self::Transport(_) | Self::NotConfigured => ErrorSeverity::Error,
            Self::NoRuntime => ErrorSeverity::Critical,
            Self::Common(err) => err.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::NoRuntime)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HandshakeTimeout(_) | Self::Closed => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

impl From<SessionError> for TidelinkError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoRuntime => Self::Internal(err.to_string()),
            other => Self::Session(other.to_string()),
        }
    }
}
