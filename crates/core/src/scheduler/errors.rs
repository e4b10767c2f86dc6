//! Scheduler error types

use std::time::Duration;

use thiserror::Error;
use tidelink_common::error::{ErrorClassification, ErrorSeverity};
use tidelink_domain::TidelinkError;

/// Errors raised while constructing or driving the scheduler.
///
/// Request failures never surface here; they are delivered to the request's
/// error callback as a [`tidelink_domain::NetworkError`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("No Tokio runtime is available to drive the scheduler")]
    NoRuntime,

    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

impl ErrorClassification for SchedulerError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<SchedulerError> for TidelinkError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NoRuntime => Self::Internal(err.to_string()),
            SchedulerError::InvalidConfig(msg) => Self::Config(msg),
        }
    }
}
