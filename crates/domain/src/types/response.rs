//! Outcomes delivered to completion callbacks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{SHUTDOWN_MESSAGE, SIGNATURE_FAILURE_MESSAGE, TIMEOUT_MESSAGE};
use crate::impl_domain_enum_conversions;
use crate::types::request::RequestContext;

/// A completed, verified exchange.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
    /// Copied from the originating descriptor.
    pub context: Option<RequestContext>,
}

impl Response {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body interpreted as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Which part of the exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection-level failure; the server was never heard from.
    Transport,
    /// Client-side deadline expired.
    Timeout,
    /// The server answered with a non-2xx status.
    Application,
    /// The response failed integrity verification.
    Signature,
    /// The scheduler shut down while the request was still pending.
    Cancelled,
}

impl_domain_enum_conversions!(FailureKind {
    Transport => "transport",
    Timeout => "timeout",
    Application => "application",
    Signature => "signature",
    Cancelled => "cancelled",
});

/// Terminal failure surfaced to a request's error callback.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} failure (code {code}): {message}")]
#[serde(rename_all = "camelCase")]
pub struct NetworkError {
    /// HTTP status for application failures, `0` otherwise.
    pub code: u16,
    pub message: String,
    /// `true` only for transport-layer failures.
    pub is_network_error: bool,
    pub kind: FailureKind,
}

impl NetworkError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
            is_network_error: true,
            kind: FailureKind::Transport,
        }
    }

    #[must_use]
    pub fn timeout() -> Self {
        Self {
            code: 0,
            message: TIMEOUT_MESSAGE.to_string(),
            is_network_error: false,
            kind: FailureKind::Timeout,
        }
    }

    pub fn application(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            code: status_code,
            message: message.into(),
            is_network_error: false,
            kind: FailureKind::Application,
        }
    }

    #[must_use]
    pub fn signature(status_code: u16) -> Self {
        Self {
            code: status_code,
            message: SIGNATURE_FAILURE_MESSAGE.to_string(),
            is_network_error: false,
            kind: FailureKind::Signature,
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            code: 0,
            message: SHUTDOWN_MESSAGE.to_string(),
            is_network_error: false,
            kind: FailureKind::Cancelled,
        }
    }

    /// Transport, timeout and application failures may be retried; signature
    /// and cancellation failures never are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Transport | FailureKind::Timeout | FailureKind::Application
        )
    }
}
