//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use tidelink_domain::TidelinkError;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TidelinkError);

impl From<InfraError> for TidelinkError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TidelinkError> for InfraError {
    fn from(value: TidelinkError) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoTidelinkError {
    fn into_tidelink(self) -> TidelinkError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TidelinkError */
/* -------------------------------------------------------------------------- */

impl IntoTidelinkError for HttpError {
    fn into_tidelink(self) -> TidelinkError {
        if self.is_timeout() {
            return TidelinkError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return TidelinkError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return TidelinkError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => TidelinkError::Security(message),
                400..=499 => TidelinkError::InvalidInput(message),
                _ => TidelinkError::Network(message),
            };
        }

        TidelinkError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_tidelink())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → TidelinkError */
/* -------------------------------------------------------------------------- */

impl IntoTidelinkError for std::io::Error {
    fn into_tidelink(self) -> TidelinkError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::PermissionDenied => {
                TidelinkError::Persistence(format!("permission denied: {self}"))
            }
            ErrorKind::NotFound => TidelinkError::Persistence(format!("not found: {self}")),
            ErrorKind::TimedOut
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => TidelinkError::Network(self.to_string()),
            _ => TidelinkError::Persistence(self.to_string()),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        Self(value.into_tidelink())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → TidelinkError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(TidelinkError::from(value))
    }
}

/* -------------------------------------------------------------------------- */
/* tungstenite::Error → TidelinkError */
/* -------------------------------------------------------------------------- */

impl IntoTidelinkError for WsError {
    fn into_tidelink(self) -> TidelinkError {
        match self {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                TidelinkError::Session("WebSocket connection closed".into())
            }
            WsError::Io(err) => TidelinkError::Network(format!("WebSocket I/O failure: {err}")),
            WsError::Tls(err) => TidelinkError::Security(format!("WebSocket TLS failure: {err}")),
            WsError::Url(err) => TidelinkError::Config(format!("invalid WebSocket URL: {err}")),
            WsError::Http(response) => TidelinkError::Session(format!(
                "WebSocket upgrade rejected with HTTP {}",
                response.status().as_u16()
            )),
            other => TidelinkError::Session(other.to_string()),
        }
    }
}

impl From<WsError> for InfraError {
    fn from(value: WsError) -> Self {
        Self(value.into_tidelink())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
