//! Port interfaces consumed by the scheduler

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tidelink_domain::{HttpMethod, RequestDescriptor};

/// One attempt as handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl TransportRequest {
    /// Copies the wire-relevant fields of `descriptor`.
    #[must_use]
    pub fn from_descriptor(descriptor: &RequestDescriptor) -> Self {
        Self {
            method: descriptor.method,
            url: descriptor.url.clone(),
            headers: descriptor.headers.clone(),
            body: descriptor.body.clone(),
            timeout: descriptor.timeout,
        }
    }
}

/// Whatever the server answered, 2xx or not.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Connection-level failure: no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Executes a single request attempt.
///
/// Dropping the returned future must abort the attempt; the scheduler relies
/// on this to enforce per-request timeouts.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Produces request signatures and verifies response signatures.
pub trait PayloadSigner: Send + Sync {
    /// Signature attached to an outgoing request body.
    fn sign(&self, payload: &[u8]) -> String;

    /// Checks a response body against its signature header. Missing or empty
    /// signatures verify as `false`.
    fn verify(&self, payload: &[u8], signature: Option<&str>) -> bool;
}
