//! Port interfaces for the duplex session

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::SessionError;

/// Error a subscriber may return; it is logged and does not affect other
/// subscribers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback for inbound session messages.
pub type MessageHandler = Arc<dyn Fn(&str) -> Result<(), HandlerError> + Send + Sync>;

/// Connect/send/receive/close over some bidirectional channel.
///
/// `send` and `receive` may be awaited concurrently from different tasks.
#[async_trait]
pub trait DuplexTransport: Send + Sync {
    /// Performs the handshake.
    async fn connect(&self) -> Result<(), SessionError>;

    async fn send(&self, message: &str) -> Result<(), SessionError>;

    /// Next inbound text message, or `None` once the peer has closed.
    async fn receive(&self) -> Result<Option<String>, SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}
