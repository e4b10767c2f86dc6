//! Duplex session
//!
//! One long-lived bidirectional connection with an adaptive heartbeat and
//! fan-out of inbound messages to subscribers.

pub mod errors;
pub mod ports;
pub mod service;

pub use errors::SessionError;
pub use ports::{DuplexTransport, HandlerError, MessageHandler};
pub use service::{DuplexSession, SessionSettings};
