//! # Tidelink Infrastructure
//!
//! Concrete adapters for the ports defined in `tidelink-core`.
//!
//! This crate contains:
//! - The `reqwest` HTTP transport
//! - The `tokio-tungstenite` duplex transport
//! - HMAC request signing and device identity
//! - File-backed deferral storage
//! - A TCP reachability probe
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `tidelink-core`
//! - Depends on `tidelink-domain` and `tidelink-core`
//! - Contains all "impure" code (sockets, files, environment)
//! - [`ClientContext`] wires everything into a running client

pub mod config;
pub mod connectivity;
pub mod context;
pub mod errors;
pub mod http;
pub mod observability;
pub mod realtime;
pub mod security;
pub mod storage;

// Re-export commonly used items
pub use connectivity::TcpReachabilityProbe;
pub use context::ClientContext;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::init_tracing;
pub use realtime::WebSocketTransport;
pub use security::HmacSigner;
pub use storage::FileDeferralStorage;
