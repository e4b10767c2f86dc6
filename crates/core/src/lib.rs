//! # Tidelink Core
//!
//! Scheduling, deferral and session logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The priority-tiered request scheduler
//! - The durable deferral store and its replay path
//! - The duplex session state machine
//! - Connectivity monitoring and the [`NetworkClient`] that ties them together
//! - Port interfaces (traits) for transports, storage, signing and probes
//!
//! ## Architecture Principles
//! - Only depends on `tidelink-common` and `tidelink-domain`
//! - No HTTP, socket or file system code
//! - All external capabilities via traits
//! - Deterministic under Tokio's paused clock

pub mod client;
pub mod connectivity;
pub mod deferral;
pub mod scheduler;
pub mod session;

// Re-export specific items to avoid ambiguity
pub use client::NetworkClient;
pub use connectivity::{
    ConnectivityListener, ConnectivityMonitor, ConnectivityMonitorConfig, ConnectivityProbe,
    ManualLinkProbe,
};
pub use deferral::{
    DeferralError, DeferralStorage, DeferralStore, MemoryDeferralStorage, RequestSink,
};
pub use scheduler::{
    Completion, HttpTransport, PayloadSigner, RequestScheduler, SchedulerError,
    SchedulerMetricsSnapshot, TransportError, TransportRequest, TransportResponse,
};
pub use session::{
    DuplexSession, DuplexTransport, HandlerError, MessageHandler, SessionError, SessionSettings,
};
