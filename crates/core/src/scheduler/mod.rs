//! Priority-tiered request scheduler
//!
//! Requests wait in one FIFO queue per priority tier and are admitted into a
//! bounded number of execution slots, highest tier first. Failed attempts are
//! rescheduled according to the descriptor's retry policy; every submission
//! ends in exactly one success or error callback.

pub mod errors;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod task;

pub use errors::SchedulerError;
pub use metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
pub use ports::{HttpTransport, PayloadSigner, TransportError, TransportRequest, TransportResponse};
pub use service::RequestScheduler;
pub use task::Completion;
