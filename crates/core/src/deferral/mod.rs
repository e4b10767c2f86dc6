//! Durable deferral of requests made while offline
//!
//! Deferred requests are persisted immediately and replayed in the order
//! they were deferred once connectivity returns.

pub mod errors;
pub mod memory;
pub mod ports;
pub mod store;

pub use errors::DeferralError;
pub use memory::MemoryDeferralStorage;
pub use ports::{DeferralStorage, RequestSink};
pub use store::DeferralStore;
