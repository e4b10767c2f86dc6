//! # Tidelink Domain
//!
//! Pure data types for the tidelink network access layer.
//!
//! This crate contains:
//! - Request descriptors, the request builder and responses
//! - The network error surfaced to completion callbacks
//! - Deferred entries and their persisted envelope
//! - Session state and link quality enums
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other tidelink crates
//! - Only external dependencies allowed
//! - No I/O, no async

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
