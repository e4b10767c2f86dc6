//! Domain constants
//!
//! Centralized location for header names, defaults and wire-level strings
//! used throughout the tidelink crates.

// Header contract
pub const API_SIGNATURE_HEADER: &str = "X-Api-Signature";
pub const DATA_SIGN_HEADER: &str = "X-Data-Sign";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-protobuf";

// Request defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_PRIORITY: i64 = 1;
pub const LINEAR_RETRY_DELAY_SECS: u64 = 2;

// Scheduler defaults
pub const DEFAULT_TIER_COUNT: usize = 4;
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

// Duplex session defaults
pub const DEFAULT_HEARTBEAT_SECS: u64 = 5;
pub const DEFAULT_KEEPALIVE_PAYLOAD: &str = "ping";
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

// Connectivity defaults
pub const DEFAULT_CONNECTIVITY_POLL_SECS: u64 = 5;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1500;

// Deferral store
pub const DEFAULT_DEFERRAL_KEY: &str = "offline_requests";
pub const DEFERRAL_FORMAT_VERSION: u32 = 1;

// Failure messages
pub const TIMEOUT_MESSAGE: &str = "Request timed out";
pub const SIGNATURE_FAILURE_MESSAGE: &str = "Response signature verification failed";
pub const SHUTDOWN_MESSAGE: &str = "Scheduler shut down before the request completed";

/// `yyyyMMddHHmmss` in UTC, embedded in request signatures.
pub const SIGNATURE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
