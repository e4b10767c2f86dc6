//! Testing utilities and helpers
//!
//! - **[`time`]**: Clock abstraction with a controllable mock, also used by
//!   production code that needs injectable wall-clock time

pub mod time;

pub use time::{Clock, MockClock, SystemClock};
