//! Specialized data structures
//!
//! This module provides the queueing structures used by the request
//! scheduler:
//! - **[`tiered_queue`]**: Array of FIFO queues indexed by priority tier
//!
//! ## Usage
//!
//! ```rust
//! use tidelink_common::collections::TieredQueue;
//!
//! let mut queue = TieredQueue::new(4);
//! let tier = queue.clamp_tier(7);
//! queue.push_back(tier, "sync-profile");
//! assert_eq!(queue.pop_highest(), Some((3, "sync-profile")));
//! ```

pub mod tiered_queue;

// Re-export commonly used types
pub use tiered_queue::TieredQueue;
