//! Persisted projection of requests held back while offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFERRAL_FORMAT_VERSION;
use crate::types::request::RequestDescriptor;

/// One request waiting for connectivity.
///
/// Callbacks are not part of this record; see [`ReplayReport::detached`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredEntry {
    #[serde(flatten)]
    pub request: RequestDescriptor,
    pub priority: i64,
    pub timestamp: DateTime<Utc>,
}

/// Versioned document written to durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDeferrals {
    pub version: u32,
    pub entries: Vec<DeferredEntry>,
}

impl PersistedDeferrals {
    #[must_use]
    pub fn new(entries: Vec<DeferredEntry>) -> Self {
        Self { version: DEFERRAL_FORMAT_VERSION, entries }
    }

    /// Entries in ascending timestamp order. Ties keep stored order.
    #[must_use]
    pub fn into_replay_order(mut self) -> Vec<DeferredEntry> {
        self.entries.sort_by_key(|entry| entry.timestamp);
        self.entries
    }
}

/// Outcome of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Entries handed back to the submission path.
    pub replayed: usize,
    /// Of those, entries restored from storage after a restart. They replay
    /// without the originating caller's callbacks.
    pub detached: usize,
}

impl ReplayReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.replayed == 0
    }
}
