//! Port interfaces for the deferral store

use async_trait::async_trait;
use tidelink_domain::RequestDescriptor;

use super::errors::DeferralError;
use crate::scheduler::Completion;

/// Durable blob storage keyed by a logical name.
#[async_trait]
pub trait DeferralStorage: Send + Sync {
    /// Replaces whatever is stored under `key`.
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), DeferralError>;

    /// Returns `None` when nothing has been stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, DeferralError>;
}

/// Entry path used for replayed requests, so routing decisions are made
/// afresh for each one.
#[async_trait]
pub trait RequestSink: Send + Sync {
    async fn submit(&self, request: RequestDescriptor, completion: Completion, priority: i64);
}
