//! In-process storage for clients that do not persist deferrals.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::errors::DeferralError;
use super::ports::DeferralStorage;

/// Keeps saved blobs in memory; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryDeferralStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryDeferralStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `key` with `blob`, as if saved by a previous run.
    #[must_use]
    pub fn with_blob(self, key: &str, blob: Vec<u8>) -> Self {
        self.blobs.write().insert(key.to_string(), blob);
        self
    }

    /// Current blob under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(key).cloned()
    }
}

#[async_trait]
impl DeferralStorage for MemoryDeferralStorage {
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), DeferralError> {
        self.blobs.write().insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, DeferralError> {
        Ok(self.get(key))
    }
}
