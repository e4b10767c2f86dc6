use std::sync::Arc;

use tidelink_common::testing::Clock;
use tidelink_domain::constants::DEFERRAL_FORMAT_VERSION;
use tidelink_domain::{DeferredEntry, PersistedDeferrals, ReplayReport, RequestDescriptor};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::errors::DeferralError;
use super::ports::{DeferralStorage, RequestSink};
use crate::scheduler::Completion;

/// A deferred request plus the in-memory completion that cannot be persisted.
struct PendingEntry {
    entry: DeferredEntry,
    completion: Completion,
}

/// Requests held back while offline.
///
/// Every mutation rewrites the whole pending set to storage while holding
/// the store's lock, so concurrent deferrals cannot lose each other's
/// updates. Storage failures are logged and never surface to callers.
///
/// Completions only live in memory. Entries restored from storage after a
/// restart replay as detached requests and are counted in
/// [`ReplayReport::detached`].
pub struct DeferralStore {
    storage: Arc<dyn DeferralStorage>,
    key: String,
    clock: Arc<dyn Clock>,
    pending: Mutex<Vec<PendingEntry>>,
}

impl DeferralStore {
    /// Opens the store, restoring any previously persisted entries.
    ///
    /// Unreadable or corrupt state is treated as an empty set.
    #[instrument(skip(storage, clock))]
    pub async fn open(storage: Arc<dyn DeferralStorage>, key: &str, clock: Arc<dyn Clock>) -> Self {
        let restored = match Self::load_entries(storage.as_ref(), key).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(key, error = %err, "Discarding unreadable deferral state");
                Vec::new()
            }
        };

        if !restored.is_empty() {
            info!(key, count = restored.len(), "Restored deferred requests");
        }

        let pending = restored
            .into_iter()
            .map(|entry| PendingEntry { entry, completion: Completion::detached() })
            .collect();

        Self { storage, key: key.to_string(), clock, pending: Mutex::new(pending) }
    }

    async fn load_entries(
        storage: &dyn DeferralStorage,
        key: &str,
    ) -> Result<Vec<DeferredEntry>, DeferralError> {
        let Some(blob) = storage.load(key).await? else {
            return Ok(Vec::new());
        };
        if blob.is_empty() {
            return Ok(Vec::new());
        }

        let doc: PersistedDeferrals =
            serde_json::from_slice(&blob).map_err(|e| DeferralError::corrupt(key, e.to_string()))?;
        if doc.version != DEFERRAL_FORMAT_VERSION {
            return Err(DeferralError::UnsupportedVersion(doc.version));
        }
        Ok(doc.into_replay_order())
    }

    /// Records `request` with the current timestamp and persists the full
    /// pending set.
    #[instrument(skip(self, request, completion), fields(url = %request.url))]
    pub async fn defer(&self, request: RequestDescriptor, completion: Completion, priority: i64) {
        let mut pending = self.pending.lock().await;
        let entry = DeferredEntry { request, priority, timestamp: self.clock.utc_now() };
        pending.push(PendingEntry { entry, completion });
        debug!(pending = pending.len(), "Request deferred");
        let blob = self.encode(&pending);
        self.write(blob).await;
    }

    /// Hands every pending entry to `sink` in ascending timestamp order.
    ///
    /// The pending set is cleared and persisted empty before the first
    /// entry is resubmitted, so a request deferred again during replay is
    /// stored afresh rather than lost. Safe to call with nothing pending.
    #[instrument(skip(self, sink))]
    pub async fn replay_all(&self, sink: &dyn RequestSink) -> ReplayReport {
        let mut entries = {
            let mut pending = self.pending.lock().await;
            if pending.is_empty() {
                return ReplayReport::default();
            }
            let entries = std::mem::take(&mut *pending);
            let blob = self.encode(&pending);
            self.write(blob).await;
            entries
        };

        entries.sort_by_key(|pending| pending.entry.timestamp);

        let mut report = ReplayReport::default();
        for PendingEntry { entry, completion } in entries {
            if completion.is_detached() {
                report.detached += 1;
            }
            report.replayed += 1;
            sink.submit(entry.request, completion, entry.priority).await;
        }

        info!(replayed = report.replayed, detached = report.detached, "Deferred requests replayed");
        report
    }

    /// Writes the current pending set to storage.
    pub async fn flush(&self) {
        let pending = self.pending.lock().await;
        let blob = self.encode(&pending);
        self.write(blob).await;
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Encodes the pending set. Completions are neither persisted nor
    /// borrowed past this call.
    fn encode(&self, pending: &[PendingEntry]) -> Option<Vec<u8>> {
        let doc = PersistedDeferrals::new(pending.iter().map(|p| p.entry.clone()).collect());
        match serde_json::to_vec(&doc) {
            Ok(blob) => Some(blob),
            Err(err) => {
                warn!(key = %self.key, error = %err, "Failed to encode deferred requests");
                None
            }
        }
    }

    async fn write(&self, blob: Option<Vec<u8>>) {
        let Some(blob) = blob else { return };
        if let Err(err) = self.storage.save(&self.key, &blob).await {
            warn!(key = %self.key, error = %err, "Failed to persist deferred requests");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tidelink_common::testing::MockClock;
    use tidelink_domain::{HttpMethod, RequestBuilder};

    use super::*;
    use crate::deferral::MemoryDeferralStorage;

    const KEY: &str = "offline_requests";

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<(String, i64, bool)>>,
    }

    #[async_trait]
    impl RequestSink for RecordingSink {
        async fn submit(&self, request: RequestDescriptor, completion: Completion, priority: i64) {
            self.submitted.lock().await.push((request.url, priority, completion.is_detached()));
        }
    }

    struct FailingStorage;

    #[async_trait]
    impl DeferralStorage for FailingStorage {
        async fn save(&self, key: &str, _blob: &[u8]) -> Result<(), DeferralError> {
            Err(DeferralError::storage(key, "disk full"))
        }

        async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, DeferralError> {
            Err(DeferralError::storage(key, "unreadable"))
        }
    }

    fn request(url: &str) -> RequestDescriptor {
        RequestBuilder::new(HttpMethod::Post).url(url).build().unwrap()
    }

    fn stored_count(storage: &MemoryDeferralStorage) -> usize {
        let blob = storage.get(KEY).unwrap();
        serde_json::from_slice::<PersistedDeferrals>(&blob).unwrap().entries.len()
    }

    #[tokio::test]
    async fn defer_persists_immediately() {
        let storage = Arc::new(MemoryDeferralStorage::new());
        let store = DeferralStore::open(storage.clone(), KEY, Arc::new(MockClock::new())).await;

        store.defer(request("https://x/1"), Completion::new(|_| {}, |_| {}), 1).await;
        assert_eq!(stored_count(&storage), 1);

        store.defer(request("https://x/2"), Completion::new(|_| {}, |_| {}), 3).await;
        assert_eq!(stored_count(&storage), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn replay_follows_timestamps_and_keeps_priorities() {
        let storage = Arc::new(MemoryDeferralStorage::new());
        let clock = Arc::new(MockClock::new());
        let store = DeferralStore::open(storage.clone(), KEY, clock.clone()).await;

        store.defer(request("https://x/first"), Completion::new(|_| {}, |_| {}), 0).await;
        clock.advance(Duration::from_secs(1));
        store.defer(request("https://x/second"), Completion::new(|_| {}, |_| {}), 3).await;
        clock.advance(Duration::from_secs(1));
        store.defer(request("https://x/third"), Completion::new(|_| {}, |_| {}), 1).await;

        let sink = RecordingSink::default();
        let report = store.replay_all(&sink).await;

        assert_eq!(report, ReplayReport { replayed: 3, detached: 0 });
        let submitted = sink.submitted.lock().await.clone();
        assert_eq!(
            submitted,
            vec![
                ("https://x/first".to_string(), 0, false),
                ("https://x/second".to_string(), 3, false),
                ("https://x/third".to_string(), 1, false),
            ]
        );
        assert!(store.is_empty().await);
        assert_eq!(stored_count(&storage), 0);
    }

    #[tokio::test]
    async fn replay_with_nothing_pending_is_a_noop() {
        let storage = Arc::new(MemoryDeferralStorage::new());
        let store = DeferralStore::open(storage.clone(), KEY, Arc::new(MockClock::new())).await;
        let sink = RecordingSink::default();

        assert!(store.replay_all(&sink).await.is_empty());
        assert!(sink.submitted.lock().await.is_empty());
        assert!(storage.get(KEY).is_none());
    }

    #[tokio::test]
    async fn restored_entries_replay_detached() {
        let previous = Arc::new(MemoryDeferralStorage::new());
        let clock = Arc::new(MockClock::new());
        {
            let store = DeferralStore::open(previous.clone(), KEY, clock.clone()).await;
            store.defer(request("https://x/kept"), Completion::new(|_| {}, |_| {}), 2).await;
        }

        let restarted = DeferralStore::open(previous.clone(), KEY, clock).await;
        assert_eq!(restarted.len().await, 1);

        let sink = RecordingSink::default();
        let report = restarted.replay_all(&sink).await;
        assert_eq!(report, ReplayReport { replayed: 1, detached: 1 });
        assert_eq!(sink.submitted.lock().await[0], ("https://x/kept".to_string(), 2, true));
    }

    #[tokio::test]
    async fn corrupt_state_opens_empty() {
        let storage = Arc::new(
            MemoryDeferralStorage::new().with_blob(KEY, b"{ definitely not json".to_vec()),
        );
        let store = DeferralStore::open(storage, KEY, Arc::new(MockClock::new())).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_version_opens_empty() {
        let storage = Arc::new(
            MemoryDeferralStorage::new().with_blob(KEY, br#"{"version":9,"entries":[]}"#.to_vec()),
        );
        let store = DeferralStore::open(storage, KEY, Arc::new(MockClock::new())).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn storage_failures_are_contained() {
        let store =
            DeferralStore::open(Arc::new(FailingStorage), KEY, Arc::new(MockClock::new())).await;
        store.defer(request("https://x/1"), Completion::new(|_| {}, |_| {}), 1).await;
        assert_eq!(store.len().await, 1);

        let sink = RecordingSink::default();
        assert_eq!(store.replay_all(&sink).await.replayed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deferrals_are_all_persisted() {
        let storage = Arc::new(MemoryDeferralStorage::new());
        let store =
            Arc::new(DeferralStore::open(storage.clone(), KEY, Arc::new(MockClock::new())).await);

        let handles: Vec<_> = (0..16)
            .map(|idx| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .defer(request(&format!("https://x/{idx}")), Completion::detached(), 1)
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(stored_count(&storage), 16);
    }
}
