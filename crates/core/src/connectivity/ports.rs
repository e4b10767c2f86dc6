//! Port interfaces for connectivity sampling

use async_trait::async_trait;
use tidelink_domain::LinkQuality;

/// Reports the current link quality without blocking.
pub trait ConnectivityProbe: Send + Sync {
    fn link_quality(&self) -> LinkQuality;

    fn is_reachable(&self) -> bool {
        self.link_quality().is_reachable()
    }
}

/// Receives reachability transitions observed by the monitor.
#[async_trait]
pub trait ConnectivityListener: Send + Sync {
    /// The link went from unreachable to reachable.
    async fn on_reachability_restored(&self);

    /// The link went from reachable to unreachable.
    async fn on_reachability_lost(&self) {}
}
