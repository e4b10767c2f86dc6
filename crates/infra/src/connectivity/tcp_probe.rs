//! Reachability probe that dials a TCP endpoint in the background.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tidelink_core::{ConnectivityProbe, ManualLinkProbe};
use tidelink_domain::{ConnectivityConfig, LinkQuality};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Answers [`ConnectivityProbe`] queries from the result of the last dial.
///
/// A successful connect reports the configured reachable quality, a failed
/// or timed-out one reports [`LinkQuality::Unreachable`]. Queries never
/// block; [`TcpReachabilityProbe::start`] keeps the answer fresh.
pub struct TcpReachabilityProbe {
    address: String,
    dial_timeout: Duration,
    refresh_interval: Duration,
    reachable_quality: LinkQuality,
    current: ManualLinkProbe,
    cancellation: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TcpReachabilityProbe {
    /// New probe; the link is assumed reachable until the first dial says
    /// otherwise.
    pub fn new(config: &ConnectivityConfig) -> Self {
        Self {
            address: config.probe_address.clone(),
            dial_timeout: config.probe_timeout(),
            refresh_interval: config.poll_interval(),
            reachable_quality: config.reachable_quality,
            current: ManualLinkProbe::new(config.reachable_quality),
            cancellation: CancellationToken::new(),
            task_handle: Mutex::new(None),
        }
    }

    /// Dials the endpoint once and records the outcome.
    pub async fn refresh(&self) -> LinkQuality {
        let quality =
            match tokio::time::timeout(self.dial_timeout, TcpStream::connect(&self.address)).await {
                Ok(Ok(_stream)) => self.reachable_quality,
                Ok(Err(err)) => {
                    debug!(address = %self.address, error = %err, "Probe dial failed");
                    LinkQuality::Unreachable
                }
                Err(_) => {
                    debug!(address = %self.address, "Probe dial timed out");
                    LinkQuality::Unreachable
                }
            };
        self.current.set(quality);
        quality
    }

    /// Dials once, then keeps refreshing every poll interval until
    /// [`Self::stop`] or drop. Calling it again while running is a no-op;
    /// a stopped probe stays stopped.
    pub async fn start(self: &Arc<Self>) {
        if self.task_handle.lock().is_some() {
            return;
        }
        self.refresh().await;

        let probe: Weak<Self> = Arc::downgrade(self);
        let interval = self.refresh_interval;
        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        let Some(probe) = probe.upgrade() else { break };
                        probe.refresh().await;
                    }
                }
            }
            debug!("TCP probe refresher stopped");
        });
        *self.task_handle.lock() = Some(handle);
        info!(address = %self.address, "TCP reachability probe started");
    }

    pub async fn stop(&self) {
        self.cancellation.cancel();
        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl ConnectivityProbe for TcpReachabilityProbe {
    fn link_quality(&self) -> LinkQuality {
        self.current.link_quality()
    }
}

impl Drop for TcpReachabilityProbe {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
