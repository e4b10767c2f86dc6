//! Periodic reachability sampling with edge-triggered notifications.
//!
//! The monitor owns one background task. It samples its probe every
//! `poll_interval` and calls the listener only on transitions, so a link
//! that stays up or stays down produces no callbacks. Join handles are
//! tracked and cancellation is explicit, the same lifecycle the other
//! background workers in this workspace follow.

use std::sync::Arc;
use std::time::Duration;

use tidelink_domain::{ConnectivityConfig, Result, TidelinkError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::{ConnectivityListener, ConnectivityProbe};

/// Configuration for the connectivity monitor.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitorConfig {
    /// Interval between probe samples
    pub poll_interval: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for ConnectivityMonitorConfig {
    fn default() -> Self {
        Self::from(&ConnectivityConfig::default())
    }
}

impl From<&ConnectivityConfig> for ConnectivityMonitorConfig {
    fn from(config: &ConnectivityConfig) -> Self {
        Self { poll_interval: config.poll_interval(), join_timeout: Duration::from_secs(5) }
    }
}

/// Connectivity monitor with explicit lifecycle management.
pub struct ConnectivityMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    listener: Arc<dyn ConnectivityListener>,
    config: ConnectivityMonitorConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ConnectivityMonitor {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        listener: Arc<dyn ConnectivityListener>,
        config: ConnectivityMonitorConfig,
    ) -> Self {
        Self { probe, listener, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Start sampling. The first sample is the baseline and never fires a
    /// notification by itself.
    ///
    /// # Errors
    /// Returns [`TidelinkError::Internal`] if the monitor is already running.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(TidelinkError::Internal("Connectivity monitor already running".into()));
        }

        self.cancellation = CancellationToken::new();
        let probe = Arc::clone(&self.probe);
        let listener = Arc::clone(&self.listener);
        let poll_interval = self.config.poll_interval;
        let cancel = self.cancellation.clone();
        let baseline = probe.is_reachable();

        let handle = tokio::spawn(async move {
            Self::poll_loop(probe, listener, poll_interval, baseline, cancel).await;
        });

        self.task_handle = Some(handle);
        info!(
            poll_secs = poll_interval.as_secs(),
            reachable = baseline,
            "Connectivity monitor started"
        );
        Ok(())
    }

    /// Stop sampling and wait for the background task to finish.
    ///
    /// # Errors
    /// Returns [`TidelinkError::Internal`] if the monitor is not running or
    /// its task panicked or failed to stop in time.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(TidelinkError::Internal("Connectivity monitor not running".into()));
        }

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Connectivity monitor task panicked: {}", e);
                    return Err(TidelinkError::Internal(
                        "Connectivity monitor task panicked".into(),
                    ));
                }
                Err(_) => {
                    warn!("Connectivity monitor did not stop within timeout");
                    return Err(TidelinkError::Internal("Connectivity monitor stop timeout".into()));
                }
            }
        }

        info!("Connectivity monitor stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn poll_loop(
        probe: Arc<dyn ConnectivityProbe>,
        listener: Arc<dyn ConnectivityListener>,
        poll_interval: Duration,
        mut was_reachable: bool,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Connectivity poll loop cancelled");
                    break;
                }
                () = tokio::time::sleep(poll_interval) => {
                    let reachable = probe.is_reachable();
                    match (was_reachable, reachable) {
                        (false, true) => {
                            info!("Connectivity restored");
                            listener.on_reachability_restored().await;
                        }
                        (true, false) => {
                            info!("Connectivity lost");
                            listener.on_reachability_lost().await;
                        }
                        _ => {}
                    }
                    was_reachable = reachable;
                }
            }
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ConnectivityMonitor dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tidelink_domain::LinkQuality;

    use super::*;
    use crate::connectivity::ManualLinkProbe;

    #[derive(Default)]
    struct CountingListener {
        restored: AtomicUsize,
        lost: AtomicUsize,
    }

    #[async_trait]
    impl ConnectivityListener for CountingListener {
        async fn on_reachability_restored(&self) {
            self.restored.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_reachability_lost(&self) {
            self.lost.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> ConnectivityMonitorConfig {
        ConnectivityMonitorConfig {
            poll_interval: Duration::from_secs(5),
            join_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_only_on_transitions() {
        let probe = Arc::new(ManualLinkProbe::new(LinkQuality::Unreachable));
        let listener = Arc::new(CountingListener::default());
        let mut monitor = ConnectivityMonitor::new(probe.clone(), listener.clone(), config());
        monitor.start().unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(listener.restored.load(Ordering::SeqCst), 0);

        probe.set(LinkQuality::Metered);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(listener.restored.load(Ordering::SeqCst), 1);

        probe.set(LinkQuality::Unreachable);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(listener.lost.load(Ordering::SeqCst), 1);

        probe.set(LinkQuality::HighQuality);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(listener.restored.load(Ordering::SeqCst), 2);

        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn starting_online_is_not_a_transition() {
        let probe = Arc::new(ManualLinkProbe::new(LinkQuality::HighQuality));
        let listener = Arc::new(CountingListener::default());
        let mut monitor = ConnectivityMonitor::new(probe, listener.clone(), config());
        monitor.start().unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(listener.restored.load(Ordering::SeqCst), 0);
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_and_stop_are_guarded() {
        let probe = Arc::new(ManualLinkProbe::default());
        let listener = Arc::new(CountingListener::default());
        let mut monitor = ConnectivityMonitor::new(probe, listener, config());

        assert!(monitor.stop().await.is_err());
        monitor.start().unwrap();
        assert!(monitor.start().is_err());
        assert!(monitor.is_running());
        monitor.stop().await.unwrap();
        assert!(!monitor.is_running());
    }
}
