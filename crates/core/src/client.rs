//! Network client: the single entry point callers talk to.
//!
//! Routes each request to the scheduler while the link is reachable and to
//! the deferral store while it is not, replays deferred work when the
//! connectivity monitor reports the link is back, and owns the optional
//! duplex session.

use std::sync::Arc;

use async_trait::async_trait;
use tidelink_domain::constants::DEFAULT_PRIORITY;
use tidelink_domain::{
    NetworkError, ReplayReport, RequestDescriptor, Response, Result, SubscriberId,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::connectivity::{
    ConnectivityListener, ConnectivityMonitor, ConnectivityMonitorConfig, ConnectivityProbe,
};
use crate::deferral::{DeferralStore, RequestSink};
use crate::scheduler::{Completion, RequestScheduler};
use crate::session::{DuplexSession, MessageHandler, SessionError};

/// Explicitly constructed owner of the scheduler, deferral store, session
/// and connectivity monitor.
pub struct NetworkClient {
    inner: Arc<ClientInner>,
    monitor: Mutex<ConnectivityMonitor>,
}

struct ClientInner {
    scheduler: RequestScheduler,
    deferrals: DeferralStore,
    session: Option<DuplexSession>,
    probe: Arc<dyn ConnectivityProbe>,
}

impl NetworkClient {
    pub fn new(
        scheduler: RequestScheduler,
        deferrals: DeferralStore,
        probe: Arc<dyn ConnectivityProbe>,
        session: Option<DuplexSession>,
        monitor_config: ConnectivityMonitorConfig,
    ) -> Self {
        let inner = Arc::new(ClientInner { scheduler, deferrals, session, probe });
        let listener: Arc<dyn ConnectivityListener> = inner.clone();
        let monitor = ConnectivityMonitor::new(Arc::clone(&inner.probe), listener, monitor_config);
        Self { inner, monitor: Mutex::new(monitor) }
    }

    /// Starts connectivity monitoring. When the link is already up, requests
    /// restored from a previous run are replayed straight away.
    ///
    /// # Errors
    /// Fails if the client is already started.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        self.monitor.lock().await.start()?;

        if self.inner.probe.is_reachable() && !self.inner.deferrals.is_empty().await {
            let report = self.inner.deferrals.replay_all(self.inner.as_ref()).await;
            info!(replayed = report.replayed, "Replayed requests deferred before start-up");
        }
        Ok(())
    }

    /// Submits `request` at `priority`, or defers it while offline.
    pub async fn send_request(
        &self,
        request: RequestDescriptor,
        completion: Completion,
        priority: i64,
    ) {
        self.inner.route(request, completion, priority).await;
    }

    /// [`Self::send_request`] at the default priority.
    pub async fn send_request_default(&self, request: RequestDescriptor, completion: Completion) {
        self.send_request(request, completion, DEFAULT_PRIORITY).await;
    }

    /// Submits `request` and waits for its terminal outcome.
    ///
    /// While offline this waits until the request has been replayed and
    /// completed.
    pub async fn request(
        &self,
        request: RequestDescriptor,
        priority: i64,
    ) -> std::result::Result<Response, NetworkError> {
        let (completion, outcome) = Completion::channel();
        self.send_request(request, completion, priority).await;
        outcome.await.unwrap_or_else(|_| Err(NetworkError::cancelled()))
    }

    /// Best-effort text message over the session; dropped unless connected.
    pub async fn send_session_message(&self, text: &str) {
        match &self.inner.session {
            Some(session) => session.send(text).await,
            None => debug!("No duplex session configured; dropping message"),
        }
    }

    /// # Errors
    /// [`SessionError::NotConfigured`] when the client has no session.
    pub fn subscribe_session(
        &self,
        handler: MessageHandler,
    ) -> std::result::Result<SubscriberId, SessionError> {
        self.session().map(|session| session.subscribe(handler))
    }

    /// # Errors
    /// [`SessionError::NotConfigured`] when the client has no session.
    pub fn unsubscribe_session(&self, id: SubscriberId) -> std::result::Result<bool, SessionError> {
        self.session().map(|session| session.unsubscribe(id))
    }

    /// # Errors
    /// [`SessionError::NotConfigured`] or the session's connect error.
    pub async fn connect_session(&self) -> std::result::Result<(), SessionError> {
        self.session()?.connect().await
    }

    /// # Errors
    /// [`SessionError::NotConfigured`] or the transport's close error.
    pub async fn disconnect_session(&self) -> std::result::Result<(), SessionError> {
        self.session()?.disconnect().await
    }

    /// Replays every deferred request through the normal routing path.
    pub async fn replay_deferred(&self) -> ReplayReport {
        self.inner.deferrals.replay_all(self.inner.as_ref()).await
    }

    pub fn is_online(&self) -> bool {
        self.inner.probe.is_reachable()
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.inner.scheduler
    }

    pub fn deferrals(&self) -> &DeferralStore {
        &self.inner.deferrals
    }

    /// # Errors
    /// [`SessionError::NotConfigured`] when the client has no session.
    pub fn session(&self) -> std::result::Result<&DuplexSession, SessionError> {
        self.inner.session.as_ref().ok_or(SessionError::NotConfigured)
    }

    /// Stops monitoring, disconnects the session, drains the scheduler and
    /// flushes the deferral store.
    ///
    /// Every queued request receives a terminal callback before this
    /// returns. Deferred requests stay persisted for the next run.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        {
            let mut monitor = self.monitor.lock().await;
            if monitor.is_running() {
                if let Err(err) = monitor.stop().await {
                    warn!(error = %err, "Failed to stop connectivity monitor");
                }
            }
        }

        if let Some(session) = &self.inner.session {
            if let Err(err) = session.disconnect().await {
                warn!(error = %err, "Failed to close duplex session cleanly");
            }
        }

        self.inner.scheduler.shutdown().await;
        self.inner.deferrals.flush().await;
        info!("Network client shut down");
    }
}

impl ClientInner {
    async fn route(&self, request: RequestDescriptor, completion: Completion, priority: i64) {
        if self.probe.is_reachable() {
            self.scheduler.submit(request, completion, priority);
        } else {
            debug!(url = %request.url, priority, "Offline; deferring request");
            self.deferrals.defer(request, completion, priority).await;
        }
    }
}

#[async_trait]
impl RequestSink for ClientInner {
    async fn submit(&self, request: RequestDescriptor, completion: Completion, priority: i64) {
        self.route(request, completion, priority).await;
    }
}

#[async_trait]
impl ConnectivityListener for ClientInner {
    async fn on_reachability_restored(&self) {
        let report = self.deferrals.replay_all(self).await;
        if !report.is_empty() {
            info!(
                replayed = report.replayed,
                detached = report.detached,
                "Connectivity restored; deferred requests replayed"
            );
        }
    }
}
