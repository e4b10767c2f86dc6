use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tidelink_domain::{SessionConfig, SessionState, SubscriberId};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::errors::SessionError;
use super::ports::{DuplexTransport, MessageHandler};
use crate::connectivity::ConnectivityProbe;

/// Timing and payload settings for a [`DuplexSession`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Heartbeat interval on a high-quality link.
    pub heartbeat_base: Duration,
    pub keepalive_payload: String,
    pub handshake_timeout: Duration,
    /// How long `disconnect` waits for the background loops to exit.
    pub join_timeout: Duration,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            heartbeat_base: config.heartbeat_base(),
            keepalive_payload: config.keepalive_payload.clone(),
            handshake_timeout: config.handshake_timeout(),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Connection state machine with adaptive heartbeat and subscriber fan-out.
///
/// ```text
/// Disconnected --connect--> Connecting --handshake ok--> Connected
/// Connected --disconnect--> Closing --> Disconnected
/// Connected --transport failure--> Disconnected
/// ```
///
/// While connected a heartbeat loop sends the keep-alive payload, sleeping
/// between beats for the base interval scaled by the current link quality.
/// The interval is recomputed before every beat. A listener loop fans each
/// inbound message out to the subscribers registered at the time it
/// arrived, in subscription order.
pub struct DuplexSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    transport: Arc<dyn DuplexTransport>,
    probe: Arc<dyn ConnectivityProbe>,
    settings: SessionSettings,
    state: RwLock<SessionState>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_subscriber: AtomicU64,
    heartbeats_sent: AtomicU64,
    runtime: Handle,
    lifecycle: Mutex<Lifecycle>,
}

struct Subscriber {
    id: SubscriberId,
    handler: MessageHandler,
}

#[derive(Default)]
struct Lifecycle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DuplexSession {
    /// Creates a disconnected session bound to the current Tokio runtime.
    ///
    /// # Errors
    /// [`SessionError::NoRuntime`] when called outside a runtime.
    pub fn new(
        transport: Arc<dyn DuplexTransport>,
        probe: Arc<dyn ConnectivityProbe>,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                probe,
                settings,
                state: RwLock::new(SessionState::Disconnected),
                subscribers: RwLock::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                heartbeats_sent: AtomicU64::new(0),
                runtime,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        })
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Interval the heartbeat loop would sleep for if it started now.
    pub fn current_heartbeat_interval(&self) -> Duration {
        self.inner.heartbeat_interval()
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.inner.heartbeats_sent.load(AtomicOrdering::Relaxed)
    }

    /// Performs the handshake and starts the heartbeat and listener loops.
    ///
    /// No-op when already connected. On failure the session is left
    /// disconnected.
    ///
    /// # Errors
    /// The transport's handshake error, or [`SessionError::HandshakeTimeout`].
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock().await;
        if inner.state() == SessionState::Connected {
            return Ok(());
        }

        // Loops left over from a connection the peer dropped.
        join_loops(&mut lifecycle.tasks, inner.settings.join_timeout).await;

        inner.set_state(SessionState::Connecting);
        let deadline = inner.settings.handshake_timeout;
        match tokio::time::timeout(deadline, inner.transport.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                inner.set_state(SessionState::Disconnected);
                warn!(error = %err, "Duplex handshake failed");
                return Err(err);
            }
            Err(_) => {
                inner.set_state(SessionState::Disconnected);
                warn!(timeout_secs = deadline.as_secs(), "Duplex handshake timed out");
                if let Err(err) = inner.transport.close().await {
                    debug!(error = %err, "Close after handshake timeout failed");
                }
                return Err(SessionError::HandshakeTimeout(deadline));
            }
        }

        inner.set_state(SessionState::Connected);
        let cancel = CancellationToken::new();
        lifecycle.cancel = cancel.clone();
        let heartbeat = SessionInner::heartbeat_loop(Arc::clone(inner), cancel.clone());
        let listener = SessionInner::listen_loop(Arc::clone(inner), cancel);
        lifecycle.tasks.push(inner.runtime.spawn(heartbeat));
        lifecycle.tasks.push(inner.runtime.spawn(listener));

        let heartbeat_ms = inner.heartbeat_interval().as_millis() as u64;
        info!(heartbeat_ms, "Duplex session connected");
        Ok(())
    }

    /// Stops the loops, closes the transport and returns to `Disconnected`.
    ///
    /// No-op unless connected. A connection lost to a transport failure has
    /// already released its transport.
    ///
    /// # Errors
    /// The transport's close error; the session is disconnected regardless.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock().await;
        if inner.state() != SessionState::Connected {
            return Ok(());
        }

        inner.set_state(SessionState::Closing);
        lifecycle.cancel.cancel();
        let closed = inner.transport.close().await;

        join_loops(&mut lifecycle.tasks, inner.settings.join_timeout).await;

        inner.set_state(SessionState::Disconnected);
        info!("Duplex session disconnected");
        closed
    }

    /// Sends `message` when connected; otherwise it is silently dropped.
    pub async fn send(&self, message: &str) {
        if !self.is_connected() {
            debug!(state = %self.state(), "Dropping session message while not connected");
            return;
        }
        if let Err(err) = self.inner.transport.send(message).await {
            warn!(error = %err, "Failed to send session message");
        }
    }

    /// Registers `handler` for inbound messages.
    ///
    /// Subscribing the same `Arc` again returns the existing id and does not
    /// duplicate delivery. A handler registered while a message is being
    /// fanned out first sees the next message.
    pub fn subscribe(&self, handler: MessageHandler) -> SubscriberId {
        let mut subscribers = self.inner.subscribers.write();
        if let Some(existing) = subscribers.iter().find(|s| same_handler(&s.handler, &handler)) {
            return existing.id;
        }

        let next = self.inner.next_subscriber.fetch_add(1, AtomicOrdering::Relaxed);
        let id = SubscriberId::new(next);
        subscribers.push(Subscriber { id, handler });
        debug!(subscriber = id.get(), total = subscribers.len(), "Session subscriber added");
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

impl Drop for DuplexSession {
    fn drop(&mut self) {
        if let Ok(lifecycle) = self.inner.lifecycle.try_lock() {
            if self.inner.state() == SessionState::Connected {
                warn!("DuplexSession dropped while connected; cancelling loops");
            }
            lifecycle.cancel.cancel();
        }
    }
}

impl SessionInner {
    fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        let previous = *state;
        if previous != next {
            debug!(from = %previous, to = %next, "Session state changed");
            *state = next;
        }
    }

    fn heartbeat_interval(&self) -> Duration {
        self.probe.link_quality().heartbeat_interval(self.settings.heartbeat_base)
    }

    /// Moves a live connection to `Disconnected` after a transport failure
    /// and releases the transport. A session already closing is left to
    /// `disconnect`.
    async fn connection_lost(&self, cancel: &CancellationToken) {
        let was_connected = {
            let mut state = self.state.write();
            let live = *state == SessionState::Connected;
            if live {
                *state = SessionState::Disconnected;
            }
            live
        };
        cancel.cancel();

        if was_connected {
            if let Err(err) = self.transport.close().await {
                debug!(error = %err, "Close after connection loss failed");
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let interval = self.heartbeat_interval();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }

            if self.state() != SessionState::Connected {
                break;
            }

            match self.transport.send(&self.settings.keepalive_payload).await {
                Ok(()) => {
                    self.heartbeats_sent.fetch_add(1, AtomicOrdering::Relaxed);
                    debug!(interval_ms = interval.as_millis() as u64, "Heartbeat sent");
                }
                Err(err) => {
                    warn!(error = %err, "Heartbeat failed; connection lost");
                    self.connection_lost(&cancel).await;
                    break;
                }
            }
        }
        debug!("Heartbeat loop stopped");
    }

    async fn listen_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                received = self.transport.receive() => received,
            };

            match received {
                Ok(Some(message)) => self.dispatch(&message),
                Ok(None) => {
                    info!("Duplex peer closed the connection");
                    self.connection_lost(&cancel).await;
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "Duplex receive failed; connection lost");
                    self.connection_lost(&cancel).await;
                    break;
                }
            }
        }
        debug!("Listener loop stopped");
    }

    /// Delivers `message` to a snapshot of the current subscribers.
    fn dispatch(&self, message: &str) {
        let handlers: Vec<(SubscriberId, MessageHandler)> = self
            .subscribers
            .read()
            .iter()
            .map(|s| (s.id, Arc::clone(&s.handler)))
            .collect();

        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(
                        subscriber = id.get(),
                        error = %err,
                        "Session subscriber returned an error"
                    );
                }
                Err(_) => {
                    error!(subscriber = id.get(), "Session subscriber panicked");
                }
            }
        }
    }
}

/// Waits for cancelled loops to exit, aborting any that overrun `timeout`.
async fn join_loops(tasks: &mut Vec<JoinHandle<()>>, timeout: Duration) {
    for mut handle in tasks.drain(..) {
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            warn!("Session loop did not stop within timeout; aborting");
            handle.abort();
        }
    }
}

fn same_handler(a: &MessageHandler, b: &MessageHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
