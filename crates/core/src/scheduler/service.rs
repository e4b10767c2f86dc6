use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tidelink_common::collections::TieredQueue;
use tidelink_domain::constants::{API_SIGNATURE_HEADER, DATA_SIGN_HEADER};
use tidelink_domain::{NetworkError, RequestDescriptor, Response, SchedulerConfig};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use super::errors::SchedulerError;
use super::metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
use super::ports::{HttpTransport, PayloadSigner, TransportRequest};
use super::task::{Completion, Task};

/// Bounded-concurrency request scheduler with priority tiers.
///
/// ## Admission
///
/// Whenever a slot is free the head of the highest non-empty tier starts
/// executing. Tasks inside a tier are admitted in submission order. The
/// number of queued tasks is unbounded; only execution is limited.
///
/// ## Failures
///
/// Transport, timeout and non-2xx failures are retried while the task's
/// retry budget lasts and its policy allows it. A retried task waits out its
/// backoff off-queue and then rejoins the tail of its original tier. A
/// response that fails signature verification is never retried.
///
/// Releasing the execution slot and scheduling a retry are independent
/// effects of one failed attempt.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct RequestScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    transport: Arc<dyn HttpTransport>,
    signer: Arc<dyn PayloadSigner>,
    max_concurrent: usize,
    state: Mutex<SchedulerState>,
    metrics: SchedulerMetrics,
    runtime: Handle,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    next_id: AtomicU64,
}

struct SchedulerState {
    tiers: TieredQueue<Task>,
    in_flight: usize,
    closed: bool,
}

/// Result of one failed attempt once retry bookkeeping is done.
enum FailureOutcome {
    Retry(Task, Duration),
    Terminal(Task, NetworkError),
}

impl RequestScheduler {
    /// Creates a scheduler bound to the current Tokio runtime.
    ///
    /// # Errors
    /// [`SchedulerError::NoRuntime`] outside a runtime and
    /// [`SchedulerError::InvalidConfig`] for zero execution slots.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        signer: Arc<dyn PayloadSigner>,
        config: &SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        if config.max_concurrent == 0 {
            return Err(SchedulerError::InvalidConfig("max_concurrent must be at least 1".into()));
        }
        if config.tier_count == 0 {
            return Err(SchedulerError::InvalidConfig("tier_count must be at least 1".into()));
        }
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                transport,
                signer,
                max_concurrent: config.max_concurrent,
                state: Mutex::new(SchedulerState {
                    tiers: TieredQueue::new(config.tier_count),
                    in_flight: 0,
                    closed: false,
                }),
                metrics: SchedulerMetrics::new(),
                runtime,
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Queues `request` at `priority` and admits as much work as the free
    /// slots allow. Out-of-range priorities are clamped.
    ///
    /// After [`Self::shutdown`] the completion fails immediately with a
    /// cancellation error.
    pub fn submit(&self, request: RequestDescriptor, completion: Completion, priority: i64) {
        let inner = &self.inner;
        inner.metrics.record_submission();

        let rejected = {
            let mut state = inner.state.lock();
            if state.closed {
                Some(completion)
            } else {
                let tier = state.tiers.clamp_tier(priority);
                let id = inner.next_id.fetch_add(1, AtomicOrdering::Relaxed);
                debug!(task_id = id, tier, url = %request.url, "Request queued");
                state.tiers.push_back(tier, Task { id, request, completion, retry_count: 0, tier });
                None
            }
        };

        if let Some(completion) = rejected {
            debug!("Submission after shutdown rejected");
            inner.metrics.record_cancellation(1);
            completion.fail(NetworkError::cancelled());
            return;
        }

        inner.pump();
    }

    pub fn tier_count(&self) -> usize {
        self.inner.state.lock().tiers.tier_count()
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Tasks waiting for a slot, excluding those sleeping off a backoff.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().tiers.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    pub fn metrics(&self) -> SchedulerMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Stops admitting work and waits for every outstanding task to settle.
    ///
    /// Queued and backoff-waiting tasks fail with a cancellation error.
    /// In-flight attempts run to completion and deliver their own outcome,
    /// without further retries.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let drained = {
            let mut state = inner.state.lock();
            if state.closed {
                Vec::new()
            } else {
                state.closed = true;
                state.tiers.drain_all()
            }
        };

        if !drained.is_empty() {
            info!(count = drained.len(), "Cancelling queued requests");
            inner.metrics.record_cancellation(drained.len() as u64);
        }
        for (_, task) in drained {
            task.completion.fail(NetworkError::cancelled());
        }

        inner.shutdown.cancel();
        inner.tracker.close();
        inner.tracker.wait().await;
        info!("Request scheduler shut down");
    }
}

impl SchedulerInner {
    /// Admits queued tasks until the slots are full or the tiers are empty.
    fn pump(self: &Arc<Self>) {
        loop {
            let task = {
                let mut state = self.state.lock();
                if state.in_flight >= self.max_concurrent {
                    return;
                }
                let Some((_, task)) = state.tiers.pop_highest() else {
                    return;
                };
                state.in_flight += 1;
                self.metrics.record_admission(state.in_flight);
                task
            };

            debug!(
                task_id = task.id,
                tier = task.tier,
                attempt = task.retry_count + 1,
                "Request admitted"
            );
            let inner = Arc::clone(self);
            self.tracker.spawn_on(async move { inner.run(task).await }, &self.runtime);
        }
    }

    async fn run(self: Arc<Self>, task: Task) {
        // A panicking transport or signer still frees its slot and settles
        // the completion.
        let outcome = match AssertUnwindSafe(self.attempt(&task.request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(task_id = task.id, "Request attempt panicked");
                Err(NetworkError::transport("Request attempt panicked"))
            }
        };
        self.release_slot();

        match outcome {
            Ok(response) => {
                self.metrics.record_success();
                debug!(task_id = task.id, status = response.status_code, "Request succeeded");
                task.completion.succeed(response);
            }
            Err(err) => match self.classify_failure(task, err) {
                FailureOutcome::Retry(task, delay) => self.schedule_retry(task, delay),
                FailureOutcome::Terminal(task, err) => {
                    self.metrics.record_failure();
                    warn!(
                        task_id = task.id,
                        code = err.code,
                        kind = %err.kind,
                        message = %err.message,
                        "Request failed"
                    );
                    task.completion.fail(err);
                }
            },
        }
    }

    async fn attempt(&self, request: &RequestDescriptor) -> Result<Response, NetworkError> {
        let mut transport_request = TransportRequest::from_descriptor(request);
        transport_request
            .headers
            .insert(API_SIGNATURE_HEADER.to_string(), self.signer.sign(&request.body));

        let execution = self.transport.execute(transport_request);
        let response = match tokio::time::timeout(request.timeout, execution).await {
            Err(_) => {
                self.metrics.record_timeout();
                return Err(NetworkError::timeout());
            }
            Ok(Err(err)) => return Err(NetworkError::transport(err.message)),
            Ok(Ok(response)) => response,
        };

        let status = response.status_code;
        if !(200..300).contains(&status) {
            let message = if response.body.is_empty() {
                format!("HTTP {status}")
            } else {
                String::from_utf8_lossy(&response.body).into_owned()
            };
            return Err(NetworkError::application(status, message));
        }

        if !self.signer.verify(&response.body, response.header(DATA_SIGN_HEADER)) {
            self.metrics.record_signature_failure();
            return Err(NetworkError::signature(status));
        }

        Ok(Response {
            status_code: status,
            body: response.body,
            headers: response.headers,
            context: request.context.clone(),
        })
    }

    fn release_slot(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            self.metrics.record_release(state.in_flight);
        }
        self.pump();
    }

    fn classify_failure(&self, mut task: Task, err: NetworkError) -> FailureOutcome {
        if !err.is_retryable()
            || task.retry_count >= task.request.max_retries
            || self.state.lock().closed
        {
            return FailureOutcome::Terminal(task, err);
        }

        match task.request.retry_policy.delay_for(task.retry_count + 1) {
            Some(delay) => {
                task.retry_count += 1;
                FailureOutcome::Retry(task, delay)
            }
            None => FailureOutcome::Terminal(task, err),
        }
    }

    fn schedule_retry(self: &Arc<Self>, task: Task, delay: Duration) {
        self.metrics.record_retry();
        debug!(
            task_id = task.id,
            retry = task.retry_count,
            delay_ms = delay.as_millis() as u64,
            "Retry scheduled"
        );

        let inner = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        self.tracker.spawn_on(
            async move {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => {
                        inner.metrics.record_cancellation(1);
                        task.completion.fail(NetworkError::cancelled());
                    }
                    () = tokio::time::sleep(delay) => inner.requeue(task),
                }
            },
            &self.runtime,
        );
    }

    /// Returns a retried task to the tail of its original tier.
    fn requeue(self: &Arc<Self>, task: Task) {
        let rejected = {
            let mut state = self.state.lock();
            if state.closed {
                Some(task)
            } else {
                let tier = task.tier;
                state.tiers.push_back(tier, task);
                None
            }
        };

        if let Some(task) = rejected {
            self.metrics.record_cancellation(1);
            task.completion.fail(NetworkError::cancelled());
            return;
        }

        self.pump();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tidelink_domain::{FailureKind, RequestBuilder, RetryPolicy};
    use tokio::sync::Mutex as TokioMutex;
    use tokio::time::Instant;

    use super::*;
    use crate::scheduler::ports::{TransportError, TransportResponse};

    type Script = TokioMutex<Vec<Result<TransportResponse, TransportError>>>;

    /// Replays scripted outcomes, then answers 200 with a valid signature.
    struct ScriptedTransport {
        script: Script,
        calls: TokioMutex<Vec<(Instant, TransportRequest)>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self { script: TokioMutex::new(script), calls: TokioMutex::new(Vec::new()) })
        }

        async fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().await.iter().map(|(at, _)| *at).collect()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.lock().await.push((Instant::now(), request));
            let mut script = self.script.lock().await;
            if script.is_empty() {
                Ok(signed(200, b"ok"))
            } else {
                script.remove(0)
            }
        }
    }

    /// Accepts any signature equal to `sig:<body>`.
    struct EchoSigner;

    impl PayloadSigner for EchoSigner {
        fn sign(&self, payload: &[u8]) -> String {
            format!("sig:{}", String::from_utf8_lossy(payload))
        }

        fn verify(&self, payload: &[u8], signature: Option<&str>) -> bool {
            signature.is_some_and(|sig| sig == self.sign(payload))
        }
    }

    fn signed(status: u16, body: &[u8]) -> TransportResponse {
        let mut headers = BTreeMap::new();
        headers.insert(DATA_SIGN_HEADER.to_string(), EchoSigner.sign(body));
        TransportResponse { status_code: status, headers, body: body.to_vec() }
    }

    fn config(max_concurrent: usize) -> SchedulerConfig {
        SchedulerConfig { tier_count: 4, max_concurrent }
    }

    #[tokio::test]
    async fn attaches_signature_header_and_copies_context() {
        let transport = ScriptedTransport::new(Vec::new());
        let scheduler =
            RequestScheduler::new(transport.clone(), Arc::new(EchoSigner), &config(4)).unwrap();

        let request = RequestBuilder::post("https://api.test/a")
            .body(b"hello".to_vec())
            .context(7_u8)
            .build()
            .unwrap();
        let (completion, rx) = Completion::channel();
        scheduler.submit(request, completion, 1);

        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.context.unwrap().downcast_ref::<u8>(), Some(&7));

        let calls = transport.calls.lock().await;
        let signature = calls[0].1.headers.get(API_SIGNATURE_HEADER).map(String::as_str);
        assert_eq!(signature, Some("sig:hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_with_distinct_message() {
        struct Hanging;

        #[async_trait]
        impl HttpTransport for Hanging {
            async fn execute(
                &self,
                _request: TransportRequest,
            ) -> Result<TransportResponse, TransportError> {
                futures::future::pending().await
            }
        }

        let scheduler =
            RequestScheduler::new(Arc::new(Hanging), Arc::new(EchoSigner), &config(1)).unwrap();
        let request = RequestBuilder::get("https://api.test/slow")
            .timeout(Duration::from_secs(3))
            .retry(RetryPolicy::None, 0)
            .build()
            .unwrap();
        let (completion, rx) = Completion::channel();
        let started = Instant::now();
        scheduler.submit(request, completion, 0);

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
        assert_eq!(err.message, "Request timed out");
        assert!(!err.is_network_error);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(scheduler.metrics().total_timeouts, 1);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn linear_policy_waits_two_seconds_between_attempts() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new("reset")),
            Err(TransportError::new("reset")),
        ]);
        let scheduler =
            RequestScheduler::new(transport.clone(), Arc::new(EchoSigner), &config(2)).unwrap();
        let request = RequestBuilder::get("https://api.test/linear")
            .retry(RetryPolicy::Linear, 2)
            .build()
            .unwrap();
        let (completion, rx) = Completion::channel();
        scheduler.submit(request, completion, 2);

        assert!(rx.await.unwrap().is_ok());
        let times = transport.call_times().await;
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_secs(2));
        assert_eq!(times[2] - times[1], Duration::from_secs(2));
        assert_eq!(scheduler.metrics().total_retried, 2);
    }

    #[tokio::test]
    async fn application_failure_carries_status_and_body() {
        let failure = TransportResponse {
            status_code: 404,
            headers: BTreeMap::new(),
            body: b"missing".to_vec(),
        };
        let transport = ScriptedTransport::new(vec![Ok(failure)]);
        let scheduler =
            RequestScheduler::new(transport, Arc::new(EchoSigner), &config(1)).unwrap();
        let request = RequestBuilder::get("https://api.test/x").build().unwrap();
        let (completion, rx) = Completion::channel();
        scheduler.submit(request, completion, 1);

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.kind, FailureKind::Application);
        assert_eq!(err.code, 404);
        assert_eq!(err.message, "missing");
        assert!(!err.is_network_error);
    }

    #[tokio::test]
    async fn transport_failure_is_flagged_as_network_error() {
        let transport =
            ScriptedTransport::new(vec![Err(TransportError::new("connection refused"))]);
        let scheduler =
            RequestScheduler::new(transport, Arc::new(EchoSigner), &config(1)).unwrap();
        let request = RequestBuilder::get("https://api.test/x").build().unwrap();
        let (completion, rx) = Completion::channel();
        scheduler.submit(request, completion, 1);

        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_network_error);
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "connection refused");
    }

    #[tokio::test]
    async fn retry_budget_of_zero_fails_immediately() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::new("down"))]);
        let scheduler =
            RequestScheduler::new(transport.clone(), Arc::new(EchoSigner), &config(1)).unwrap();
        let request = RequestBuilder::get("https://api.test/x")
            .retry(RetryPolicy::ExponentialBackoff, 0)
            .build()
            .unwrap();
        let (completion, rx) = Completion::channel();
        scheduler.submit(request, completion, 1);

        assert!(rx.await.unwrap().is_err());
        assert_eq!(transport.call_times().await.len(), 1);
    }

    #[tokio::test]
    async fn panicking_transport_frees_its_slot() {
        struct Panicking;

        #[async_trait]
        impl HttpTransport for Panicking {
            async fn execute(
                &self,
                _request: TransportRequest,
            ) -> Result<TransportResponse, TransportError> {
                panic!("transport bug")
            }
        }

        let scheduler =
            RequestScheduler::new(Arc::new(Panicking), Arc::new(EchoSigner), &config(1)).unwrap();
        let mut outcomes = Vec::new();
        for idx in 0..2 {
            let request = RequestBuilder::get(format!("https://api.test/{idx}")).build().unwrap();
            let (completion, rx) = Completion::channel();
            scheduler.submit(request, completion, 1);
            outcomes.push(rx);
        }

        for rx in outcomes {
            let err = rx.await.unwrap().unwrap_err();
            assert_eq!(err.kind, FailureKind::Transport);
            assert_eq!(err.message, "Request attempt panicked");
        }
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(scheduler.metrics().total_failed, 2);
    }

    #[test]
    fn construction_requires_a_runtime() {
        let transport = ScriptedTransport::new(Vec::new());
        let result = RequestScheduler::new(transport, Arc::new(EchoSigner), &config(1));
        assert!(matches!(result, Err(SchedulerError::NoRuntime)));
    }

    #[tokio::test]
    async fn zero_slots_are_rejected() {
        let transport = ScriptedTransport::new(Vec::new());
        let result = RequestScheduler::new(transport, Arc::new(EchoSigner), &config(0));
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn submissions_after_shutdown_fail_with_cancellation() {
        let transport = ScriptedTransport::new(Vec::new());
        let scheduler =
            RequestScheduler::new(transport.clone(), Arc::new(EchoSigner), &config(1)).unwrap();
        scheduler.shutdown().await;

        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        scheduler.submit(
            RequestBuilder::get("https://api.test/late").build().unwrap(),
            Completion::new(|_| {}, move |err| {
                assert_eq!(err.kind, FailureKind::Cancelled);
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            }),
            1,
        );

        assert_eq!(failures.load(AtomicOrdering::SeqCst), 1);
        assert!(transport.call_times().await.is_empty());
        assert!(scheduler.is_shut_down());
    }
}
