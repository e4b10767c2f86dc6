//! Shared test helpers for `tidelink-core` integration tests.
//!
//! A scripted HTTP transport that records admission order and concurrency,
//! a signer with a trivially checkable signature, and completion probes.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tidelink_core::{
    Completion, HttpTransport, PayloadSigner, TransportError, TransportRequest, TransportResponse,
};
use tidelink_domain::constants::DATA_SIGN_HEADER;
use tidelink_domain::{NetworkError, Response};
use tokio::time::Instant;

/// Scripted outcome for one attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok,
    Status(u16),
    Unsigned,
    Fail(&'static str),
}

/// Transport that sleeps `latency` per call and answers from per-URL scripts,
/// defaulting to a signed 200.
pub struct FakeTransport {
    latency: Duration,
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    executing: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeTransport {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            executing: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn script(&self, url: &str, outcomes: impl IntoIterator<Item = Outcome>) {
        self.scripts.lock().entry(url.to_string()).or_default().extend(outcomes);
    }

    /// URLs in the order attempts started.
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn call_times(&self, url: &str) -> Vec<Instant> {
        self.calls.lock().iter().filter(|(u, _)| u == url).map(|(_, at)| *at).collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push((request.url.clone(), Instant::now()));
        let now = self.executing.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;
        self.executing.fetch_sub(1, Ordering::SeqCst);

        let outcome = self
            .scripts
            .lock()
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Ok);

        match outcome {
            Outcome::Ok => Ok(signed(200, b"ok")),
            Outcome::Status(code) => Ok(signed(code, b"server said no")),
            Outcome::Unsigned => Ok(TransportResponse {
                status_code: 200,
                headers: BTreeMap::new(),
                body: b"tampered".to_vec(),
            }),
            Outcome::Fail(message) => Err(TransportError::new(message)),
        }
    }
}

/// Signs with `sig:<body>`; verifies the same.
pub struct EchoSigner;

impl PayloadSigner for EchoSigner {
    fn sign(&self, payload: &[u8]) -> String {
        format!("sig:{}", String::from_utf8_lossy(payload))
    }

    fn verify(&self, payload: &[u8], signature: Option<&str>) -> bool {
        signature.is_some_and(|sig| !sig.is_empty() && sig == self.sign(payload))
    }
}

pub fn signed(status: u16, body: &[u8]) -> TransportResponse {
    let mut headers = BTreeMap::new();
    headers.insert(DATA_SIGN_HEADER.to_string(), EchoSigner.sign(body));
    TransportResponse { status_code: status, headers, body: body.to_vec() }
}

/// Counts terminal callbacks per submission.
#[derive(Default)]
pub struct Outcomes {
    pub successes: Mutex<Vec<Response>>,
    pub errors: Mutex<Vec<NetworkError>>,
    pub finished_at: Mutex<Vec<Instant>>,
}

impl Outcomes {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn completion(self: &Arc<Self>) -> Completion {
        let ok = Arc::clone(self);
        let err = Arc::clone(self);
        Completion::new(
            move |response| {
                ok.finished_at.lock().push(Instant::now());
                ok.successes.lock().push(response);
            },
            move |error| {
                err.finished_at.lock().push(Instant::now());
                err.errors.lock().push(error);
            },
        )
    }

    pub fn success_count(&self) -> usize {
        self.successes.lock().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn total(&self) -> usize {
        self.success_count() + self.error_count()
    }
}
