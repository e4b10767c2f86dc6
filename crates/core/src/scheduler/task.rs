//! Units of work owned by the scheduler.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tidelink_domain::{NetworkError, RequestDescriptor, Response};
use tokio::sync::oneshot;
use tracing::{error, warn};

type SuccessCallback = Box<dyn FnOnce(Response) + Send + 'static>;
type ErrorCallback = Box<dyn FnOnce(NetworkError) + Send + 'static>;

/// Where a submission's terminal outcome is delivered.
///
/// Consumed on delivery, so a completion can fire at most once.
pub struct Completion {
    inner: CompletionInner,
}

enum CompletionInner {
    Callbacks { on_success: SuccessCallback, on_error: ErrorCallback },
    Channel(oneshot::Sender<Result<Response, NetworkError>>),
    Detached,
}

impl Completion {
    /// Success and error callbacks; exactly one of them runs.
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(NetworkError) + Send + 'static,
    {
        Self {
            inner: CompletionInner::Callbacks {
                on_success: Box::new(on_success),
                on_error: Box::new(on_error),
            },
        }
    }

    /// Delivers the outcome through a oneshot channel.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<Result<Response, NetworkError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { inner: CompletionInner::Channel(tx) }, rx)
    }

    /// No caller is waiting for the outcome, as for entries restored from
    /// durable storage after a restart.
    #[must_use]
    pub const fn detached() -> Self {
        Self { inner: CompletionInner::Detached }
    }

    #[must_use]
    pub const fn is_detached(&self) -> bool {
        matches!(self.inner, CompletionInner::Detached)
    }

    pub(crate) fn succeed(self, response: Response) {
        match self.inner {
            CompletionInner::Callbacks { on_success, .. } => {
                guard_callback("success", move || on_success(response));
            }
            CompletionInner::Channel(tx) => {
                let _ = tx.send(Ok(response));
            }
            CompletionInner::Detached => {}
        }
    }

    pub(crate) fn fail(self, err: NetworkError) {
        match self.inner {
            CompletionInner::Callbacks { on_error, .. } => {
                guard_callback("error", move || on_error(err));
            }
            CompletionInner::Channel(tx) => {
                let _ = tx.send(Err(err));
            }
            CompletionInner::Detached => {
                warn!(
                    code = err.code,
                    kind = %err.kind,
                    message = %err.message,
                    "Detached request failed"
                );
            }
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            CompletionInner::Callbacks { .. } => "callbacks",
            CompletionInner::Channel(_) => "channel",
            CompletionInner::Detached => "detached",
        };
        f.debug_tuple("Completion").field(&kind).finish()
    }
}

/// A panicking caller callback must not take a scheduler slot down with it.
fn guard_callback(which: &'static str, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!(callback = which, "Request completion callback panicked");
    }
}

/// Scheduler-owned record for one submission.
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) id: u64,
    pub(crate) request: RequestDescriptor,
    pub(crate) completion: Completion,
    pub(crate) retry_count: u32,
    /// Tier the task was admitted under; retries return here.
    pub(crate) tier: usize,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn ok_response() -> Response {
        Response { status_code: 200, body: Vec::new(), headers: BTreeMap::new(), context: None }
    }

    #[test]
    fn callbacks_fire_once_for_their_outcome() {
        let successes = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let (s, e) = (successes.clone(), errors.clone());

        let completion = Completion::new(
            move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            },
        );
        completion.fail(NetworkError::timeout());

        assert_eq!(successes.load(Ordering::SeqCst), 0);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let completion = Completion::new(|_| panic!("boom"), |_| {});
        completion.succeed(ok_response());
    }

    #[tokio::test]
    async fn channel_completion_delivers_outcome() {
        let (completion, rx) = Completion::channel();
        completion.succeed(ok_response());
        let outcome = rx.await.unwrap();
        assert_eq!(outcome.unwrap().status_code, 200);
    }

    #[test]
    fn channel_receiver_wakes_on_failure() {
        let (completion, rx) = Completion::channel();
        let mut rx = tokio_test::task::spawn(rx);
        tokio_test::assert_pending!(rx.poll());

        completion.fail(NetworkError::cancelled());
        assert!(rx.is_woken());
        let outcome = tokio_test::assert_ready!(rx.poll());
        assert_eq!(outcome.unwrap().unwrap_err().kind, tidelink_domain::FailureKind::Cancelled);
    }

    #[test]
    fn detached_is_reported() {
        assert!(Completion::detached().is_detached());
        assert!(!Completion::channel().0.is_detached());
        Completion::detached().fail(NetworkError::cancelled());
    }
}
