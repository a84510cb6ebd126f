//! Wait - Completion waiting for asynchronous vendor operations
//!
//! Bridges a vendor's asynchronous state transition to a synchronous call
//! contract: a status-check function is invoked on a fixed cadence until
//! its terminal condition is reached, the bounded wait elapses, or the
//! cancellation token fires. The terminal predicate lives in the check
//! function, not here; each resource kind supplies its own.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep};

use crate::error::{LifecycleError, LifecycleResult, Stage};

/// Result of one status check
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    /// Terminal condition reached
    Ready,
    /// Operation still settling; optional progress detail for logging
    Pending(Option<String>),
}

/// Error classification for a failed status check
#[derive(Debug)]
pub enum PollFailure {
    /// A recognized "still in progress" vendor error; polling continues
    Transient(String),
    /// Anything else aborts the wait immediately and propagates
    Fatal(LifecycleError),
}

/// Bounds for one wait: total duration and check cadence
#[derive(Debug, Clone, Copy)]
pub struct WaitSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitSpec {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Fires cancellation tokens handed to pending waits
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Abort every pending wait holding a token from this canceller
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation signal for a pending wait
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Resolves once cancellation fires. If every `Canceller` is dropped
    /// without firing, this never resolves; the wait then runs to its
    /// normal timeout.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Repeatedly invoke `check` until it reports `Poll::Ready`.
///
/// The first check runs immediately; subsequent checks follow the
/// configured cadence. A check pending for exactly K cycles before
/// turning ready therefore costs K+1 invocations. Once the bounded wait
/// elapses without a terminal condition the result is
/// `LifecycleError::Timeout` naming the handle and the stage.
pub async fn wait_until<F, Fut>(
    handle: &str,
    stage: Stage,
    spec: WaitSpec,
    mut cancel: Option<CancelToken>,
    mut check: F,
) -> LifecycleResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll, PollFailure>>,
{
    let deadline = Instant::now() + spec.timeout;

    loop {
        match check().await {
            Ok(Poll::Ready) => return Ok(()),
            Ok(Poll::Pending(detail)) => {
                if let Some(detail) = detail {
                    tracing::debug!(handle, %stage, %detail, "operation still settling");
                }
            }
            Err(PollFailure::Transient(message)) => {
                tracing::debug!(handle, %stage, %message, "transient vendor error, continuing");
            }
            Err(PollFailure::Fatal(err)) => return Err(err),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(LifecycleError::Timeout {
                handle: handle.to_string(),
                stage,
            });
        }

        let pause = spec.interval.min(deadline - now);
        match cancel.as_mut() {
            Some(token) => {
                tokio::select! {
                    () = sleep(pause) => {}
                    () = token.cancelled() => {
                        return Err(LifecycleError::Cancelled {
                            handle: handle.to_string(),
                            stage,
                        });
                    }
                }
            }
            None => sleep(pause).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec(timeout_secs: u64, interval_secs: u64) -> WaitSpec {
        WaitSpec::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_check() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = wait_until("h-1", Stage::Create, spec(60, 5), None, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Poll::Ready)
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_k_cycles_takes_k_plus_one_checks() {
        const K: usize = 3;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        // K * interval (15s) is well under the 10-minute bound
        let result = wait_until("h-2", Stage::Create, spec(600, 5), None, move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < K {
                    Ok(Poll::Pending(None))
                } else {
                    Ok(Poll::Ready)
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), K + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_pending_times_out_naming_the_handle() {
        let result = wait_until(
            "arn:aws:es:us-east-1:123:domain/logs-test",
            Stage::Create,
            spec(30, 5),
            None,
            || async { Ok(Poll::Pending(None)) },
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Timeout {
                stage: Stage::Create,
                ..
            }
        ));
        assert!(
            err.to_string()
                .contains("arn:aws:es:us-east-1:123:domain/logs-test")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_continue_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = wait_until("h-3", Stage::Delete, spec(600, 5), None, move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(PollFailure::Transient("not visible yet".to_string()))
                } else {
                    Ok(Poll::Ready)
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_aborts_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = wait_until("h-4", Stage::Update, spec(600, 5), None, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(PollFailure::Fatal(LifecycleError::vendor(
                    "describing domain",
                    "access denied",
                )))
            }
        })
        .await;

        assert!(matches!(
            result.unwrap_err(),
            LifecycleError::Vendor { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_a_pending_wait() {
        let canceller = Canceller::new();
        let token = canceller.token();

        let task = tokio::spawn(wait_until(
            "h-5",
            Stage::Create,
            spec(3600, 60),
            Some(token),
            || async { Ok(Poll::Pending(None)) },
        ));

        canceller.cancel();
        let result = task.await.unwrap();

        assert!(matches!(
            result.unwrap_err(),
            LifecycleError::Cancelled {
                stage: Stage::Create,
                ..
            }
        ));
    }
}
