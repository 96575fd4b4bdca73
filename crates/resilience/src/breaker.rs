use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::BreakerError;
use crate::options::BreakerOptions;
use crate::window::{Counts, Outcome, RollingWindow};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Calls pass through and are counted.
    Closed,
    /// Calls fail immediately.
    Open,
    /// One probe call is allowed through to test recovery.
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state transition, published for monitoring only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerEvent {
    pub name: String,
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Point-in-time view of a breaker and its rolling window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejections: u64,
    pub error_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Guards one remote dependency.
///
/// Actions run on their own task so that a timed-out action keeps running
/// detached while the caller gets [`BreakerError::Timeout`] right away.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    options: BreakerOptions,
    inner: Mutex<Inner>,
    events: broadcast::Sender<BreakerEvent>,
}

impl CircuitBreaker {
    /// Creates a breaker publishing transitions on `events`.
    pub fn new(
        name: impl Into<String>,
        options: BreakerOptions,
        events: broadcast::Sender<BreakerEvent>,
    ) -> Self {
        let window = RollingWindow::new(options.rolling_window, options.bucket_width());
        Self {
            name: name.into(),
            options,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window,
                opened_at: None,
                probe_in_flight: false,
            }),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &BreakerOptions {
        &self.options
    }

    /// Returns the current state.
    ///
    /// An open breaker whose reset timeout has elapsed still reports `OPEN`
    /// until the next call turns it half-open.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Returns the current state and rolling statistics.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.lock();
        let counts = inner.window.totals(Instant::now());
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            successes: counts.successes,
            failures: counts.failures,
            timeouts: counts.timeouts,
            rejections: counts.rejections,
            error_percentage: counts.error_percentage(),
        }
    }

    /// Runs `action` through the breaker.
    ///
    /// Fails with [`BreakerError::Open`] without invoking `action` when the
    /// breaker is open. A panic inside `action` counts as a failure and is
    /// then resumed in the caller.
    #[tracing::instrument(skip(self, action), fields(breaker = %self.name))]
    pub async fn call<T, E, F, Fut>(&self, action: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let admission = match self.admit() {
            Some(admission) => admission,
            None => {
                self.count_call("rejected");
                tracing::debug!("Call rejected, breaker is open");
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                });
            }
        };

        let mut guard = ProbeGuard {
            breaker: self,
            admission,
            settled: false,
        };

        let handle = tokio::spawn(action());
        let joined = match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    guard.settle(Outcome::Timeout);
                    self.count_call("timeout");
                    tracing::warn!(timeout = ?limit, "Call timed out");
                    return Err(BreakerError::Timeout {
                        name: self.name.clone(),
                        after: limit,
                    });
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(value)) => {
                guard.settle(Outcome::Success);
                self.count_call("success");
                Ok(value)
            }
            Ok(Err(err)) => {
                guard.settle(Outcome::Failure);
                self.count_call("failure");
                Err(BreakerError::Inner(err))
            }
            Err(join_err) => {
                guard.settle(Outcome::Failure);
                self.count_call("failure");
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                Err(BreakerError::Cancelled {
                    name: self.name.clone(),
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decides whether a call may run. `None` means rejected.
    fn admit(&self) -> Option<Admission> {
        let now = Instant::now();
        let mut inner = self.lock();
        let mut transition = None;

        let admission = match inner.state {
            BreakerState::Closed => Some(Admission::Normal),
            BreakerState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_none_or(|opened| now.duration_since(opened) >= self.options.reset_timeout);
                if cooled_down {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    transition = Some((BreakerState::Open, BreakerState::HalfOpen));
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                Some(Admission::Probe)
            }
            BreakerState::HalfOpen => None,
        };

        if admission.is_none() {
            inner.window.record_rejection(now);
        }
        drop(inner);

        if let Some((from, to)) = transition {
            self.emit(from, to);
        }
        admission
    }

    fn settle(&self, admission: Admission, outcome: Outcome) {
        let now = Instant::now();
        let mut inner = self.lock();
        let mut transition = None;

        match admission {
            Admission::Probe => {
                inner.probe_in_flight = false;
                if inner.state == BreakerState::HalfOpen {
                    if outcome == Outcome::Success {
                        inner.state = BreakerState::Closed;
                        inner.opened_at = None;
                        inner.window.reset();
                        inner.window.record(now, outcome);
                        transition = Some((BreakerState::HalfOpen, BreakerState::Closed));
                    } else {
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(now);
                        inner.window.record(now, outcome);
                        transition = Some((BreakerState::HalfOpen, BreakerState::Open));
                    }
                }
            }
            Admission::Normal => {
                inner.window.record(now, outcome);
                if inner.state == BreakerState::Closed
                    && outcome != Outcome::Success
                    && self.should_trip(&inner.window.totals(now))
                {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                    transition = Some((BreakerState::Closed, BreakerState::Open));
                }
            }
        }
        drop(inner);

        if let Some((from, to)) = transition {
            self.emit(from, to);
        }
    }

    /// Releases a probe whose caller went away before it finished.
    fn abandon_probe(&self) {
        self.lock().probe_in_flight = false;
    }

    fn should_trip(&self, counts: &Counts) -> bool {
        let calls = counts.calls();
        calls > 0
            && calls >= u64::from(self.options.volume_threshold)
            && counts.errors() * 100 >= u64::from(self.options.error_threshold_percentage) * calls
    }

    fn emit(&self, from: BreakerState, to: BreakerState) {
        match to {
            BreakerState::Open => {
                tracing::warn!(breaker = %self.name, %from, "Circuit breaker opened");
            }
            BreakerState::HalfOpen => {
                tracing::info!(breaker = %self.name, "Circuit breaker half-open, probing");
            }
            BreakerState::Closed => {
                tracing::info!(breaker = %self.name, "Circuit breaker closed");
            }
        }

        metrics::counter!(
            "circuit_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "state" => to.as_str()
        )
        .increment(1);

        // Nobody listening is fine
        let _ = self.events.send(BreakerEvent {
            name: self.name.clone(),
            from,
            to,
        });
    }

    fn count_call(&self, outcome: &'static str) {
        metrics::counter!(
            "circuit_breaker_calls_total",
            "breaker" => self.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

/// Records exactly one outcome per admitted call, and frees the probe slot if
/// the caller is dropped mid-call.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl ProbeGuard<'_> {
    fn settle(&mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.settle(self.admission, outcome);
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Probe {
            self.breaker.abandon_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn breaker(options: BreakerOptions) -> (Arc<CircuitBreaker>, broadcast::Receiver<BreakerEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (Arc::new(CircuitBreaker::new("test-service", options, tx)), rx)
    }

    async fn fail(breaker: &CircuitBreaker) {
        let result = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(result, Err(BreakerError::Inner("boom"))));
    }

    async fn succeed(breaker: &CircuitBreaker) {
        breaker.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_passes_results_through() {
        let (breaker, _rx) = breaker(BreakerOptions::default());

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.snapshot().successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_closed_below_threshold() {
        let (breaker, _rx) = breaker(BreakerOptions::default());

        for _ in 0..3 {
            succeed(&breaker).await;
        }
        fail(&breaker).await;

        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.snapshot().error_percentage, 25.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_at_threshold_and_fails_fast() {
        let (breaker, mut rx) = breaker(BreakerOptions::default());

        succeed(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = invoked.clone();
        let result = breaker
            .call(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;

        assert!(result.unwrap_err().is_open());
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.snapshot().rejections, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.from, BreakerState::Closed);
        assert_eq!(event.to, BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_threshold_delays_trip() {
        let (breaker, _rx) = breaker(BreakerOptions::default().with_volume_threshold(3));

        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);

        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_success_closes() {
        let (breaker, mut rx) = breaker(BreakerOptions::default());
        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.call(|| async { Ok::<_, String>(()) }).await.unwrap_err().is_open());

        tokio::time::advance(Duration::from_secs(5)).await;
        succeed(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);

        let states: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.to)
            .collect();
        assert_eq!(
            states,
            vec![BreakerState::Open, BreakerState::HalfOpen, BreakerState::Closed]
        );

        // Fresh window after closing
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens_and_restarts_timer() {
        let (breaker, _rx) = breaker(BreakerOptions::default());
        fail(&breaker).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.call(|| async { Ok::<_, String>(()) }).await.unwrap_err().is_open());

        tokio::time::advance(Duration::from_secs(5)).await;
        succeed(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_a_single_probe() {
        let (breaker, _rx) = breaker(BreakerOptions::default());
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let probe_breaker = breaker.clone();
        let probe = tokio::spawn(async move {
            probe_breaker
                .call(move || async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, String>("probe")
                })
                .await
        });

        started_rx.await.unwrap();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        let concurrent = breaker.call(|| async { Ok::<_, String>("second") }).await;
        assert!(concurrent.unwrap_err().is_open());

        release_tx.send(()).unwrap();
        assert_eq!(probe.await.unwrap().unwrap(), "probe");
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure_and_action_keeps_running() {
        let options = BreakerOptions::default().with_timeout(Some(Duration::from_millis(100)));
        let (breaker, _rx) = breaker(options);
        let finished = Arc::new(AtomicBool::new(false));

        let flag = finished.clone();
        let result = breaker
            .call(move || async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.snapshot().timeouts, 1);
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_calls_leave_the_window() {
        let (breaker, _rx) = breaker(BreakerOptions::default());
        for _ in 0..3 {
            succeed(&breaker).await;
        }

        tokio::time::advance(Duration::from_secs(11)).await;
        fail(&breaker).await;

        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_counts_as_failure_and_is_resumed() {
        let (breaker, _rx) = breaker(BreakerOptions::default());

        let caller_breaker = breaker.clone();
        let caller = tokio::spawn(async move {
            caller_breaker
                .call(|| async {
                    if true {
                        panic!("action blew up");
                    }
                    Ok::<(), String>(())
                })
                .await
        });

        let join_err = caller.await.unwrap_err();
        assert!(join_err.is_panic());
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.snapshot().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_probe_frees_the_slot() {
        let (breaker, _rx) = breaker(BreakerOptions::default().with_timeout(None));
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let probe_breaker = breaker.clone();
        let probe = tokio::spawn(async move {
            probe_breaker
                .call(move || async move {
                    let _ = started_tx.send(());
                    std::future::pending::<Result<(), String>>().await
                })
                .await
        });
        started_rx.await.unwrap();

        probe.abort();
        let _ = probe.await;

        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
