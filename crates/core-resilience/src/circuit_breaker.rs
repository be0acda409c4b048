//! Circuit Breaker implementation for fault isolation
//!
//! The circuit breaker prevents cascading failures by failing fast when a
//! dependency is experiencing issues. It has three states:
//! - Closed: Normal operation, calls pass through
//! - Open: Dependency is unhealthy, calls are short-circuited
//! - HalfOpen: A single probe call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     failure_count >= failure_threshold
//! Open     → HalfOpen: next call after recovery_timeout since the last failure
//! HalfOpen → Closed:   probe succeeds
//! HalfOpen → Open:     probe fails and failure_count >= failure_threshold
//! ```
//!
//! The Open → HalfOpen transition is evaluated lazily when a call arrives;
//! there is no background timer.
//!
//! # Locking
//!
//! All mutable state lives behind one mutex. Each admission decision and each
//! outcome (counter update plus threshold check plus transition) happens in a
//! single critical section, and the lock is never held across an `.await`.
//!
//! # Probes
//!
//! Only one probe runs at a time. While it is in flight, further calls are
//! short-circuited exactly as if the circuit were open. The probe slot is
//! released when the attempt settles or when the caller drops the future.
//!
//! # Timeouts
//!
//! When a timeout is configured the operation's future is raced against a
//! `tokio::time` timer. If the timer wins, the future is dropped: work driven
//! only by that future stops, while anything it spawned onto the runtime keeps
//! running unobserved.

use crate::clock::{Clock, SystemClock};
use crate::config::{CircuitBreakerConfig, CircuitBreakerOverrides};
use crate::error::{BreakerError, ConfigError};
use crate::events::{BreakerEvent, EventSink, TracingSink};
use futures::future::Ready;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Entry points without a fallback never render an error
fn no_fallback_error<E>(_: &E) -> String {
    String::new()
}

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally
    Closed,
    /// Circuit is open, calls are short-circuited
    Open,
    /// Circuit is probing for recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Point-in-time view of a breaker's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    /// Milliseconds since the Unix epoch, 0 if never recorded
    pub last_failure_time: u64,
    /// Milliseconds since the Unix epoch, 0 if never recorded
    pub last_success_time: u64,
    pub total_requests: u64,
    /// Consecutive failures as a percentage of lifetime requests.
    ///
    /// This is not a windowed error rate: `failure_count` is cleared by any
    /// success while `total_requests` only grows until `reset`.
    pub failure_rate: f64,
}

/// Mutable state, always accessed under the lock
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u64,
    success_count: u64,
    last_failure_time: u64,
    last_success_time: u64,
    total_requests: u64,
    /// Token of the probe currently admitted in half-open, if any
    probe: Option<u64>,
    next_probe: u64,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: 0,
            last_success_time: 0,
            total_requests: 0,
            probe: None,
            next_probe: 0,
        }
    }

    fn take_probe(&mut self) -> u64 {
        let token = self.next_probe;
        self.next_probe = self.next_probe.wrapping_add(1);
        self.probe = Some(token);
        token
    }
}

/// Outcome of the entry check
enum Admission {
    /// Run the operation; `probe` carries the slot token in half-open
    Attempt { probe: Option<u64> },
    /// Short-circuit without running the operation
    Reject,
}

/// Releases the half-open probe slot when dropped
struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    token: u64,
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        let mut inner = self.breaker.lock();
        if inner.probe == Some(self.token) {
            inner.probe = None;
        }
    }
}

/// Circuit breaker guarding calls to one dependency
///
/// Clones share the same state, so a breaker can be handed to every component
/// that talks to the dependency it protects.
///
/// # Example
/// ```no_run
/// use breakwater_core_resilience::{BreakerError, CircuitBreaker, CircuitBreakerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), BreakerError<std::io::Error>> {
///     let breaker = CircuitBreaker::new("database", CircuitBreakerConfig::default());
///
///     let rows = breaker
///         .execute_with_fallback(
///             || async { Ok::<_, std::io::Error>(vec![1, 2, 3]) },
///             || async { Ok(Vec::new()) },
///         )
///         .await?;
///
///     println!("{} rows", rows.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<BreakerInner>>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

/// Build a breaker from a name and optional partial configuration
pub fn create_circuit_breaker(
    name: impl Into<String>,
    overrides: Option<CircuitBreakerOverrides>,
) -> Result<CircuitBreaker, ConfigError> {
    CircuitBreaker::from_overrides(name, overrides.unwrap_or_default())
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(BreakerInner::new())),
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingSink),
        }
    }

    /// Create a new circuit breaker with default configuration
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Create a breaker from overrides merged over the defaults
    pub fn from_overrides(
        name: impl Into<String>,
        overrides: CircuitBreakerOverrides,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(name, overrides.into_config()?))
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the event sink
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Every error the operation returns counts toward opening the circuit.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(
            op,
            None::<fn() -> Ready<Result<T, E>>>,
            |_: &E| true,
            no_fallback_error,
        )
        .await
    }

    /// Execute an operation, falling back when it is skipped or fails
    ///
    /// If both the operation and the fallback fail, the operation's error is
    /// returned. On a short-circuited call the fallback's error is returned as
    /// [`BreakerError::Fallback`].
    pub async fn execute_with_fallback<F, Fut, G, GFut, T, E>(
        &self,
        op: F,
        fallback: G,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run(op, Some(fallback), |_: &E| true, E::to_string).await
    }

    /// Execute an operation, counting only errors for which `counts` is true
    ///
    /// Errors that do not count (validation failures, client-side rejections)
    /// leave the counters untouched and are returned as-is.
    pub async fn execute_classified<F, Fut, C, T, E>(
        &self,
        op: F,
        counts: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        self.run(
            op,
            None::<fn() -> Ready<Result<T, E>>>,
            counts,
            no_fallback_error,
        )
        .await
    }

    /// [`execute_classified`](Self::execute_classified) with a fallback for
    /// skipped calls and counted failures
    pub async fn execute_classified_with_fallback<F, Fut, G, GFut, C, T, E>(
        &self,
        op: F,
        fallback: G,
        counts: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: fmt::Display,
    {
        self.run(op, Some(fallback), counts, E::to_string).await
    }

    /// `describe` renders a fallback error for the event stream
    async fn run<F, Fut, G, GFut, C, T, E>(
        &self,
        op: F,
        fallback: Option<G>,
        counts: C,
        describe: fn(&E) -> String,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let probe = match self.admit(fallback.is_some()) {
            Admission::Attempt { probe } => probe,
            Admission::Reject => {
                return match fallback {
                    Some(fallback) => fallback().await.map_err(BreakerError::Fallback),
                    None => Err(BreakerError::Open {
                        name: self.name.to_string(),
                    }),
                };
            }
        };
        let slot = probe.map(|token| ProbeSlot {
            breaker: self,
            token,
        });

        let started = Instant::now();
        let outcome = self.attempt(op()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let err = match outcome {
            Ok(value) => {
                self.complete_success(probe.is_some(), duration_ms);
                return Ok(value);
            }
            Err(BreakerError::Operation(e)) if !counts(&e) => {
                self.emit(BreakerEvent::Ignored {
                    breaker: self.name.to_string(),
                    duration_ms,
                });
                return Err(BreakerError::Operation(e));
            }
            Err(err) => err,
        };

        self.complete_failure(duration_ms, err.is_timeout());
        // The probe has settled; don't hold the slot while the fallback runs
        drop(slot);

        match fallback {
            Some(fallback) => {
                self.emit(BreakerEvent::FallbackUsed {
                    breaker: self.name.to_string(),
                });
                match fallback().await {
                    Ok(value) => Ok(value),
                    Err(fallback_err) => {
                        self.emit(BreakerEvent::FallbackFailed {
                            breaker: self.name.to_string(),
                            error: describe(&fallback_err),
                        });
                        Err(err)
                    }
                }
            }
            None => Err(err),
        }
    }

    /// Entry check: count the request and decide whether it may proceed
    fn admit(&self, has_fallback: bool) -> Admission {
        let now = self.clock.now_millis();
        let mut events = Vec::new();

        let admission = {
            let mut inner = self.lock();
            inner.total_requests += 1;

            let state = inner.state;
            match state {
                CircuitState::Closed => Admission::Attempt { probe: None },
                CircuitState::Open if self.recovery_elapsed(&inner, now) => {
                    inner.state = CircuitState::HalfOpen;
                    events.push(BreakerEvent::Transition {
                        breaker: self.name.to_string(),
                        from: CircuitState::Open,
                        to: CircuitState::HalfOpen,
                        failure_count: inner.failure_count,
                    });
                    Admission::Attempt {
                        probe: Some(inner.take_probe()),
                    }
                }
                CircuitState::HalfOpen if inner.probe.is_none() => Admission::Attempt {
                    probe: Some(inner.take_probe()),
                },
                state => {
                    events.push(BreakerEvent::Rejected {
                        breaker: self.name.to_string(),
                        state,
                        failure_count: inner.failure_count,
                        fallback: has_fallback,
                    });
                    Admission::Reject
                }
            }
        };

        for event in &events {
            self.events.record(event);
        }
        admission
    }

    async fn attempt<Fut, T, E>(&self, fut: Fut) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match self.config.effective_timeout() {
            None => fut.await.map_err(BreakerError::Operation),
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(BreakerError::Operation),
                Err(_) => Err(BreakerError::Timeout {
                    name: self.name.to_string(),
                    timeout: limit,
                }),
            },
        }
    }

    fn complete_success(&self, was_probe: bool, duration_ms: u64) {
        let now = self.clock.now_millis();
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            Self::apply_success(&mut inner, now);
            events.push(BreakerEvent::Succeeded {
                breaker: self.name.to_string(),
                state: inner.state,
                success_count: inner.success_count,
                duration_ms,
            });
            if was_probe && inner.state == CircuitState::HalfOpen {
                inner.state = CircuitState::Closed;
                events.push(BreakerEvent::Transition {
                    breaker: self.name.to_string(),
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                    failure_count: inner.failure_count,
                });
            }
        }
        for event in &events {
            self.events.record(event);
        }
    }

    fn complete_failure(&self, duration_ms: u64, timed_out: bool) {
        let now = self.clock.now_millis();
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            let from = inner.state;
            self.apply_failure(&mut inner, now);
            events.push(BreakerEvent::Failed {
                breaker: self.name.to_string(),
                state: from,
                failure_count: inner.failure_count,
                threshold: self.config.failure_threshold,
                duration_ms,
                timed_out,
            });
            if from != inner.state {
                events.push(BreakerEvent::Transition {
                    breaker: self.name.to_string(),
                    from,
                    to: inner.state,
                    failure_count: inner.failure_count,
                });
            }
        }
        for event in &events {
            self.events.record(event);
        }
    }

    /// Record a success observed outside `execute`
    ///
    /// Increments the success count, stamps the success time and clears the
    /// consecutive failure count. Does not change state.
    pub fn record_success(&self) {
        let now = self.clock.now_millis();
        Self::apply_success(&mut self.lock(), now);
    }

    /// Record a failure observed outside `execute`
    ///
    /// Opens the circuit from any state once the failure threshold is reached.
    pub fn record_failure(&self) {
        let now = self.clock.now_millis();
        let transition = {
            let mut inner = self.lock();
            let from = inner.state;
            self.apply_failure(&mut inner, now);
            (from != inner.state).then(|| BreakerEvent::Transition {
                breaker: self.name.to_string(),
                from,
                to: inner.state,
                failure_count: inner.failure_count,
            })
        };
        if let Some(event) = transition {
            self.events.record(&event);
        }
    }

    fn apply_success(inner: &mut BreakerInner, now: u64) {
        inner.success_count += 1;
        inner.last_success_time = now;
        inner.failure_count = 0;
    }

    fn apply_failure(&self, inner: &mut BreakerInner, now: u64) {
        inner.failure_count += 1;
        inner.last_failure_time = now;
        if inner.failure_count >= u64::from(self.config.failure_threshold) {
            inner.state = CircuitState::Open;
        }
    }

    fn recovery_elapsed(&self, inner: &BreakerInner, now: u64) -> bool {
        let elapsed = now.saturating_sub(inner.last_failure_time);
        u128::from(elapsed) >= self.config.recovery_timeout.as_millis()
    }

    /// True once the recovery timeout has elapsed since the last failure
    pub fn should_attempt_reset(&self) -> bool {
        let now = self.clock.now_millis();
        self.recovery_elapsed(&self.lock(), now)
    }

    /// Snapshot of state and counters
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.lock();
        let failure_rate = if inner.total_requests > 0 {
            inner.failure_count as f64 / inner.total_requests as f64 * 100.0
        } else {
            0.0
        };

        CircuitBreakerMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            total_requests: inner.total_requests,
            failure_rate,
        }
    }

    /// Override the state without touching counters
    pub fn force_state(&self, state: CircuitState) {
        let from = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.state, state)
        };
        self.events.record(&BreakerEvent::Forced {
            breaker: self.name.to_string(),
            from,
            to: state,
        });
    }

    /// Reset the circuit breaker to its initial state
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            let next_probe = inner.next_probe;
            *inner = BreakerInner::new();
            // Keep tokens unique so a stale probe can't release a fresh slot
            inner.next_probe = next_probe;
        }
        self.events.record(&BreakerEvent::Reset {
            breaker: self.name.to_string(),
        });
    }

    /// True unless the circuit is open
    pub fn is_healthy(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// True if a call arriving now could reach the dependency
    ///
    /// Unlike [`is_healthy`](Self::is_healthy), an open circuit whose recovery
    /// window has elapsed counts as available.
    pub fn is_available(&self) -> bool {
        let now = self.clock.now_millis();
        let inner = self.lock();
        match inner.state {
            CircuitState::Open => self.recovery_elapsed(&inner, now),
            _ => true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is safe to reuse
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: BreakerEvent) {
        self.events.record(&event);
    }
}
