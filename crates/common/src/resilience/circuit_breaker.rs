//! Error-rate circuit breaker
//!
//! A breaker guards one logical dependency. While CLOSED it lets calls
//! through and tallies outcomes; once at least `volume_threshold` outcomes
//! have been seen in the current window and the failure rate reaches
//! `error_threshold_percentage`, it trips OPEN and answers every call without
//! invoking the dependency. After `reset_timeout` the breaker goes HALF_OPEN
//! and admits exactly one probe: success closes the circuit, failure re-opens
//! it and restarts the timer.
//!
//! All state for one breaker sits behind a single mutex, so threshold
//! evaluation and probe admission are atomic with respect to concurrent
//! callers. Listener callbacks run after the lock is released.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::error::{AttemptError, BreakerError, ConfigError, ConfigResult, FallbackCause};
use super::events::{BreakerEvent, BreakerListener, Fallback};
use super::timeout::attempt_within;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing a single probe to test recovery
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

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Deadline for a single guarded call
    pub timeout: Duration,
    /// Failure rate (percent of samples) at which the circuit opens
    pub error_threshold_percentage: u8,
    /// Time to wait before transitioning from open to half-open
    pub reset_timeout: Duration,
    /// Minimum number of samples before the failure rate is trusted
    pub volume_threshold: u32,
    /// Length of the measurement window while closed
    pub rolling_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            error_threshold_percentage: 50,
            reset_timeout: Duration::from_secs(30),
            volume_threshold: 5,
            rolling_window: Duration::from_secs(10),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout must be greater than 0"));
        }

        if self.error_threshold_percentage == 0 || self.error_threshold_percentage > 100 {
            return Err(ConfigError::invalid(format!(
                "error_threshold_percentage must be within 1..=100, got {}",
                self.error_threshold_percentage
            )));
        }

        if self.volume_threshold == 0 {
            return Err(ConfigError::invalid("volume_threshold must be greater than 0"));
        }

        if self.rolling_window.is_zero() {
            return Err(ConfigError::invalid("rolling_window must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn error_threshold_percentage(mut self, percentage: u8) -> Self {
        self.config.error_threshold_percentage = percentage;
        self
    }

    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.config.reset_timeout = reset_timeout;
        self
    }

    pub fn volume_threshold(mut self, threshold: u32) -> Self {
        self.config.volume_threshold = threshold;
        self
    }

    pub fn rolling_window(mut self, window: Duration) -> Self {
        self.config.rolling_window = window;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Outcome tallies for the current measurement window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerCounters {
    pub successes: u64,
    /// Failed calls, including timeouts
    pub failures: u64,
    pub timeouts: u64,
    pub fallbacks: u64,
    pub rejects: u64,
}

impl BreakerCounters {
    /// Outcomes that count toward the failure rate.
    pub fn samples(&self) -> u64 {
        self.successes + self.failures
    }

    /// Failure rate in percent; 0 when there are no samples.
    pub fn failure_rate(&self) -> f64 {
        match self.samples() {
            0 => 0.0,
            samples => self.failures as f64 * 100.0 / samples as f64,
        }
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub counters: BreakerCounters,
    pub failure_rate: f64,
    pub state_changed_at: Instant,
    pub time_in_state: Duration,
    pub config: CircuitBreakerConfig,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    counters: BreakerCounters,
    window_started_at: Instant,
    state_changed_at: Instant,
    probe_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Timeout,
}

/// A refused or failed call, before any fallback is applied.
struct Rejection<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    cause: FallbackCause,
    error: BreakerError<E>,
}

/// Named circuit breaker for one dependency.
///
/// Clones share state, so a breaker can be handed to many tasks.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerInner>>,
    listeners: Arc<Vec<Arc<dyn BreakerListener>>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("counters", &inner.counters)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            listeners: Arc::clone(&self.listeners),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let now = clock.now();
        Ok(Self {
            name: Arc::from(name.into()),
            config,
            inner: Arc::new(Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                counters: BreakerCounters::default(),
                window_started_at: now,
                state_changed_at: now,
                probe_in_flight: false,
            })),
            listeners: Arc::new(Vec::new()),
            clock: Arc::new(clock),
        })
    }

    /// Attach a listener that observes this breaker's events
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        Arc::make_mut(&mut self.listeners).push(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `action` through the breaker.
    ///
    /// Returns [`BreakerError::Unavailable`] without invoking the action when
    /// the circuit is open or a half-open probe is already outstanding.
    pub async fn fire<F, Fut, T, E>(&self, action: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let timeout = self.config.timeout;
        self.run(move || attempt_within(timeout, action()))
            .await
            .map_err(|rejection| rejection.error)
    }

    /// Run `action` through the breaker, answering with `fallback` whenever
    /// the real result is unavailable (open circuit, timeout, or failure).
    pub async fn fire_with_fallback<F, Fut, T, E, B>(&self, action: F, fallback: &B) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        B: Fallback<T> + ?Sized,
    {
        let timeout = self.config.timeout;
        match self.run(move || attempt_within(timeout, action())).await {
            Ok(value) => value,
            Err(rejection) => self.apply_fallback(rejection.cause, fallback),
        }
    }

    /// Run `action` through the breaker without the breaker's own deadline.
    ///
    /// For actions that bound their own attempts (a retry loop applying
    /// `config().timeout` to each try). An [`AttemptError::TimedOut`] result
    /// is tallied as a timeout, [`AttemptError::Failed`] as a failure.
    pub async fn guard<F, Fut, T, E>(&self, action: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AttemptError<E>>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.run(action).await.map_err(|rejection| rejection.error)
    }

    /// Like [`guard`](Self::guard), answering with `fallback` whenever the
    /// real result is unavailable.
    pub async fn guard_with_fallback<F, Fut, T, E, B>(&self, action: F, fallback: &B) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AttemptError<E>>>,
        E: std::error::Error + Send + Sync + 'static,
        B: Fallback<T> + ?Sized,
    {
        match self.run(action).await {
            Ok(value) => value,
            Err(rejection) => self.apply_fallback(rejection.cause, fallback),
        }
    }

    #[instrument(skip_all, fields(dependency = %self.name))]
    async fn run<F, Fut, T, E>(&self, action: F) -> Result<T, Rejection<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AttemptError<E>>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let permit = match self.admit() {
            Ok(permit) => permit,
            Err(cause) => {
                let error = BreakerError::Unavailable {
                    dependency: self.name.to_string(),
                    cause: cause.clone(),
                };
                return Err(Rejection { cause, error });
            }
        };

        match action().await {
            Ok(value) => {
                permit.settle(Outcome::Success);
                Ok(value)
            }
            Err(AttemptError::Failed(error)) => {
                permit.settle(Outcome::Failure);
                debug!(dependency = %self.name, error = %error, "circuit breaker: operation failed");
                Err(Rejection {
                    cause: FallbackCause::Failure(error.to_string()),
                    error: BreakerError::Operation { dependency: self.name.to_string(), source: error },
                })
            }
            Err(AttemptError::TimedOut(timeout)) => {
                permit.settle(Outcome::Timeout);
                warn!(
                    dependency = %self.name,
                    timeout_ms = timeout.timeout_ms(),
                    "circuit breaker call timed out"
                );
                Err(Rejection {
                    cause: FallbackCause::Timeout(timeout.timeout),
                    error: BreakerError::Timeout {
                        dependency: self.name.to_string(),
                        timeout: timeout.timeout,
                    },
                })
            }
        }
    }

    /// Current state, applying an elapsed reset timeout first.
    pub fn state(&self) -> CircuitState {
        let mut events = Vec::new();
        let state = {
            let mut inner = self.inner.lock();
            self.refresh(&mut inner, &mut events);
            inner.state
        };
        self.emit(&events);
        state
    }

    /// Snapshot of state and counters.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let mut events = Vec::new();
        let metrics = {
            let mut inner = self.inner.lock();
            self.refresh(&mut inner, &mut events);
            CircuitBreakerMetrics {
                name: self.name.to_string(),
                state: inner.state,
                counters: inner.counters,
                failure_rate: inner.counters.failure_rate(),
                state_changed_at: inner.state_changed_at,
                time_in_state: self.clock.now().saturating_duration_since(inner.state_changed_at),
                config: self.config.clone(),
            }
        };
        self.emit(&events);
        metrics
    }

    /// Force the breaker to CLOSED with zeroed counters.
    pub fn reset(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            let now = self.clock.now();
            self.transition(&mut inner, CircuitState::Closed, now, &mut events);
        }
        info!(dependency = %self.name, "circuit breaker manually reset to closed state");
        self.emit(&events);
    }

    fn admit(&self) -> Result<CallPermit<'_, C>, FallbackCause> {
        let mut events = Vec::new();
        let admission = {
            let mut inner = self.inner.lock();
            self.refresh(&mut inner, &mut events);
            match inner.state {
                CircuitState::Closed => Ok(false),
                CircuitState::HalfOpen if !inner.probe_in_flight => {
                    inner.probe_in_flight = true;
                    Ok(true)
                }
                CircuitState::HalfOpen => {
                    inner.counters.rejects += 1;
                    Err(FallbackCause::ProbeInFlight)
                }
                CircuitState::Open => {
                    inner.counters.rejects += 1;
                    Err(FallbackCause::CircuitOpen)
                }
            }
        };

        let result = match admission {
            Ok(probe) => {
                if probe {
                    debug!(dependency = %self.name, "circuit breaker admitted half-open probe");
                }
                Ok(CallPermit { breaker: self, probe, settled: false })
            }
            Err(cause) => {
                debug!(dependency = %self.name, cause = %cause, "circuit breaker rejected call");
                events.push(BreakerEvent::Rejected { cause: cause.clone() });
                Err(cause)
            }
        };

        self.emit(&events);
        result
    }

    fn record(&self, outcome: Outcome, probe: bool) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            let now = self.clock.now();

            match outcome {
                Outcome::Success => inner.counters.successes += 1,
                Outcome::Failure => inner.counters.failures += 1,
                Outcome::Timeout => {
                    inner.counters.timeouts += 1;
                    inner.counters.failures += 1;
                    events.push(BreakerEvent::TimedOut { timeout: self.config.timeout });
                }
            }

            if probe {
                inner.probe_in_flight = false;
            }

            match inner.state {
                CircuitState::HalfOpen if probe => {
                    let next = if outcome == Outcome::Success {
                        CircuitState::Closed
                    } else {
                        CircuitState::Open
                    };
                    self.transition(&mut inner, next, now, &mut events);
                }
                CircuitState::Closed if self.tripped(&inner.counters) => {
                    self.transition(&mut inner, CircuitState::Open, now, &mut events);
                }
                // Late settle of a call admitted before the last transition
                _ => {}
            }
        }
        self.emit(&events);
    }

    fn apply_fallback<T, B>(&self, cause: FallbackCause, fallback: &B) -> T
    where
        B: Fallback<T> + ?Sized,
    {
        self.inner.lock().counters.fallbacks += 1;
        info!(dependency = %self.name, cause = %cause, "circuit breaker fallback invoked");
        self.emit(&[BreakerEvent::Fallback { cause: cause.clone() }]);
        fallback.fallback(&cause)
    }

    fn tripped(&self, counters: &BreakerCounters) -> bool {
        counters.samples() >= u64::from(self.config.volume_threshold)
            && counters.failure_rate() >= f64::from(self.config.error_threshold_percentage)
    }

    fn refresh(&self, inner: &mut BreakerInner, events: &mut Vec<BreakerEvent>) {
        let now = self.clock.now();
        match inner.state {
            CircuitState::Open
                if now.saturating_duration_since(inner.state_changed_at)
                    >= self.config.reset_timeout =>
            {
                self.transition(inner, CircuitState::HalfOpen, now, events);
            }
            CircuitState::Closed
                if now.saturating_duration_since(inner.window_started_at)
                    >= self.config.rolling_window =>
            {
                inner.counters = BreakerCounters::default();
                inner.window_started_at = now;
            }
            _ => {}
        }
    }

    fn transition(
        &self,
        inner: &mut BreakerInner,
        to: CircuitState,
        now: Instant,
        events: &mut Vec<BreakerEvent>,
    ) {
        let from = inner.state;
        inner.state = to;
        inner.state_changed_at = now;
        inner.probe_in_flight = false;

        match to {
            CircuitState::Closed => {
                inner.counters = BreakerCounters::default();
                inner.window_started_at = now;
                info!(dependency = %self.name, from = %from, "circuit breaker closed");
                events.push(BreakerEvent::Closed);
            }
            CircuitState::Open => {
                let failure_rate = inner.counters.failure_rate();
                warn!(
                    dependency = %self.name,
                    from = %from,
                    failure_rate,
                    failures = inner.counters.failures,
                    successes = inner.counters.successes,
                    reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                    "circuit breaker opened"
                );
                events.push(BreakerEvent::Opened { failure_rate });
            }
            CircuitState::HalfOpen => {
                info!(dependency = %self.name, from = %from, "circuit breaker half-open, next call probes");
                events.push(BreakerEvent::HalfOpened);
            }
        }
    }

    fn emit(&self, events: &[BreakerEvent]) {
        for event in events {
            for listener in self.listeners.iter() {
                listener.on_event(&self.name, event);
            }
        }
    }
}

/// Admission ticket for one call.
///
/// Dropping an unsettled permit (the caller's future was cancelled) records
/// a failure and frees the half-open probe slot.
struct CallPermit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    probe: bool,
    settled: bool,
}

impl<C: Clock> CallPermit<'_, C> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(outcome, self.probe);
    }
}

impl<C: Clock> Drop for CallPermit<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(dependency = %self.breaker.name, "circuit breaker call cancelled before settling");
            self.breaker.record(Outcome::Failure, self.probe);
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the circuit breaker state machine
    //!
    //! Tests cover configuration validation, threshold evaluation, the
    //! open/half-open/closed cycle under a mock clock, probe exclusivity,
    //! timeouts, fallbacks, cancellation, and listener delivery.

    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    use tokio::sync::oneshot;

    use super::*;
    use crate::resilience::clock::MockClock;
    use crate::resilience::error::TimeoutError;

    fn config(volume: u32, threshold: u8) -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder()
            .volume_threshold(volume)
            .error_threshold_percentage(threshold)
            .reset_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(5))
            .rolling_window(Duration::from_secs(600))
            .build()
            .unwrap()
    }

    fn breaker(volume: u32, threshold: u8) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let cb =
            CircuitBreaker::with_clock("inference-service", config(volume, threshold), clock.clone())
                .unwrap();
        (cb, clock)
    }

    async fn succeed(cb: &CircuitBreaker<MockClock>) {
        cb.fire(|| async { Ok::<_, io::Error>(()) }).await.unwrap();
    }

    async fn fail(cb: &CircuitBreaker<MockClock>) {
        let result = cb.fire(|| async { Err::<(), _>(io::Error::other("boom")) }).await;
        assert!(result.is_err());
    }

    async fn trip(cb: &CircuitBreaker<MockClock>) {
        while cb.state() == CircuitState::Closed {
            fail(cb).await;
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl BreakerListener for RecordingListener {
        fn on_event(&self, breaker: &str, event: &BreakerEvent) {
            self.events.lock().push(format!("{breaker}:{}", event.label()));
        }
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_config_default() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.error_threshold_percentage, 50);
        assert_eq!(config.reset_timeout, Duration::from_secs(30));
        assert_eq!(config.volume_threshold, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::builder().error_threshold_percentage(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().error_threshold_percentage(101).build().is_err());
        assert!(CircuitBreakerConfig::builder().volume_threshold(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().timeout(Duration::ZERO).build().is_err());
        assert!(CircuitBreakerConfig::builder().rolling_window(Duration::ZERO).build().is_err());
    }

    #[test]
    fn test_counters_failure_rate() {
        let counters = BreakerCounters { successes: 1, failures: 3, ..Default::default() };
        assert_eq!(counters.samples(), 4);
        assert!((counters.failure_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(BreakerCounters::default().failure_rate(), 0.0);
    }

    /// Threshold reached with enough volume: the next call never reaches the
    /// action.
    #[tokio::test]
    async fn test_opens_once_threshold_reached_with_volume() {
        let (cb, _clock) = breaker(4, 50);

        succeed(&cb).await;
        succeed(&cb).await;
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed, "3 samples is below the volume threshold");

        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open, "2/4 failures meets 50%");

        let invoked = AtomicU32::new(0);
        let result = cb
            .fire(|| async {
                invoked.fetch_add(1, AtomicOrdering::SeqCst);
                Ok::<_, io::Error>(())
            })
            .await;

        assert_eq!(invoked.load(AtomicOrdering::SeqCst), 0);
        match result {
            Err(BreakerError::Unavailable { cause: FallbackCause::CircuitOpen, dependency }) => {
                assert_eq!(dependency, "inference-service");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
        assert_eq!(cb.metrics().counters.rejects, 1);
    }

    #[tokio::test]
    async fn test_stays_closed_below_volume_threshold() {
        let (cb, _clock) = breaker(5, 50);

        for _ in 0..4 {
            fail(&cb).await;
        }

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().counters.failures, 4);
    }

    #[tokio::test]
    async fn test_stays_closed_below_error_rate() {
        let (cb, _clock) = breaker(4, 70);

        for _ in 0..3 {
            succeed(&cb).await;
        }
        for _ in 0..5 {
            fail(&cb).await;
        }

        // 5 / 8 = 62.5% < 70%
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb).await;
        // 6 / 9 = 66.7%
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb).await;
        // 7 / 10 = 70%
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_waits_for_reset_timeout() {
        let (cb, clock) = breaker(2, 50);
        trip(&cb).await;

        clock.advance(Duration::from_secs(29));
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let _ = cb
            .fire(|| async {
                invoked.fetch_add(1, AtomicOrdering::SeqCst);
                Ok::<_, io::Error>(())
            })
            .await;
        assert_eq!(invoked.load(AtomicOrdering::SeqCst), 0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_half_open_success_closes_and_resets_counters() {
        let (cb, clock) = breaker(2, 50);
        trip(&cb).await;
        clock.advance(Duration::from_secs(30));

        succeed(&cb).await;

        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.counters, BreakerCounters::default());
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_and_restarts_timer() {
        let (cb, clock) = breaker(2, 50);
        trip(&cb).await;
        clock.advance(Duration::from_secs(30));

        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(20));
        assert_eq!(cb.state(), CircuitState::Open, "reset timer restarted at probe failure");

        clock.advance(Duration::from_secs(10));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    /// While a probe is outstanding, other callers are rejected.
    #[tokio::test]
    async fn test_single_probe_in_half_open() {
        let (cb, clock) = breaker(2, 50);
        trip(&cb).await;
        clock.advance(Duration::from_secs(30));

        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let probe_cb = cb.clone();
        let probe = tokio::spawn(async move {
            probe_cb
                .fire(|| async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, io::Error>("probe")
                })
                .await
        });

        started_rx.await.unwrap();

        for _ in 0..3 {
            let result = cb.fire(|| async { Ok::<_, io::Error>("other") }).await;
            assert!(matches!(
                result,
                Err(BreakerError::Unavailable { cause: FallbackCause::ProbeInFlight, .. })
            ));
        }

        release_tx.send(()).unwrap();
        assert_eq!(probe.await.unwrap().unwrap(), "probe");
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .timeout(Duration::from_millis(20))
            .volume_threshold(10)
            .build()
            .unwrap();
        let cb = CircuitBreaker::with_clock("vision-service", config, clock).unwrap();

        let result = cb
            .fire(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, io::Error>(())
            })
            .await;

        match result {
            Err(BreakerError::Timeout { timeout, .. }) => {
                assert_eq!(timeout, Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let counters = cb.metrics().counters;
        assert_eq!(counters.timeouts, 1);
        assert_eq!(counters.failures, 1);
    }

    #[tokio::test]
    async fn test_fallback_answers_open_circuit() {
        let (cb, _clock) = breaker(2, 50);
        trip(&cb).await;

        let fallback = |cause: &FallbackCause| format!("unavailable: {cause}");
        let value = cb.fire_with_fallback(|| async { Ok::<_, io::Error>("live".to_string()) }, &fallback).await;

        assert_eq!(value, "unavailable: circuit open");
        let counters = cb.metrics().counters;
        assert_eq!(counters.fallbacks, 1);
        assert_eq!(counters.rejects, 1);
    }

    #[tokio::test]
    async fn test_fallback_answers_timeout() {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder().timeout(Duration::from_millis(10)).build().unwrap();
        let cb = CircuitBreaker::with_clock("identity-provider", config, clock).unwrap();

        let value = cb
            .fire_with_fallback(
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, io::Error>(1)
                },
                &|cause: &FallbackCause| match cause {
                    FallbackCause::Timeout(_) => -1,
                    _ => 0,
                },
            )
            .await;

        assert_eq!(value, -1);
    }

    #[tokio::test]
    async fn test_success_passes_through_fallback_untouched() {
        let (cb, _clock) = breaker(2, 50);
        let value = cb.fire_with_fallback(|| async { Ok::<_, io::Error>(42) }, &|_: &FallbackCause| 0).await;
        assert_eq!(value, 42);
        assert_eq!(cb.metrics().counters.fallbacks, 0);
    }

    /// Guarded work outlives the call timeout; only its reported outcome
    /// reaches the tally.
    #[tokio::test]
    async fn test_guard_skips_call_deadline() {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .timeout(Duration::from_millis(10))
            .volume_threshold(10)
            .build()
            .unwrap();
        let cb = CircuitBreaker::with_clock("database", config, clock).unwrap();

        let value = cb
            .guard(|| async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok::<_, AttemptError<io::Error>>("rows")
            })
            .await
            .unwrap();
        assert_eq!(value, "rows");

        let result = cb
            .guard(|| async {
                Err::<(), _>(AttemptError::<io::Error>::TimedOut(TimeoutError {
                    timeout: Duration::from_millis(10),
                }))
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Timeout { .. })));

        let fallback = cb
            .guard_with_fallback(
                || async { Err::<i32, _>(AttemptError::Failed(io::Error::other("locked"))) },
                &|cause: &FallbackCause| match cause {
                    FallbackCause::Failure(_) => -1,
                    _ => 0,
                },
            )
            .await;
        assert_eq!(fallback, -1);

        let counters = cb.metrics().counters;
        assert_eq!(counters.successes, 1);
        assert_eq!(counters.timeouts, 1);
        assert_eq!(counters.failures, 2);
    }

    /// A dropped call still counts toward the failure tally.
    #[tokio::test]
    async fn test_cancelled_call_counts_as_failure() {
        let (cb, _clock) = breaker(10, 50);

        let pending = cb.fire(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, io::Error>(())
        });
        let outer = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(outer.is_err());

        assert_eq!(cb.metrics().counters.failures, 1);
    }

    #[tokio::test]
    async fn test_rolling_window_starts_fresh() {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .volume_threshold(3)
            .rolling_window(Duration::from_secs(10))
            .build()
            .unwrap();
        let cb = CircuitBreaker::with_clock("database", config, clock.clone()).unwrap();

        fail(&cb).await;
        fail(&cb).await;
        clock.advance(Duration::from_secs(11));
        fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().counters.failures, 1);
    }

    #[tokio::test]
    async fn test_reset_forces_closed() {
        let (cb, _clock) = breaker(2, 50);
        trip(&cb).await;

        cb.reset();

        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.counters, BreakerCounters::default());
    }

    #[tokio::test]
    async fn test_listener_observes_transitions() {
        let listener = Arc::new(RecordingListener::default());
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock("database", config(2, 50), clock.clone())
            .unwrap()
            .with_listener(listener.clone());

        trip(&cb).await;
        let _ = cb.fire_with_fallback(|| async { Ok::<_, io::Error>(()) }, &|_: &FallbackCause| ()).await;
        clock.advance(Duration::from_secs(30));
        succeed(&cb).await;

        let events = listener.events.lock().clone();
        assert_eq!(
            events,
            vec![
                "database:open",
                "database:reject",
                "database:fallback",
                "database:half_open",
                "database:close",
            ]
        );
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let (cb1, _clock) = breaker(2, 50);
        let cb2 = cb1.clone();

        trip(&cb1).await;

        assert_eq!(cb2.state(), CircuitState::Open);
    }
}
