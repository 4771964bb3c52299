//! Circuit breaker guarding calls to the portal.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

pub const DEFAULT_WINDOW_SIZE: usize = 5;
pub const DEFAULT_MINIMUM_CALLS: usize = 3;
pub const DEFAULT_FAILURE_RATE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_WAIT_IN_OPEN: Duration = Duration::from_secs(20);
pub const DEFAULT_HALF_OPEN_PROBES: usize = 2;

/// Position of the breaker in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through and outcomes are recorded.
    Closed,
    /// Calls are rejected without touching the network.
    Open,
    /// A limited number of probe calls are allowed through.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Tunables for the breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// How many recent outcomes the failure rate is computed over.
    pub window_size: usize,
    /// Outcomes required in the window before the rate is evaluated at all.
    pub minimum_calls: usize,
    /// Failure rate at or above which the circuit opens, in `0.0..=1.0`.
    pub failure_rate_threshold: f64,
    /// How long the circuit stays open before admitting probes.
    pub wait_in_open: Duration,
    /// Probe calls admitted while half-open.
    pub half_open_probes: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            minimum_calls: DEFAULT_MINIMUM_CALLS,
            failure_rate_threshold: DEFAULT_FAILURE_RATE_THRESHOLD,
            wait_in_open: DEFAULT_WAIT_IN_OPEN,
            half_open_probes: DEFAULT_HALF_OPEN_PROBES,
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    /// Sliding window of recent outcomes, `true` marks a failure.
    window: VecDeque<bool>,
    last_state_change: Instant,
    half_open_admitted: usize,
}

/// Failure-rate driven gate in front of the portal.
///
/// Every request attempt asks `try_acquire` before touching the network and
/// reports its outcome afterwards. Clones share state, so a single breaker
/// protects the portal across all concurrent callers. The open-to-half-open
/// transition happens lazily on the first call after the wait elapses.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<CircuitInner>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                last_state_change: Instant::now(),
                half_open_admitted: 0,
            })),
        }
    }

    /// Whether a call may proceed right now.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if inner.last_state_change.elapsed() >= self.config.wait_in_open {
                    Self::transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_admitted = 1;
                    true
                } else {
                    debug!("circuit is open, rejecting call");
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_admitted < self.config.half_open_probes {
                    inner.half_open_admitted += 1;
                    true
                } else {
                    debug!("half-open probe budget spent, rejecting call");
                    false
                }
            }
        }
    }

    /// Records a successful upstream outcome.
    ///
    /// A single successful probe closes a half-open circuit and resets the
    /// window.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => Self::transition(&mut inner, CircuitState::Closed),
            _ => {
                self.push_outcome(&mut inner, false);
                self.evaluate(&mut inner);
            }
        }
    }

    /// Records a failed upstream outcome.
    ///
    /// A failed probe reopens the circuit and restarts the open-timer.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => Self::transition(&mut inner, CircuitState::Open),
            _ => {
                self.push_outcome(&mut inner, true);
                self.evaluate(&mut inner);
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Failure rate over the current window, for the status report.
    pub fn failure_rate(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        if inner.window.is_empty() {
            return 0.0;
        }
        let failures = inner.window.iter().filter(|failed| **failed).count();
        failures as f64 / inner.window.len() as f64
    }

    fn push_outcome(&self, inner: &mut CircuitInner, failure: bool) {
        inner.window.push_back(failure);
        while inner.window.len() > self.config.window_size {
            inner.window.pop_front();
        }
    }

    // Opens the circuit when enough outcomes are recorded and the failure
    // rate reaches the threshold.
    fn evaluate(&self, inner: &mut CircuitInner) {
        if inner.window.len() < self.config.minimum_calls {
            return;
        }
        let failures = inner.window.iter().filter(|failed| **failed).count();
        let rate = failures as f64 / inner.window.len() as f64;
        if rate >= self.config.failure_rate_threshold {
            Self::transition(inner, CircuitState::Open);
        }
    }

    fn transition(inner: &mut CircuitInner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        info!(from = inner.state.as_str(), to = to.as_str(), "circuit state transition");
        inner.state = to;
        inner.last_state_change = Instant::now();
        inner.window.clear();
        inner.half_open_admitted = 0;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
