//! Outbound request budget for the portal.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_CAPACITY: u32 = 30;
pub const DEFAULT_REFILL_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    // Tokens accrue continuously at capacity / refill_period, capped at
    // the burst capacity.
    fn refill(&mut self, capacity: f64, refill_period: Duration) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let earned = elapsed.as_secs_f64() / refill_period.as_secs_f64() * capacity;
        self.tokens = (self.tokens + earned).min(capacity);
        self.last_refill = now;
    }
}

/// Token bucket limiting how many requests may leave the process.
///
/// Acquisition never queues: when the bucket is empty the caller gets an
/// immediate rejection and surfaces a rate-limit error instead of stalling.
/// Clones share the same bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    capacity: u32,
    refill_period: Duration,
    state: Arc<Mutex<BucketState>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_period: Duration) -> Self {
        Self {
            capacity,
            refill_period,
            state: Arc::new(Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Takes one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.refill(self.capacity as f64, self.refill_period);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            debug!("request budget exhausted");
            false
        }
    }

    /// Whole tokens currently available, for the status report.
    pub fn available(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.refill(self.capacity as f64, self.refill_period);
        state.tokens as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL_PERIOD)
    }
}
