//! Randomized delay between portal requests.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::trace;

/// Sleeps for a uniformly random duration before each request.
///
/// The jitter keeps the request cadence from looking mechanical to the
/// portal's traffic filters. The delay applies to every attempt, retries
/// included.
#[derive(Debug, Clone)]
pub struct Pacer {
    min_delay: Duration,
    max_delay: Duration,
}

impl Pacer {
    /// Creates a pacer for the given delay range. If the bounds are
    /// reversed they are swapped rather than rejected.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        if min_delay <= max_delay {
            Self {
                min_delay,
                max_delay,
            }
        } else {
            Self {
                min_delay: max_delay,
                max_delay: min_delay,
            }
        }
    }

    /// A pacer that never sleeps, for tests and local replays.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub async fn pause(&self) {
        let delay = self.pick_delay();
        if !delay.is_zero() {
            trace!("pacing for {:?}", delay);
            sleep(delay).await;
        }
    }

    // Sampled before the await point so the thread-local rng is not held
    // across it.
    fn pick_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min_ms = self.min_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn picked_delay_stays_in_range() {
        let pacer = Pacer::new(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..100 {
            let delay = pacer.pick_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let pacer = Pacer::new(Duration::from_millis(30), Duration::from_millis(10));
        let delay = pacer.pick_delay();
        assert!(delay >= Duration::from_millis(10));
        assert!(delay <= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn disabled_pacer_returns_immediately() {
        let pacer = Pacer::disabled();
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn pause_waits_at_least_the_minimum() {
        let pacer = Pacer::new(Duration::from_millis(20), Duration::from_millis(30));
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
