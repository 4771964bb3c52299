//! HTTP client with rate limiting, circuit breaking, and paced retries.

mod user_agent;

pub use user_agent::{UserAgentPool, BUILTIN_USER_AGENTS, DEFAULT_USER_AGENT};

use std::time::{Duration, Instant};

use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::pacer::Pacer;
use super::rate_limiter::RateLimiter;

/// Total attempts per request, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Failure of a single fetch, after retries were exhausted.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The local request budget was spent, or the portal answered 429.
    /// Never retried; the caller decides when to come back.
    #[error("request rate limit exceeded")]
    RateLimited,

    /// The circuit breaker rejected the call before it left the process.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Connection failure, timeout, or a 5xx other than 503.
    #[error("network error: {0}")]
    Network(String),

    /// The portal reported itself unavailable (503).
    #[error("portal unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A response that is neither success nor a recognized failure mode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::UpstreamUnavailable(_))
    }
}

// Maps a response status to the fetch outcome. 429 surfaces immediately,
// 503 and other 5xx are retryable, anything else unexpected is invalid.
fn classify_status(status: StatusCode) -> Result<(), FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited);
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(FetchError::UpstreamUnavailable(format!(
            "upstream returned {}",
            status
        )));
    }
    if status.is_server_error() {
        return Err(FetchError::Network(format!("upstream returned {}", status)));
    }
    if !status.is_success() {
        return Err(FetchError::InvalidResponse(format!(
            "unexpected status {}",
            status
        )));
    }
    Ok(())
}

/// HTTP client enforcing the portal etiquette on every request.
///
/// Each call takes a rate-limit token, passes the circuit breaker, pays a
/// randomized pacing delay, and presents a rotated user agent. Transient
/// failures are retried with exponential backoff; every attempt outcome is
/// reported back to the breaker.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    origin: String,
    pacer: Pacer,
    user_agents: UserAgentPool,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    max_attempts: u32,
    backoff_base: Duration,
}

impl HttpClient {
    /// Creates a client for the given portal origin.
    ///
    /// The origin is sent as Referer and Origin on every request; the
    /// portal rejects calls without them.
    pub fn new(
        origin: &str,
        timeout: Duration,
        pacer: Pacer,
        user_agents: UserAgentPool,
        rate_limiter: RateLimiter,
        circuit_breaker: CircuitBreaker,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
            pacer,
            user_agents,
            rate_limiter,
            circuit_breaker,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Overrides the retry policy.
    ///
    /// `max_attempts` counts every try including the first, so `3` means at
    /// most two retries after the initial attempt.
    pub fn with_retry(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base = backoff_base;
        self
    }

    /// POSTs a JSON payload and returns the response body as text.
    pub async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<String, FetchError> {
        if !self.rate_limiter.try_acquire() {
            debug!("request budget exhausted, rejecting {}", url);
            return Err(FetchError::RateLimited);
        }

        let mut attempt = 1u32;
        loop {
            if !self.circuit_breaker.try_acquire() {
                return Err(FetchError::CircuitOpen);
            }

            self.pacer.pause().await;

            match self.send_once(url, payload).await {
                Ok(body) => {
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(err) => {
                    self.circuit_breaker.record_failure();
                    if err.is_retryable() && attempt < self.max_attempts {
                        let backoff = self.backoff_delay(attempt);
                        warn!(
                            "request to {} failed ({}), retrying in {:?} (attempt {}/{})",
                            url, err, backoff, attempt, self.max_attempts
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    } else {
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<String, FetchError> {
        let user_agent = self.user_agents.pick().to_string();
        let started = Instant::now();

        let response = self
            .client
            .post(url)
            .header(header::USER_AGENT, &user_agent)
            .header(header::ACCEPT, "application/json")
            .header(header::REFERER, &self.origin)
            .header(header::ORIGIN, &self.origin)
            .json(payload)
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let status = response.status();
        debug!(
            "POST {} -> {} in {}ms",
            url,
            status,
            started.elapsed().as_millis()
        );
        classify_status(status)?;

        response
            .text()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))
    }

    // Exponential backoff with base 2: first retry waits the base delay,
    // each following retry doubles it.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::circuit_breaker::{CircuitBreakerConfig, CircuitState};

    fn test_client(rate_limiter: RateLimiter, circuit_breaker: CircuitBreaker) -> HttpClient {
        HttpClient::new(
            "https://consultas.anvisa.gov.br",
            Duration::from_secs(2),
            Pacer::disabled(),
            UserAgentPool::builtin(),
            rate_limiter,
            circuit_breaker,
        )
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::OK).is_ok());
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Err(FetchError::RateLimited)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Err(FetchError::UpstreamUnavailable(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            Err(FetchError::Network(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            Err(FetchError::InvalidResponse(_))
        ));
    }

    #[test]
    fn retryable_errors() {
        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(FetchError::UpstreamUnavailable("503".into()).is_retryable());
        assert!(!FetchError::RateLimited.is_retryable());
        assert!(!FetchError::CircuitOpen.is_retryable());
        assert!(!FetchError::InvalidResponse("404".into()).is_retryable());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let client = test_client(RateLimiter::default(), CircuitBreaker::default())
            .with_retry(3, Duration::from_secs(2));
        assert_eq!(client.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(client.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(client.backoff_delay(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn exhausted_budget_fails_fast() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire());

        let client = test_client(limiter, CircuitBreaker::default());
        let err = client
            .post_json("http://127.0.0.1:1/never-reached", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited));
    }

    #[tokio::test]
    async fn open_circuit_fails_fast() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            wait_in_open: Duration::from_secs(60),
            ..CircuitBreakerConfig::default()
        });
        for _ in 0..3 {
            breaker.record_failure();
        }

        let client = test_client(RateLimiter::default(), breaker);
        let err = client
            .post_json("http://127.0.0.1:1/never-reached", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::CircuitOpen));
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let breaker = CircuitBreaker::default();
        let client = test_client(RateLimiter::default(), breaker.clone())
            .with_retry(1, Duration::from_millis(1));

        // Nothing listens on port 9; the connection is refused immediately.
        let err = client
            .post_json("http://127.0.0.1:9/", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        // The failed attempt was reported to the breaker.
        assert!(breaker.failure_rate() > 0.0);
    }

    #[tokio::test]
    async fn max_attempts_counts_the_first_try() {
        let breaker = CircuitBreaker::default();
        let client = test_client(RateLimiter::default(), breaker.clone())
            .with_retry(3, Duration::from_millis(1));

        // Three refused attempts are recorded, which trips the default
        // breaker on the last one. A fourth attempt would find the circuit
        // open and surface CircuitOpen instead of the network error.
        let err = client
            .post_json("http://127.0.0.1:9/", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
