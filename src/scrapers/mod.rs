//! Scraping layer: resilient HTTP plumbing plus the portal client.

pub mod anvisa;
pub mod circuit_breaker;
pub mod http_client;
pub mod pacer;
pub mod parser;
pub mod rate_limiter;

pub use anvisa::{AnvisaClient, ScrapingClient};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use http_client::{FetchError, HttpClient, UserAgentPool};
pub use pacer::Pacer;
pub use rate_limiter::RateLimiter;
