//! Error types shared across scraping and service layers.

use thiserror::Error;

/// Classification of a failed portal interaction.
///
/// Every error surfaced by the scraping layer carries exactly one of these
/// kinds so callers can decide how to react without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapingErrorKind {
    /// The local token bucket was exhausted, or the portal answered 429.
    RateLimitExceeded,
    /// The circuit breaker is open and the request never left the process.
    CircuitOpen,
    /// Connection failure, timeout, or a retryable 5xx from the portal.
    NetworkError,
    /// The portal answered 503.
    ServiceUnavailable,
    /// The response body could not be parsed as the expected JSON shape.
    ParsingError,
    /// The portal answered with an unexpected status or an empty body.
    InvalidResponse,
}

impl ScrapingErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapingErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ScrapingErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ScrapingErrorKind::NetworkError => "NETWORK_ERROR",
            ScrapingErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ScrapingErrorKind::ParsingError => "PARSING_ERROR",
            ScrapingErrorKind::InvalidResponse => "INVALID_RESPONSE",
        }
    }
}

/// Failure while fetching or interpreting data from the portal.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ScrapingError {
    kind: ScrapingErrorKind,
    message: String,
}

impl ScrapingError {
    pub fn new(kind: ScrapingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ScrapingErrorKind {
        self.kind
    }
}

/// Failure surfaced by the service layer.
///
/// Input validation problems are reported separately from upstream failures
/// so they are never retried or counted against the portal's health.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Scraping(#[from] ScrapingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ScrapingErrorKind::RateLimitExceeded.as_str(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(ScrapingErrorKind::CircuitOpen.as_str(), "CIRCUIT_OPEN");
        assert_eq!(ScrapingErrorKind::ParsingError.as_str(), "PARSING_ERROR");
    }

    #[test]
    fn scraping_error_preserves_kind_through_service_error() {
        let err = ScrapingError::new(ScrapingErrorKind::ServiceUnavailable, "portal down");
        let service_err: ServiceError = err.into();
        match service_err {
            ServiceError::Scraping(inner) => {
                assert_eq!(inner.kind(), ScrapingErrorKind::ServiceUnavailable);
                assert_eq!(inner.to_string(), "portal down");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
