//! Service layer: cache-first orchestration of portal lookups.
//!
//! Each operation validates its input, consults the cache, and only then
//! reaches for the scraping client. Validation failures never touch the
//! cache or the network.

mod leaflet;
mod medicine;

pub use leaflet::LeafletService;
pub use medicine::MedicineService;

use crate::error::ServiceError;

/// Minimum length accepted for a search query.
pub const MIN_QUERY_LENGTH: usize = 3;

pub(crate) fn validate_search_query(query: &str) -> Result<&str, ServiceError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_LENGTH {
        return Err(ServiceError::InvalidArgument(format!(
            "search query must have at least {} characters",
            MIN_QUERY_LENGTH
        )));
    }
    Ok(trimmed)
}

pub(crate) fn validate_registry_number(registry_number: &str) -> Result<&str, ServiceError> {
    let trimmed = registry_number.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::InvalidArgument(
            "registry number must contain only digits".to_string(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_needs_three_characters() {
        assert!(validate_search_query("ab").is_err());
        assert!(validate_search_query("  ab  ").is_err());
        assert!(validate_search_query("abc").is_ok());
        assert!(validate_search_query("dipirona").is_ok());
    }

    #[test]
    fn query_length_counts_characters_not_bytes() {
        // Three characters even though it is more than three bytes.
        assert!(validate_search_query("ção").is_ok());
    }

    #[test]
    fn query_is_trimmed() {
        assert_eq!(validate_search_query("  dipirona ").unwrap(), "dipirona");
    }

    #[test]
    fn registry_number_must_be_digits() {
        assert!(validate_registry_number("102350056").is_ok());
        assert!(validate_registry_number(" 102350056 ").is_ok());
        assert!(validate_registry_number("123abc").is_err());
        assert!(validate_registry_number("").is_err());
        assert!(validate_registry_number("12 34").is_err());
    }
}
