//! Scraping client for the ANVISA consultation portal.
//!
//! The portal is a single-page application backed by an undocumented JSON
//! API. Both operations are POST requests against fixed endpoints, with
//! the lookup value carried in a filter object.

use async_trait::async_trait;
use tracing::info;

use super::http_client::{FetchError, HttpClient};
use super::parser;
use crate::error::{ScrapingError, ScrapingErrorKind};
use crate::models::{LeafletRecord, MedicineRecord};

pub const SEARCH_PATH: &str = "/api/consulta/medicamentos";
pub const LEAFLET_PATH: &str = "/api/consulta/bulario";

/// Result page size requested from the search endpoint.
pub const SEARCH_PAGE_SIZE: u32 = 20;

/// Upstream operations the service layer depends on.
#[async_trait]
pub trait ScrapingClient: Send + Sync {
    /// Searches registrations by product or ingredient name.
    async fn search_medicines(&self, query: &str) -> Result<Vec<MedicineRecord>, ScrapingError>;

    /// Fetches the leaflet texts for one registration.
    async fn get_leaflet(&self, registry_number: &str) -> Result<LeafletRecord, ScrapingError>;
}

/// [`ScrapingClient`] talking to the live ANVISA portal.
pub struct AnvisaClient {
    http: HttpClient,
    base_url: String,
}

impl AnvisaClient {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    async fn execute(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<String, ScrapingError> {
        let body = self
            .http
            .post_json(url, payload)
            .await
            .map_err(fetch_to_scraping)?;
        if body.is_empty() {
            return Err(ScrapingError::new(
                ScrapingErrorKind::InvalidResponse,
                "empty response from the portal",
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl ScrapingClient for AnvisaClient {
    async fn search_medicines(&self, query: &str) -> Result<Vec<MedicineRecord>, ScrapingError> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        let payload = serde_json::json!({
            "count": SEARCH_PAGE_SIZE,
            "filter": { "nome": query },
            "page": 1,
        });

        let body = self.execute(&url, &payload).await?;
        let records = parser::parse_search_results(&body, &self.base_url).map_err(|err| {
            ScrapingError::new(
                ScrapingErrorKind::ParsingError,
                format!("could not parse search response: {}", err),
            )
        })?;
        info!(
            "portal search for '{}' returned {} records",
            query,
            records.len()
        );
        Ok(records)
    }

    async fn get_leaflet(&self, registry_number: &str) -> Result<LeafletRecord, ScrapingError> {
        let url = format!("{}{}", self.base_url, LEAFLET_PATH);
        let payload = serde_json::json!({
            "filter": { "numeroRegistro": registry_number },
        });

        let body = self.execute(&url, &payload).await?;
        parser::parse_leaflet(&body, registry_number).map_err(|err| {
            ScrapingError::new(
                ScrapingErrorKind::ParsingError,
                format!("could not parse leaflet response: {}", err),
            )
        })
    }
}

fn fetch_to_scraping(err: FetchError) -> ScrapingError {
    let kind = match &err {
        FetchError::RateLimited => ScrapingErrorKind::RateLimitExceeded,
        FetchError::CircuitOpen => ScrapingErrorKind::CircuitOpen,
        FetchError::Network(_) => ScrapingErrorKind::NetworkError,
        FetchError::UpstreamUnavailable(_) => ScrapingErrorKind::ServiceUnavailable,
        FetchError::InvalidResponse(_) => ScrapingErrorKind::InvalidResponse,
    };
    ScrapingError::new(kind, err.to_string())
}
