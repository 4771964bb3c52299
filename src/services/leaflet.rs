//! Leaflet retrieval with its own cache TTL.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::validate_registry_number;
use crate::cache::{cache_key, CacheKind, TtlCache};
use crate::error::ServiceError;
use crate::models::LeafletRecord;
use crate::scrapers::ScrapingClient;

/// Cache-first access to package leaflets.
///
/// Leaflets change far less often than registration metadata, so they are
/// cached independently and with a much longer TTL.
pub struct LeafletService {
    client: Arc<dyn ScrapingClient>,
    cache: TtlCache,
    leaflet_ttl: Duration,
}

impl LeafletService {
    pub fn new(client: Arc<dyn ScrapingClient>, cache: TtlCache, leaflet_ttl: Duration) -> Self {
        Self {
            client,
            cache,
            leaflet_ttl,
        }
    }

    /// Fetches the leaflet texts for a registration.
    ///
    /// A leaflet with both sides empty is still a valid answer and is
    /// cached like any other, since re-asking the portal will not invent
    /// a text the agency never published.
    pub async fn get_leaflet(&self, registry_number: &str) -> Result<LeafletRecord, ServiceError> {
        let registry = validate_registry_number(registry_number)?;
        let key = cache_key("leaflet", registry);

        if let Some(cached) = self.cache.get::<LeafletRecord>(&key, CacheKind::Leaflet).await {
            debug!("serving leaflet {} from cache", registry);
            return Ok(cached);
        }

        info!("fetching leaflet {} from the portal", registry);
        let leaflet = self.client.get_leaflet(registry).await?;
        self.cache
            .put(&key, CacheKind::Leaflet, &leaflet, self.leaflet_ttl)
            .await;
        Ok(leaflet)
    }
}
