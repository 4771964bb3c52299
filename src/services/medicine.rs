//! Medicine search and registry lookup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{validate_registry_number, validate_search_query};
use crate::cache::{cache_key, CacheKind, TtlCache};
use crate::error::ServiceError;
use crate::models::MedicineRecord;
use crate::scrapers::ScrapingClient;

/// Cache-first access to medicine registrations.
pub struct MedicineService {
    client: Arc<dyn ScrapingClient>,
    cache: TtlCache,
    search_ttl: Duration,
    medicine_ttl: Duration,
}

impl MedicineService {
    pub fn new(
        client: Arc<dyn ScrapingClient>,
        cache: TtlCache,
        search_ttl: Duration,
        medicine_ttl: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            search_ttl,
            medicine_ttl,
        }
    }

    /// Searches registrations by name.
    ///
    /// Results are cached under the canonical form of the query. An empty
    /// result list is valid but not cached, so a transient empty answer
    /// from the portal cannot shadow later matches for a whole TTL.
    pub async fn search_medicines(
        &self,
        query: &str,
    ) -> Result<Vec<MedicineRecord>, ServiceError> {
        let query = validate_search_query(query)?;
        let key = cache_key("search", query);

        if let Some(cached) = self
            .cache
            .get::<Vec<MedicineRecord>>(&key, CacheKind::Search)
            .await
        {
            debug!("serving search '{}' from cache", query);
            return Ok(cached);
        }

        info!("searching portal for '{}'", query);
        let records = self.client.search_medicines(query).await?;
        if records.is_empty() {
            info!("no medicines found for '{}'", query);
        } else {
            self.cache
                .put(&key, CacheKind::Search, &records, self.search_ttl)
                .await;
        }
        Ok(records)
    }

    /// Looks up a single registration by its exact registry number.
    ///
    /// The portal has no dedicated lookup endpoint, so this searches by the
    /// number and keeps only an exact `registry_number` match. Broader
    /// matches are discarded, never cached. An absent registration is a
    /// valid `None` outcome and is also not cached.
    pub async fn get_medicine_by_registry_number(
        &self,
        registry_number: &str,
    ) -> Result<Option<MedicineRecord>, ServiceError> {
        let registry = validate_registry_number(registry_number)?;
        let key = cache_key("medicine", registry);

        if let Some(cached) = self
            .cache
            .get::<MedicineRecord>(&key, CacheKind::Medicine)
            .await
        {
            debug!("serving registry {} from cache", registry);
            return Ok(Some(cached));
        }

        info!("looking up registry {} on the portal", registry);
        let records = self.client.search_medicines(registry).await?;
        let medicine = records
            .into_iter()
            .find(|record| record.registry_number == registry);

        match &medicine {
            Some(record) => {
                self.cache
                    .put(&key, CacheKind::Medicine, record, self.medicine_ttl)
                    .await;
            }
            None => info!("no registration matches registry {}", registry),
        }
        Ok(medicine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScrapingError, ScrapingErrorKind};
    use crate::models::LeafletRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(registry_number: &str, product_name: &str) -> MedicineRecord {
        MedicineRecord {
            registry_number: registry_number.to_string(),
            process_number: String::new(),
            product_name: product_name.to_string(),
            company: "EMS S/A".to_string(),
            cnpj: String::new(),
            active_ingredient: product_name.to_string(),
            therapeutic_class: String::new(),
            regulatory_type: String::new(),
            presentation: String::new(),
            leaflet_url: format!(
                "https://consultas.anvisa.gov.br#/medicamento/{}",
                registry_number
            ),
        }
    }

    struct StubClient {
        results: Vec<MedicineRecord>,
        fail_with: Option<ScrapingErrorKind>,
        search_calls: AtomicUsize,
    }

    impl StubClient {
        fn returning(results: Vec<MedicineRecord>) -> Self {
            Self {
                results,
                fail_with: None,
                search_calls: AtomicUsize::new(0),
            }
        }

        fn failing(kind: ScrapingErrorKind) -> Self {
            Self {
                results: Vec::new(),
                fail_with: Some(kind),
                search_calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.search_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScrapingClient for StubClient {
        async fn search_medicines(
            &self,
            _query: &str,
        ) -> Result<Vec<MedicineRecord>, ScrapingError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(kind) => Err(ScrapingError::new(kind, "stubbed failure")),
                None => Ok(self.results.clone()),
            }
        }

        async fn get_leaflet(&self, _registry_number: &str) -> Result<LeafletRecord, ScrapingError> {
            unimplemented!("not used by these tests")
        }
    }

    fn service(client: Arc<StubClient>) -> MedicineService {
        MedicineService::new(
            client,
            TtlCache::new(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn short_query_fails_before_any_upstream_call() {
        let client = Arc::new(StubClient::returning(vec![]));
        let service = service(client.clone());

        let err = service.search_medicines("ab").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn search_results_are_served_from_cache() {
        let client = Arc::new(StubClient::returning(vec![
            record("102350056", "DIPIRONA"),
            record("143810255", "DIPIRONA SODICA"),
        ]));
        let service = service(client.clone());

        let first = service.search_medicines("dipirona").await.unwrap();
        let second = service.search_medicines("dipirona").await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn equivalent_queries_share_a_cache_entry() {
        let client = Arc::new(StubClient::returning(vec![record("1", "DIPIRONA")]));
        let service = service(client.clone());

        service.search_medicines("Dipirona").await.unwrap();
        service.search_medicines("  dipirona ").await.unwrap();

        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn empty_search_results_are_not_cached() {
        let client = Arc::new(StubClient::returning(vec![]));
        let service = service(client.clone());

        assert!(service.search_medicines("inexistente").await.unwrap().is_empty());
        assert!(service.search_medicines("inexistente").await.unwrap().is_empty());
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn scraping_failures_keep_their_kind() {
        let client = Arc::new(StubClient::failing(ScrapingErrorKind::ServiceUnavailable));
        let service = service(client);

        let err = service.search_medicines("dipirona").await.unwrap_err();
        match err {
            ServiceError::Scraping(inner) => {
                assert_eq!(inner.kind(), ScrapingErrorKind::ServiceUnavailable)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn registry_lookup_requires_digits() {
        let client = Arc::new(StubClient::returning(vec![]));
        let service = service(client.clone());

        let err = service
            .get_medicine_by_registry_number("123abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn registry_lookup_keeps_only_the_exact_match() {
        let client = Arc::new(StubClient::returning(vec![
            record("1000000000", "PRODUTO A"),
            record("10000000001", "PRODUTO B"),
        ]));
        let service = service(client.clone());

        let found = service
            .get_medicine_by_registry_number("1000000000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.registry_number, "1000000000");
        assert_eq!(found.product_name, "PRODUTO A");
    }

    #[tokio::test]
    async fn exact_match_is_cached_for_the_next_lookup() {
        let client = Arc::new(StubClient::returning(vec![record("102350056", "DIPIRONA")]));
        let service = service(client.clone());

        service
            .get_medicine_by_registry_number("102350056")
            .await
            .unwrap();
        let again = service
            .get_medicine_by_registry_number("102350056")
            .await
            .unwrap();

        assert!(again.is_some());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn absent_registration_is_none_and_not_cached() {
        let client = Arc::new(StubClient::returning(vec![record("999", "OUTRO")]));
        let service = service(client.clone());

        assert!(service
            .get_medicine_by_registry_number("1000000000")
            .await
            .unwrap()
            .is_none());
        assert!(service
            .get_medicine_by_registry_number("1000000000")
            .await
            .unwrap()
            .is_none());
        assert_eq!(client.calls(), 2);
    }
}
