//! In-memory TTL cache for portal responses.
//!
//! Entries are keyed by a canonical cache key plus the kind of payload they
//! hold, so a search result and a single registration can never shadow each
//! other. Values are stored as serialized JSON; an entry that no longer
//! deserializes into the shape the caller asks for is treated as a miss
//! instead of an error, which lets the data model evolve without a flag day.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use tokio::sync::RwLock;
use tracing::{debug, warn};

mod sweep;

pub use sweep::spawn_sweep_task;

/// What kind of payload a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Search,
    Medicine,
    Leaflet,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Medicine => "medicine",
            Self::Leaflet => "leaflet",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "search" => Some(Self::Search),
            "medicine" => Some(Self::Medicine),
            "leaflet" => Some(Self::Leaflet),
            _ => None,
        }
    }
}

/// A single cached response with its expiry bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub kind: CacheKind,
    value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Aggregate counts reported by the status command.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    /// Entries currently in the map, expired or not.
    pub entries: usize,
    /// Entries past their expiry that the sweeper has not removed yet.
    pub expired: usize,
}

/// Shared TTL cache. Cloning is cheap and clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct TtlCache {
    entries: Arc<RwLock<HashMap<(String, CacheKind), CacheEntry>>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a live entry and deserializes it into `T`.
    ///
    /// Expired entries are reported as misses but left in place for the
    /// sweeper. Deserialization failures are also misses; the stale entry
    /// will be overwritten by the next successful fetch.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, kind: CacheKind) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(&(key.to_owned(), kind))?;
        if entry.is_expired() {
            debug!("cache entry {} ({}) is expired", key, kind.as_str());
            return None;
        }
        match serde_json::from_str(&entry.value) {
            Ok(value) => {
                debug!("cache hit for {} ({})", key, kind.as_str());
                Some(value)
            }
            Err(err) => {
                warn!(
                    "cache entry {} ({}) no longer deserializes, treating as miss: {}",
                    key,
                    kind.as_str(),
                    err
                );
                None
            }
        }
    }

    /// Stores a value under `(key, kind)`, overwriting any previous entry.
    ///
    /// An overwrite refreshes the value and expiry but keeps the original
    /// `created_at`. Serialization failures are logged and the value is
    /// simply not cached; callers never fail because of the cache.
    pub async fn put<T: Serialize>(&self, key: &str, kind: CacheKind, value: &T, ttl: Duration) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!("not caching {} ({}): {}", key, kind.as_str(), err);
                return;
            }
        };
        let now = Utc::now();
        let expires_at = now + ttl;
        let mut entries = self.entries.write().await;
        match entries.entry((key.to_owned(), kind)) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.value = serialized;
                entry.expires_at = expires_at;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    key: key.to_owned(),
                    kind,
                    value: serialized,
                    created_at: now,
                    expires_at,
                });
            }
        }
        debug!("cached {} ({}) until {}", key, kind.as_str(), expires_at);
    }

    /// Removes one entry. Returns whether it existed.
    pub async fn invalidate(&self, key: &str, kind: CacheKind) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(&(key.to_owned(), kind)).is_some()
    }

    /// Entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes entries whose expiry has passed and returns how many were
    /// dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at >= now);
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.entries.read().await;
        let expired = entries
            .values()
            .filter(|entry| entry.expires_at <= now)
            .count();
        CacheStats {
            entries: entries.len(),
            expired,
        }
    }

    #[cfg(test)]
    async fn entry_snapshot(&self, key: &str, kind: CacheKind) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        entries.get(&(key.to_owned(), kind)).cloned()
    }
}

impl Serialize for CacheKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Derives the canonical cache key for a lookup value.
///
/// Lowercases the value and collapses whitespace runs into underscores, so
/// "Dipirona  Monoidratada" and "dipirona monoidratada" share an entry.
pub fn cache_key(prefix: &str, value: &str) -> String {
    let lowered = value.to_lowercase();
    let canonical = lowered.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{}_{}", prefix, canonical)
}
