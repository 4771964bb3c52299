//! Background removal of expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::TtlCache;

/// Spawns the periodic sweep loop.
///
/// The task runs until aborted. The first sweep happens one full interval
/// after startup, since a fresh process has nothing to remove. Reads served
/// in between already treat expired entries as misses, so the sweep only
/// reclaims memory.
pub fn spawn_sweep_task(cache: TtlCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("cache sweep scheduled every {:?}", interval);
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.sweep_expired().await;
            if removed > 0 {
                info!("cache sweep removed {} expired entries", removed);
            } else {
                debug!("cache sweep found nothing to remove");
            }
        }
    })
}
