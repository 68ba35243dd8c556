//! Read path: cached aggregate lookups.

use crate::cache::StatsCache;
use crate::keyspace;
use crate::store::{CounterStore, StoreError};
use crate::types::Stats;
use std::sync::Arc;
use tracing::warn;

/// Serves `Stats` for a (domain, path) scope, shielding the store with a
/// freshness-windowed cache. This path never fails: any store error after
/// retries degrades to zeroed stats.
pub struct StatsReader {
    store: Arc<dyn CounterStore>,
    cache: StatsCache,
}

impl StatsReader {
    pub fn new(store: Arc<dyn CounterStore>, cache: StatsCache) -> Self {
        StatsReader { store, cache }
    }

    pub async fn read_stats(&self, domain: &str, path: &str) -> Stats {
        if let Some(hit) = self.cache.get(domain, path) {
            return hit;
        }
        match self.fetch(domain, path).await {
            Ok(stats) => {
                self.cache.insert(domain, path, stats.clone());
                stats
            }
            Err(e) => {
                warn!(domain, path, error = %e, "stats read degraded to zeros");
                Stats::zeroed()
            }
        }
    }

    async fn fetch(&self, domain: &str, path: &str) -> Result<Stats, StoreError> {
        let site_pv_key = keyspace::site_pv(domain);
        let page_pv_key = keyspace::page_pv(domain, path);
        let site_uv_key = keyspace::site_uv(domain);
        let (site_pv, page_pv, site_uv) = futures::join!(
            self.store.get(&site_pv_key),
            self.store.get(&page_pv_key),
            self.store.pf_count(&site_uv_key),
        );
        Ok(Stats {
            site_pv: site_pv?.unwrap_or_else(|| "0".to_string()),
            page_pv: page_pv?.unwrap_or_else(|| "0".to_string()),
            site_uv: site_uv?.to_string(),
        })
    }

    pub fn cache(&self) -> &StatsCache {
        &self.cache
    }
}
