//! Short-lived in-memory cache for read-path snapshots.
//!
//! Absorbs repeated reads of the same (domain, path) scope within a small
//! freshness window so bursty widget traffic does not hammer the store.
//! The cache holds no authority: entries past the window are never served,
//! and the store remains the source of truth. Shared per process only;
//! horizontally-scaled instances each keep an independent view bounded by
//! the same window.

use crate::config::CacheConfig;
use crate::types::Stats;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry {
    stats: Stats,
    captured_at: Instant,
}

pub struct StatsCache {
    entries: RwLock<AHashMap<(String, String), CacheEntry>>,
    freshness: Duration,
    capacity: usize,
    sweep_threshold: usize,
}

impl StatsCache {
    pub fn new(freshness: Duration, capacity: usize, sweep_threshold: usize) -> Self {
        StatsCache {
            entries: RwLock::new(AHashMap::new()),
            freshness,
            capacity: capacity.max(1),
            sweep_threshold: sweep_threshold.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.freshness(), config.capacity, config.sweep_threshold)
    }

    /// A snapshot younger than the freshness window, if any. Stale entries
    /// are dropped on the way out.
    pub fn get(&self, domain: &str, path: &str) -> Option<Stats> {
        let key = (domain.to_string(), path.to_string());
        {
            let entries = self.entries.read();
            match entries.get(&key) {
                Some(entry) if entry.captured_at.elapsed() <= self.freshness => {
                    return Some(entry.stats.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but is stale; remove it under the write lock,
        // re-checking age in case a concurrent insert refreshed it.
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&key) {
            if entry.captured_at.elapsed() <= self.freshness {
                return Some(entry.stats.clone());
            }
            entries.remove(&key);
        }
        None
    }

    pub fn insert(&self, domain: &str, path: &str, stats: Stats) {
        let mut entries = self.entries.write();
        if entries.len() >= self.sweep_threshold {
            let before = entries.len();
            let freshness = self.freshness;
            entries.retain(|_, entry| entry.captured_at.elapsed() <= freshness);
            let swept = before - entries.len();
            if swept > 0 {
                debug!(swept, remaining = entries.len(), "swept stale cache entries");
            }
        }
        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.captured_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
        entries.insert(
            (domain.to_string(), path.to_string()),
            CacheEntry {
                stats,
                captured_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(n: u64) -> Stats {
        Stats {
            site_pv: n.to_string(),
            page_pv: n.to_string(),
            site_uv: n.to_string(),
        }
    }

    #[test]
    fn test_hit_within_window() {
        let cache = StatsCache::new(Duration::from_secs(60), 16, 16);
        cache.insert("example.com", "/", stats(1));
        assert_eq!(cache.get("example.com", "/"), Some(stats(1)));
        assert_eq!(cache.get("example.com", "/other"), None);
    }

    #[test]
    fn test_stale_entry_is_never_served() {
        let cache = StatsCache::new(Duration::from_millis(10), 16, 16);
        cache.insert("example.com", "/", stats(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("example.com", "/"), None);
        // and the stale entry was dropped, not just hidden
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let cache = StatsCache::new(Duration::from_secs(60), 2, 100);
        cache.insert("a", "/", stats(1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", "/", stats(2));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c", "/", stats(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a", "/"), None);
        assert_eq!(cache.get("b", "/"), Some(stats(2)));
        assert_eq!(cache.get("c", "/"), Some(stats(3)));
    }

    #[test]
    fn test_insert_sweeps_past_threshold() {
        let cache = StatsCache::new(Duration::from_millis(5), 100, 3);
        cache.insert("a", "/", stats(1));
        cache.insert("b", "/", stats(2));
        cache.insert("c", "/", stats(3));
        std::thread::sleep(Duration::from_millis(10));
        cache.insert("d", "/", stats(4));
        // the three stale entries were swept by the insert
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("d", "/"), Some(stats(4)));
    }
}
