//! Engine wiring.
//!
//! Builds the store, the reader, the writer and the admin surface from one
//! configuration value and owns nothing else — each component stays
//! independently constructible for tests and for embedders with their own
//! wiring.

use crate::admin::AdminReader;
use crate::aggregator::Aggregator;
use crate::cache::StatsCache;
use crate::config::StatsConfig;
use crate::reader::StatsReader;
use crate::store::{CounterStore, HealthProbe, RedisCounterStore, RetryPolicy, StoreError};
use crate::types::{Stats, VisitEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct StatsEngine {
    store: Arc<dyn CounterStore>,
    reader: Arc<StatsReader>,
    aggregator: Aggregator,
    admin: AdminReader,
    probe_interval: Duration,
}

impl StatsEngine {
    /// Connect to the configured store and assemble the engine.
    pub async fn connect(config: &StatsConfig) -> Result<Self, StoreError> {
        let retry = RetryPolicy::from_config(&config.retry);
        let store = RedisCounterStore::connect(&config.store_url, retry).await?;
        info!(url = %config.store_url, "connected to counter store");
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Assemble the engine around an already-built store. This is the seam
    /// the tests use with `MemoryCounterStore`.
    pub fn with_store(store: Arc<dyn CounterStore>, config: &StatsConfig) -> Self {
        let reader = Arc::new(StatsReader::new(
            store.clone(),
            StatsCache::from_config(&config.cache),
        ));
        let aggregator = Aggregator::new(
            store.clone(),
            reader.clone(),
            config.retention,
            config.log_max_len,
        );
        let admin = AdminReader::new(store.clone(), config.enable_wipe);
        StatsEngine {
            store,
            reader,
            aggregator,
            admin,
            probe_interval: config.health_probe_interval(),
        }
    }

    /// Start the background liveness probe. The returned handle can be
    /// aborted on shutdown; the probe never exits on its own.
    pub fn spawn_health_probe(&self) -> tokio::task::JoinHandle<()> {
        let probe = HealthProbe::new(self.store.clone(), self.probe_interval);
        tokio::spawn(probe.run())
    }

    /// Record a visit; returns the pre-increment snapshot and never fails.
    pub async fn record_visit(&self, event: &VisitEvent) -> Stats {
        self.aggregator.record_visit(event).await
    }

    /// Read aggregates for a scope; degraded to zeros on store failure.
    pub async fn read_stats(&self, domain: &str, path: &str) -> Stats {
        self.reader.read_stats(domain, path).await
    }

    pub fn admin(&self) -> &AdminReader {
        &self.admin
    }

    pub fn reader(&self) -> &StatsReader {
        &self.reader
    }
}
