//! Write path: pipelined visit recording.

use crate::keyspace::{self, VisitStamp, DOMAINS_KEY};
use crate::reader::StatsReader;
use crate::retention::RetentionPolicy;
use crate::store::{CounterStore, StoreOp};
use crate::types::{Stats, VisitEvent};
use std::sync::Arc;
use tracing::warn;

/// Records visits against the store as one pipelined batch per event.
///
/// Recording is best-effort, at-most-once: a batch that still fails after
/// the store's retry budget is logged and dropped rather than blocking or
/// failing the caller. The returned `Stats` are captured before this
/// event's own writes land, so the caller sees the pre-increment snapshot.
pub struct Aggregator {
    store: Arc<dyn CounterStore>,
    reader: Arc<StatsReader>,
    retention: RetentionPolicy,
    log_max_len: i64,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn CounterStore>,
        reader: Arc<StatsReader>,
        retention: RetentionPolicy,
        log_max_len: i64,
    ) -> Self {
        Aggregator {
            store,
            reader,
            retention,
            log_max_len: log_max_len.max(1),
        }
    }

    pub async fn record_visit(&self, event: &VisitEvent) -> Stats {
        let snapshot = self
            .reader
            .read_stats(&event.domain, &event.path)
            .await;

        let stamp = VisitStamp::from_millis(event.timestamp_ms);
        let ops = self.build_write_batch(event, &stamp);
        if let Err(e) = self.store.pipeline(&ops).await {
            warn!(domain = %event.domain, path = %event.path, error = %e, "visit write batch dropped");
            return snapshot;
        }

        // Site-scoped keys never expire; only the four time-scoped keys
        // written above get their TTL (re)set.
        let expirations = self.build_expire_batch(&event.domain, &stamp);
        if let Err(e) = self.store.pipeline(&expirations).await {
            warn!(domain = %event.domain, error = %e, "retention batch dropped");
        }

        snapshot
    }

    fn build_write_batch(&self, event: &VisitEvent, stamp: &VisitStamp) -> Vec<StoreOp> {
        let domain = &event.domain;
        let mut ops = vec![
            StoreOp::Incr(keyspace::site_pv(domain)),
            StoreOp::Incr(keyspace::page_pv(domain, &event.path)),
            StoreOp::Incr(keyspace::day_pv(domain, &stamp.date)),
            StoreOp::Incr(keyspace::hour_pv(domain, &stamp.date, &stamp.hour)),
            StoreOp::PfAdd(keyspace::site_uv(domain), event.visitor.clone()),
            StoreOp::PfAdd(keyspace::day_uv(domain, &stamp.date), event.visitor.clone()),
            StoreOp::PfAdd(
                keyspace::hour_uv(domain, &stamp.date, &stamp.hour),
                event.visitor.clone(),
            ),
        ];
        match serde_json::to_string(&event.log_entry()) {
            Ok(json) => {
                ops.push(StoreOp::LPush(keyspace::logs(domain), json));
                ops.push(StoreOp::LTrim(keyspace::logs(domain), 0, self.log_max_len - 1));
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "log entry not serialized, skipping log push");
            }
        }
        ops.push(StoreOp::SAdd(DOMAINS_KEY.to_string(), domain.clone()));
        ops
    }

    fn build_expire_batch(&self, domain: &str, stamp: &VisitStamp) -> Vec<StoreOp> {
        let day_ttl = self.retention.day_ttl_secs();
        let hour_ttl = self.retention.hour_ttl_secs();
        vec![
            StoreOp::Expire(keyspace::day_pv(domain, &stamp.date), day_ttl),
            StoreOp::Expire(keyspace::day_uv(domain, &stamp.date), day_ttl),
            StoreOp::Expire(keyspace::hour_pv(domain, &stamp.date, &stamp.hour), hour_ttl),
            StoreOp::Expire(keyspace::hour_uv(domain, &stamp.date, &stamp.hour), hour_ttl),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StatsCache;
    use crate::store::MemoryCounterStore;
    use std::time::Duration;

    // 2024-05-01T07:03:24.000Z
    const TS: u64 = 1_714_547_004_000;

    fn aggregator_with(store: Arc<MemoryCounterStore>) -> Aggregator {
        // Zero-freshness cache so each snapshot reflects the store
        let reader = Arc::new(StatsReader::new(
            store.clone(),
            StatsCache::new(Duration::ZERO, 4, 4),
        ));
        Aggregator::new(store, reader, RetentionPolicy::default(), 1_000)
    }

    #[tokio::test]
    async fn test_one_visit_touches_every_scope() {
        let store = Arc::new(MemoryCounterStore::new());
        let agg = aggregator_with(store.clone());
        let event = VisitEvent::new(Some("example.com"), Some("/blog"), "a", TS);
        agg.record_visit(&event).await;

        for key in [
            "site:example.com:pv",
            "page:example.com:/blog:pv",
            "stats:example.com:2024-05-01:pv",
            "stats:example.com:2024-05-01:07:pv",
        ] {
            assert_eq!(store.get(key).await.unwrap().as_deref(), Some("1"), "{}", key);
        }
        assert_eq!(store.pf_count("site:example.com:uv").await.unwrap(), 1);
        assert_eq!(
            store.pf_count("stats:example.com:2024-05-01:uv").await.unwrap(),
            1
        );
        assert_eq!(
            store
                .pf_count("stats:example.com:2024-05-01:07:uv")
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store.smembers("domains").await.unwrap(),
            vec!["example.com".to_string()]
        );
        assert_eq!(store.lrange("logs:example.com", 0, -1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_pre_increment() {
        let store = Arc::new(MemoryCounterStore::new());
        let agg = aggregator_with(store);
        let event = VisitEvent::new(Some("example.com"), Some("/"), "a", TS);

        let first = agg.record_visit(&event).await;
        assert_eq!(first.site_pv, "0");
        let second = agg.record_visit(&event).await;
        assert_eq!(second.site_pv, "1");
    }

    #[tokio::test]
    async fn test_time_scoped_keys_get_ttls() {
        let store = Arc::new(MemoryCounterStore::new());
        let agg = aggregator_with(store.clone());
        agg.record_visit(&VisitEvent::new(Some("example.com"), None, "a", TS))
            .await;

        let day_ttl = store.ttl("stats:example.com:2024-05-01:pv").await.unwrap();
        assert_eq!(day_ttl, Some(30 * 86_400));
        let hour_ttl = store.ttl("stats:example.com:2024-05-01:07:uv").await.unwrap();
        assert_eq!(hour_ttl, Some(48 * 3_600));
        assert_eq!(store.ttl("site:example.com:pv").await.unwrap(), None);
        assert_eq!(store.ttl("site:example.com:uv").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_outage_returns_zeroed_snapshot() {
        let store = Arc::new(MemoryCounterStore::new());
        store.set_unavailable(true);
        let agg = aggregator_with(store.clone());

        let stats = agg
            .record_visit(&VisitEvent::new(Some("example.com"), None, "a", TS))
            .await;
        assert_eq!(stats, Stats::zeroed());

        // and nothing was written once the store comes back
        store.set_unavailable(false);
        assert_eq!(store.get("site:example.com:pv").await.unwrap(), None);
    }
}
