//! In-process counter store for tests.
//!
//! Same surface as the Redis store, backed by plain maps behind one lock.
//! Exact sets stand in for the probabilistic ones, so cardinalities are
//! exact here — a strict subset of the estimator's contract. Outages are
//! injectable so degraded-path behavior can be exercised without a
//! network.

use super::{CounterStore, StoreError, StoreOp, StoreReply};
use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct MemoryInner {
    counters: AHashMap<String, i64>,
    sets: AHashMap<String, HashSet<String>>,
    lists: AHashMap<String, Vec<String>>,
    ttls: AHashMap<String, i64>,
}

#[derive(Default)]
pub struct MemoryCounterStore {
    inner: Mutex<MemoryInner>,
    unavailable: AtomicBool,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail as if the retry budget had
    /// been spent against an unreachable store.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable {
                attempts: 3,
                last_error: "injected outage".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn apply(inner: &mut MemoryInner, op: &StoreOp) -> StoreReply {
        match op {
            StoreOp::Incr(key) => {
                let counter = inner.counters.entry(key.clone()).or_insert(0);
                *counter += 1;
                StoreReply::Int(*counter)
            }
            StoreOp::Get(key) => {
                StoreReply::Text(inner.counters.get(key).map(|n| n.to_string()))
            }
            StoreOp::PfAdd(key, member) | StoreOp::SAdd(key, member) => {
                let added = inner
                    .sets
                    .entry(key.clone())
                    .or_default()
                    .insert(member.clone());
                StoreReply::Int(added as i64)
            }
            StoreOp::PfCount(key) => {
                StoreReply::Int(inner.sets.get(key).map_or(0, |s| s.len() as i64))
            }
            StoreOp::LPush(key, value) => {
                let list = inner.lists.entry(key.clone()).or_default();
                list.insert(0, value.clone());
                StoreReply::Int(list.len() as i64)
            }
            StoreOp::LTrim(key, start, stop) => {
                if let Some(list) = inner.lists.get_mut(key) {
                    *list = slice_range(list, *start, *stop);
                }
                StoreReply::Done
            }
            StoreOp::LRange(key, start, stop) => StoreReply::Items(
                inner
                    .lists
                    .get(key)
                    .map_or_else(Vec::new, |list| slice_range(list, *start, *stop)),
            ),
            StoreOp::SMembers(key) => {
                let mut members: Vec<String> = inner
                    .sets
                    .get(key)
                    .map_or_else(Vec::new, |s| s.iter().cloned().collect());
                members.sort();
                StoreReply::Items(members)
            }
            StoreOp::Expire(key, seconds) => {
                inner.ttls.insert(key.clone(), *seconds);
                StoreReply::Int(1)
            }
        }
    }
}

/// Inclusive index range with Redis semantics: negative indices count from
/// the end, out-of-range bounds clamp.
fn slice_range(list: &[String], start: i64, stop: i64) -> Vec<String> {
    let len = list.len() as i64;
    let resolve = |i: i64| if i < 0 { len + i } else { i };
    let start = resolve(start).max(0);
    let stop = resolve(stop).min(len - 1);
    if start > stop || len == 0 {
        return Vec::new();
    }
    list[start as usize..=stop as usize].to_vec()
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        Ok(Self::apply(&mut inner, &StoreOp::Incr(key.to_string())).as_int())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_up()?;
        let inner = self.inner.lock();
        Ok(inner.counters.get(key).map(|n| n.to_string()))
    }

    async fn pf_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        let reply = Self::apply(
            &mut inner,
            &StoreOp::PfAdd(key.to_string(), member.to_string()),
        );
        Ok(reply.as_int() == 1)
    }

    async fn pf_count(&self, key: &str) -> Result<u64, StoreError> {
        self.check_up()?;
        let inner = self.inner.lock();
        Ok(inner.sets.get(key).map_or(0, |s| s.len() as u64))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        Ok(Self::apply(
            &mut inner,
            &StoreOp::LPush(key.to_string(), value.to_string()),
        )
        .as_int())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        Self::apply(&mut inner, &StoreOp::LTrim(key.to_string(), start, stop));
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        self.check_up()?;
        let inner = self.inner.lock();
        Ok(inner
            .lists
            .get(key)
            .map_or_else(Vec::new, |list| slice_range(list, start, stop)))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        let reply = Self::apply(
            &mut inner,
            &StoreOp::SAdd(key.to_string(), member.to_string()),
        );
        Ok(reply.as_int() == 1)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        match Self::apply(&mut inner, &StoreOp::SMembers(key.to_string())) {
            StoreReply::Items(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        Self::apply(&mut inner, &StoreOp::Expire(key.to_string(), seconds));
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.check_up()?;
        let inner = self.inner.lock();
        Ok(inner.ttls.get(key).copied())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_up()
    }

    async fn pipeline(&self, ops: &[StoreOp]) -> Result<Vec<StoreReply>, StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        Ok(ops.iter().map(|op| Self::apply(&mut inner, op)).collect())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.check_up()?;
        let mut inner = self.inner.lock();
        *inner = MemoryInner::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_and_get() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.incr("k").await.unwrap(), 2);
        assert_eq!(store.get("k").await.unwrap(), Some("2".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_semantics() {
        let store = MemoryCounterStore::new();
        assert!(store.pf_add("uv", "a").await.unwrap());
        assert!(!store.pf_add("uv", "a").await.unwrap());
        assert!(store.pf_add("uv", "b").await.unwrap());
        assert_eq!(store.pf_count("uv").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_push_trim_range() {
        let store = MemoryCounterStore::new();
        for i in 0..10 {
            store.lpush("l", &i.to_string()).await.unwrap();
        }
        store.ltrim("l", 0, 4).await.unwrap();
        let kept = store.lrange("l", 0, -1).await.unwrap();
        assert_eq!(kept, vec!["9", "8", "7", "6", "5"]);
        assert_eq!(store.lrange("l", 0, 1).await.unwrap(), vec!["9", "8"]);
    }

    #[tokio::test]
    async fn test_pipeline_preserves_submission_order() {
        let store = MemoryCounterStore::new();
        let replies = store
            .pipeline(&[
                StoreOp::Incr("pv".to_string()),
                StoreOp::Incr("pv".to_string()),
                StoreOp::Get("pv".to_string()),
                StoreOp::SAdd("domains".to_string(), "example.com".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(
            replies,
            vec![
                StoreReply::Int(1),
                StoreReply::Int(2),
                StoreReply::Text(Some("2".to_string())),
                StoreReply::Int(1),
            ]
        );
    }

    #[tokio::test]
    async fn test_injected_outage_fails_everything() {
        let store = MemoryCounterStore::new();
        store.set_unavailable(true);
        assert!(store.incr("k").await.is_err());
        assert!(store.ping().await.is_err());
        assert!(store.pipeline(&[StoreOp::Incr("k".to_string())]).await.is_err());
        store.set_unavailable(false);
        assert_eq!(store.incr("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_flush_all_clears_state() {
        let store = MemoryCounterStore::new();
        store.incr("k").await.unwrap();
        store.sadd("domains", "example.com").await.unwrap();
        store.flush_all().await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.smembers("domains").await.unwrap().is_empty());
    }
}
