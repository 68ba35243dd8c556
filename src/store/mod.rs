//! Counter store abstraction.
//!
//! Wraps the backing key-value/counter store behind an injectable trait so
//! the write path, the read path and the tests all talk to the same
//! surface. The production implementation (`RedisCounterStore`) adds
//! capped-retry execution; the in-process implementation
//! (`MemoryCounterStore`) backs the test suite.

mod health;
mod memory;
mod redis;
mod retry;

pub use health::HealthProbe;
pub use memory::MemoryCounterStore;
pub use retry::RetryPolicy;
pub use self::redis::RedisCounterStore;

use async_trait::async_trait;

/// Error returned when a store operation cannot complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connectivity or timeout failure that survived the retry budget.
    Unavailable { attempts: u32, last_error: String },
    /// The store answered with a reply of an unexpected shape.
    Unexpected(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable {
                attempts,
                last_error,
            } => write!(
                f,
                "Store unavailable after {} attempts: {}",
                attempts, last_error
            ),
            StoreError::Unexpected(msg) => write!(f, "Unexpected store reply: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// One operation of a pipelined batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Atomically increment an integer counter by one.
    Incr(String),
    /// Read an integer counter as its raw string form.
    Get(String),
    /// Add a member to a probabilistic (HLL) cardinality set.
    PfAdd(String, String),
    /// Estimate the cardinality of a probabilistic set.
    PfCount(String),
    /// Prepend a value to a list.
    LPush(String, String),
    /// Truncate a list to the inclusive index range.
    LTrim(String, i64, i64),
    /// Read the inclusive index range of a list, newest first.
    LRange(String, i64, i64),
    /// Add a member to an exact set.
    SAdd(String, String),
    /// List all members of an exact set.
    SMembers(String),
    /// Set a key's TTL in seconds.
    Expire(String, i64),
}

/// Reply to one pipelined operation, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreReply {
    Int(i64),
    Text(Option<String>),
    Items(Vec<String>),
    Done,
}

impl StoreReply {
    pub fn as_int(&self) -> i64 {
        match self {
            StoreReply::Int(n) => *n,
            _ => 0,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StoreReply::Text(Some(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_items(&self) -> &[String] {
        match self {
            StoreReply::Items(items) => items.as_slice(),
            _ => &[],
        }
    }
}

/// The store surface the engine is written against.
///
/// Every operation either completes or fails with `StoreError` once the
/// implementation's internal retry policy is exhausted. `pipeline` submits
/// the whole batch as one round trip; a connectivity failure fails the
/// batch as a unit, there is no partial-success reporting.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn pf_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn pf_count(&self, key: &str) -> Result<u64, StoreError>;
    async fn lpush(&self, key: &str, value: &str) -> Result<i64, StoreError>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;
    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, StoreError>;
    /// Remaining TTL of a key; `None` for keys without one (or missing).
    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError>;
    /// Lightweight liveness check.
    async fn ping(&self) -> Result<(), StoreError>;
    /// Execute a heterogeneous batch in one round trip, replies in
    /// submission order.
    async fn pipeline(&self, ops: &[StoreOp]) -> Result<Vec<StoreReply>, StoreError>;
    /// Unconditionally clear the entire store. Irreversible; the admin
    /// layer gates access to this.
    async fn flush_all(&self) -> Result<(), StoreError>;
}
