//! Visit-analytics aggregation core.
//!
//! Records page-view and approximate unique-visitor events per domain and
//! path at site/day/hour granularity against a Redis-compatible counter
//! store, and serves aggregated counts back with bounded latency despite
//! store slowness or transient failure. The two entry points are
//! [`StatsEngine::record_visit`] and [`StatsEngine::read_stats`]; HTTP
//! routing, authentication and rate limiting live with the embedder.

pub mod admin;
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod engine;
pub mod keyspace;
pub mod reader;
pub mod retention;
pub mod store;
pub mod telemetry;
pub mod types;

pub use admin::{AdminError, AdminReader, ChartData, DomainStats, ExportDump};
pub use aggregator::Aggregator;
pub use cache::StatsCache;
pub use config::{CacheConfig, ConfigError, RetryConfig, StatsConfig};
pub use engine::StatsEngine;
pub use reader::StatsReader;
pub use retention::RetentionPolicy;
pub use store::{
    CounterStore, HealthProbe, MemoryCounterStore, RedisCounterStore, RetryPolicy, StoreError,
    StoreOp, StoreReply,
};
pub use types::{LogEntry, Stats, VisitEvent};
