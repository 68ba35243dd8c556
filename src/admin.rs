//! Operator dashboard reads and administrative operations.
//!
//! Unlike the widget paths, these surface store errors to the caller —
//! a dashboard can retry; an embedded counter badge cannot.

use crate::keyspace::{self, VisitStamp, DOMAINS_KEY};
use crate::store::{CounterStore, StoreError, StoreOp, StoreReply};
use crate::types::LogEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// How many log entries a dashboard stats query returns.
const RECENT_LOG_COUNT: i64 = 50;

#[derive(Debug)]
pub enum AdminError {
    /// The full-store wipe is not enabled in this deployment.
    WipeDisabled,
    Store(StoreError),
}

impl std::fmt::Display for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminError::WipeDisabled => write!(f, "Store wipe is disabled in this deployment"),
            AdminError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        AdminError::Store(e)
    }
}

/// Per-domain dashboard summary: lifetime totals, today's slice and the
/// newest log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStats {
    #[serde(rename = "sitePV")]
    pub site_pv: String,
    #[serde(rename = "siteUV")]
    pub site_uv: i64,
    #[serde(rename = "todayPV")]
    pub today_pv: String,
    #[serde(rename = "todayUV")]
    pub today_uv: i64,
    #[serde(rename = "recentLogs")]
    pub recent_logs: Vec<LogEntry>,
}

/// Daily PV/UV series for the trailing window, oldest day first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartData {
    pub dates: Vec<String>,
    #[serde(rename = "pvData")]
    pub pv: Vec<i64>,
    #[serde(rename = "uvData")]
    pub uv: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainExport {
    pub pv: String,
    pub uv: i64,
    pub logs: Vec<LogEntry>,
}

/// Full-store dump for operator backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDump {
    pub timestamp: String,
    pub domains: Vec<String>,
    pub stats: BTreeMap<String, DomainExport>,
}

pub struct AdminReader {
    store: Arc<dyn CounterStore>,
    wipe_enabled: bool,
}

impl AdminReader {
    pub fn new(store: Arc<dyn CounterStore>, wipe_enabled: bool) -> Self {
        AdminReader {
            store,
            wipe_enabled,
        }
    }

    /// Sorted registry of every domain ever observed. An empty registry
    /// reports `localhost` so a fresh dashboard has something to select.
    pub async fn domains(&self) -> Result<Vec<String>, AdminError> {
        let mut domains = self.store.smembers(DOMAINS_KEY).await?;
        if domains.is_empty() {
            domains.push("localhost".to_string());
        }
        domains.sort();
        Ok(domains)
    }

    pub async fn domain_stats(&self, domain: &str) -> Result<DomainStats, AdminError> {
        self.domain_stats_at(domain, now_millis()).await
    }

    /// One pipelined round trip for the whole dashboard card. Log entries
    /// that fail to parse are skipped individually.
    pub async fn domain_stats_at(
        &self,
        domain: &str,
        now_ms: u64,
    ) -> Result<DomainStats, AdminError> {
        let stamp = VisitStamp::from_millis(now_ms);
        let replies = self
            .store
            .pipeline(&[
                StoreOp::Get(keyspace::site_pv(domain)),
                StoreOp::PfCount(keyspace::site_uv(domain)),
                StoreOp::Get(keyspace::day_pv(domain, &stamp.date)),
                StoreOp::PfCount(keyspace::day_uv(domain, &stamp.date)),
                StoreOp::LRange(keyspace::logs(domain), 0, RECENT_LOG_COUNT - 1),
            ])
            .await?;
        Ok(DomainStats {
            site_pv: text_or_zero(&replies[0]),
            site_uv: replies[1].as_int(),
            today_pv: text_or_zero(&replies[2]),
            today_uv: replies[3].as_int(),
            recent_logs: parse_logs(replies[4].as_items()),
        })
    }

    pub async fn chart_data(&self, domain: &str, days: u32) -> Result<ChartData, AdminError> {
        self.chart_data_at(domain, days, now_millis()).await
    }

    /// Daily PV/UV for the trailing `days` window. A zero PV for today is
    /// replaced by the lifetime totals so a freshly-registered domain does
    /// not chart as dead.
    pub async fn chart_data_at(
        &self,
        domain: &str,
        days: u32,
        now_ms: u64,
    ) -> Result<ChartData, AdminError> {
        let today = keyspace::datetime_from_millis(now_ms);
        let mut dates = Vec::with_capacity(days as usize);
        let mut ops = Vec::with_capacity(days as usize * 2);
        for back in (0..days).rev() {
            let stamp = VisitStamp::from_datetime(today - chrono::Duration::days(back as i64));
            ops.push(StoreOp::Get(keyspace::day_pv(domain, &stamp.date)));
            ops.push(StoreOp::PfCount(keyspace::day_uv(domain, &stamp.date)));
            dates.push(stamp.date);
        }
        let replies = self.store.pipeline(&ops).await?;

        let mut pv = Vec::with_capacity(days as usize);
        let mut uv = Vec::with_capacity(days as usize);
        for pair in replies.chunks(2) {
            pv.push(parse_count(&pair[0]));
            uv.push(pair[1].as_int());
        }

        if let (Some(today_pv), Some(today_uv)) = (pv.last_mut(), uv.last_mut()) {
            if *today_pv == 0 {
                let totals = self
                    .store
                    .pipeline(&[
                        StoreOp::Get(keyspace::site_pv(domain)),
                        StoreOp::PfCount(keyspace::site_uv(domain)),
                    ])
                    .await?;
                let site_pv = parse_count(&totals[0]);
                if site_pv > 0 {
                    *today_pv = site_pv;
                }
                let site_uv = totals[1].as_int();
                if site_uv > 0 {
                    *today_uv = site_uv;
                }
            }
        }

        Ok(ChartData { dates, pv, uv })
    }

    pub async fn export(&self) -> Result<ExportDump, AdminError> {
        self.export_at(now_millis()).await
    }

    pub async fn export_at(&self, now_ms: u64) -> Result<ExportDump, AdminError> {
        let domains = self.store.smembers(DOMAINS_KEY).await?;
        let mut stats = BTreeMap::new();
        for domain in &domains {
            let replies = self
                .store
                .pipeline(&[
                    StoreOp::Get(keyspace::site_pv(domain)),
                    StoreOp::PfCount(keyspace::site_uv(domain)),
                    StoreOp::LRange(keyspace::logs(domain), 0, -1),
                ])
                .await?;
            stats.insert(
                domain.clone(),
                DomainExport {
                    pv: text_or_zero(&replies[0]),
                    uv: replies[1].as_int(),
                    logs: parse_logs(replies[2].as_items()),
                },
            );
        }
        debug!(domains = domains.len(), "exported store contents");
        Ok(ExportDump {
            timestamp: keyspace::datetime_from_millis(now_ms).to_rfc3339(),
            domains,
            stats,
        })
    }

    /// Clear the entire store. Irreversible; refused unless the deployment
    /// opted in via configuration.
    pub async fn wipe(&self) -> Result<(), AdminError> {
        if !self.wipe_enabled {
            return Err(AdminError::WipeDisabled);
        }
        self.store.flush_all().await?;
        info!("store wiped");
        Ok(())
    }
}

fn text_or_zero(reply: &StoreReply) -> String {
    reply.as_text().unwrap_or("0").to_string()
}

fn parse_count(reply: &StoreReply) -> i64 {
    reply.as_text().and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn parse_logs(raw: &[String]) -> Vec<LogEntry> {
    let mut entries = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;
    for item in raw {
        match LogEntry::from_json(item) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped unparseable log entries");
    }
    entries
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
