//! Core value types shared across the write and read paths.

use serde::{Deserialize, Serialize};

/// Fallback domain recorded when an event arrives without one.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Fallback path recorded when an event arrives without one.
pub const ROOT_PATH: &str = "/";

/// A single inbound visit, built once per request and never mutated.
///
/// The `visitor` field is an opaque client identifier; whether it is a raw
/// network address or a hashed/salted derivative is the caller's policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub domain: String,
    pub path: String,
    pub visitor: String,
    pub timestamp_ms: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl VisitEvent {
    /// Build an event, substituting sentinel values for a missing or empty
    /// domain/path instead of rejecting the visit.
    pub fn new(
        domain: Option<&str>,
        path: Option<&str>,
        visitor: &str,
        timestamp_ms: u64,
    ) -> Self {
        VisitEvent {
            domain: non_empty_or(domain, UNKNOWN_DOMAIN),
            path: non_empty_or(path, ROOT_PATH),
            visitor: visitor.to_string(),
            timestamp_ms,
            referer: None,
            user_agent: None,
        }
    }

    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    /// The canonical log record persisted for this visit. Only the fields
    /// the dashboard actually renders are kept.
    pub fn log_entry(&self) -> LogEntry {
        LogEntry {
            timestamp: self.timestamp_ms,
            visitor: self.visitor.clone(),
            path: self.path.clone(),
            referer: self.referer.clone(),
        }
    }
}

fn non_empty_or(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Aggregated counters for one (domain, path) scope.
///
/// Values are store-native numeric strings; the shape matches what the
/// widget endpoint serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "sitePV")]
    pub site_pv: String,
    #[serde(rename = "pagePV")]
    pub page_pv: String,
    #[serde(rename = "siteUV")]
    pub site_uv: String,
}

impl Stats {
    /// The degraded response served when the store is unreachable.
    pub fn zeroed() -> Self {
        Stats {
            site_pv: "0".to_string(),
            page_pv: "0".to_string(),
            site_uv: "0".to_string(),
        }
    }
}

/// One entry of a per-domain recent-visit log list, serialized as JSON at
/// write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: u64,
    pub visitor: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

impl LogEntry {
    /// Parse a raw list entry. Legacy or corrupted entries yield `None` and
    /// are skipped by callers rather than aborting the read.
    pub fn from_json(raw: &str) -> Option<LogEntry> {
        serde_json::from_str(raw).ok()
    }
}
