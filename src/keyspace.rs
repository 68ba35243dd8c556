//! Key derivation for every counter kind.
//!
//! This is the single source of truth for the wire-level naming contract;
//! any deployment sharing the store depends on these exact shapes:
//!
//! ```text
//! site:{domain}:pv                    total site page views
//! page:{domain}:{path}:pv             per-page page views
//! site:{domain}:uv                    total unique visitors (HLL)
//! stats:{domain}:{date}:pv            daily page views
//! stats:{domain}:{date}:uv            daily unique visitors (HLL)
//! stats:{domain}:{date}:{hour}:pv     hourly page views
//! stats:{domain}:{date}:{hour}:uv     hourly unique visitors (HLL)
//! logs:{domain}                       recent raw visit records (JSON list)
//! domains                             registry of observed domains (set)
//! ```
//!
//! Pure functions only; no state, no failure modes. The path is used
//! verbatim in `page:` keys, so two encodings of the same path are distinct
//! scopes.

use chrono::{DateTime, TimeZone, Utc};

/// Registry set holding every domain ever observed.
pub const DOMAINS_KEY: &str = "domains";

pub fn site_pv(domain: &str) -> String {
    format!("site:{}:pv", domain)
}

pub fn page_pv(domain: &str, path: &str) -> String {
    format!("page:{}:{}:pv", domain, path)
}

pub fn site_uv(domain: &str) -> String {
    format!("site:{}:uv", domain)
}

pub fn day_pv(domain: &str, date: &str) -> String {
    format!("stats:{}:{}:pv", domain, date)
}

pub fn day_uv(domain: &str, date: &str) -> String {
    format!("stats:{}:{}:uv", domain, date)
}

pub fn hour_pv(domain: &str, date: &str, hour: &str) -> String {
    format!("stats:{}:{}:{}:pv", domain, date, hour)
}

pub fn hour_uv(domain: &str, date: &str, hour: &str) -> String {
    format!("stats:{}:{}:{}:uv", domain, date, hour)
}

pub fn logs(domain: &str) -> String {
    format!("logs:{}", domain)
}

/// UTC calendar stamps for one event, derived once and reused for every
/// time-scoped key the event touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitStamp {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Two-digit zero-padded hour, `00`..`23`
    pub hour: String,
}

impl VisitStamp {
    pub fn from_millis(timestamp_ms: u64) -> Self {
        Self::from_datetime(datetime_from_millis(timestamp_ms))
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        VisitStamp {
            date: at.format("%Y-%m-%d").to_string(),
            hour: at.format("%H").to_string(),
        }
    }
}

/// Millisecond epoch timestamps outside chrono's representable range fall
/// back to the epoch itself rather than failing the visit.
pub fn datetime_from_millis(timestamp_ms: u64) -> DateTime<Utc> {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(site_pv("example.com"), "site:example.com:pv");
        assert_eq!(page_pv("example.com", "/blog"), "page:example.com:/blog:pv");
        assert_eq!(site_uv("example.com"), "site:example.com:uv");
        assert_eq!(day_pv("example.com", "2024-05-01"), "stats:example.com:2024-05-01:pv");
        assert_eq!(day_uv("example.com", "2024-05-01"), "stats:example.com:2024-05-01:uv");
        assert_eq!(
            hour_pv("example.com", "2024-05-01", "07"),
            "stats:example.com:2024-05-01:07:pv"
        );
        assert_eq!(
            hour_uv("example.com", "2024-05-01", "07"),
            "stats:example.com:2024-05-01:07:uv"
        );
        assert_eq!(logs("example.com"), "logs:example.com");
    }

    #[test]
    fn test_paths_are_taken_verbatim() {
        // Encoded and decoded forms of the same path are distinct scopes.
        assert_ne!(
            page_pv("example.com", "/a b"),
            page_pv("example.com", "/a%20b")
        );
    }

    #[test]
    fn test_stamp_is_utc_and_zero_padded() {
        // 2024-05-01T07:03:24.000Z
        let stamp = VisitStamp::from_millis(1_714_547_004_000);
        assert_eq!(stamp.date, "2024-05-01");
        assert_eq!(stamp.hour, "07");
    }

    #[test]
    fn test_out_of_range_timestamp_falls_back_to_epoch() {
        let stamp = VisitStamp::from_millis(u64::MAX);
        assert_eq!(stamp.date, "1970-01-01");
        assert_eq!(stamp.hour, "00");
    }
}
