//! Retention policy for time-scoped keys.
//!
//! Retention is enforced by the store's own key expiration, set eagerly on
//! every write; there is no background sweeper here. Each write re-sets the
//! TTL, so active keys slide forward while idle keys lapse on schedule.
//! Site-scoped keys and the domain registry are never expired.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Days before day-scoped counters and UV sets expire.
    pub daily_expire_days: u64,
    /// Hours before hour-scoped counters and UV sets expire.
    pub hourly_expire_hours: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            daily_expire_days: 30,
            hourly_expire_hours: 48,
        }
    }
}

impl RetentionPolicy {
    /// TTL applied to `stats:{domain}:{date}:*` keys, in seconds.
    pub fn day_ttl_secs(&self) -> i64 {
        (self.daily_expire_days * 24 * 60 * 60) as i64
    }

    /// TTL applied to `stats:{domain}:{date}:{hour}:*` keys, in seconds.
    pub fn hour_ttl_secs(&self) -> i64 {
        (self.hourly_expire_hours * 60 * 60) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.day_ttl_secs(), 30 * 86_400);
        assert_eq!(policy.hour_ttl_secs(), 48 * 3_600);
    }
}
