//! Per-credential usage record and the persisted pool snapshot

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Start of the fixed clock-hour bucket containing `t`
pub(crate) fn hour_bucket(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Top of the clock hour following `t`
pub(crate) fn next_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    hour_bucket(t) + Duration::hours(1)
}

/// Usage and throttling state of one credential
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct CredentialRecord {
    /// Requests made inside `window`
    #[serde(default)]
    pub(crate) usage: u32,
    /// Hour bucket the usage count belongs to
    pub(crate) window: DateTime<Utc>,
    #[serde(default)]
    pub(crate) last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) rate_limited: bool,
    #[serde(default)]
    pub(crate) rate_limit_expiry: Option<DateTime<Utc>>,
}

/// What [`CredentialRecord::refresh`] changed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Refresh {
    /// Usage count that was dropped because the hour rolled over
    pub(crate) usage_reset: Option<u32>,
    /// An expired rate limit was lifted
    pub(crate) limit_lifted: bool,
    /// Window stamp moved (even if usage was already zero)
    pub(crate) window_moved: bool,
}

impl Refresh {
    pub(crate) fn changed(&self) -> bool {
        self.window_moved || self.limit_lifted
    }
}

impl CredentialRecord {
    pub(crate) fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            usage: 0,
            window: hour_bucket(now),
            last_used: None,
            rate_limited: false,
            rate_limit_expiry: None,
        }
    }

    /// Lazily apply the hour rollover and lift an expired rate limit
    ///
    /// Idempotent: calling it twice with the same `now` changes nothing the
    /// second time.
    pub(crate) fn refresh(&mut self, now: DateTime<Utc>) -> Refresh {
        let mut refresh = Refresh::default();

        let bucket = hour_bucket(now);
        if self.window != bucket {
            if self.usage > 0 {
                refresh.usage_reset = Some(self.usage);
            }
            self.usage = 0;
            self.window = bucket;
            refresh.window_moved = true;
        }

        if self.rate_limited && !self.is_rate_limited_at(now) {
            self.rate_limited = false;
            self.rate_limit_expiry = None;
            refresh.limit_lifted = true;
        }

        refresh
    }

    /// Usage as it would read after a refresh at `now`
    pub(crate) fn effective_usage(&self, now: DateTime<Utc>) -> u32 {
        if self.window == hour_bucket(now) {
            self.usage
        } else {
            0
        }
    }

    /// Whether an upstream rate limit still applies at `now`
    pub(crate) fn is_rate_limited_at(&self, now: DateTime<Utc>) -> bool {
        self.rate_limited && self.rate_limit_expiry.is_some_and(|expiry| now < expiry)
    }

    pub(crate) fn is_selectable_at(&self, now: DateTime<Utc>, hourly_limit: u32) -> bool {
        !self.is_rate_limited_at(now) && self.effective_usage(now) < hourly_limit
    }

    /// When this credential becomes usable again, `None` if it is usable now
    pub(crate) fn available_again(&self, now: DateTime<Utc>, hourly_limit: u32) -> Option<DateTime<Utc>> {
        let limited_until = self
            .is_rate_limited_at(now)
            .then_some(self.rate_limit_expiry)
            .flatten();
        let quota_until = (self.effective_usage(now) >= hourly_limit).then(|| next_hour(now));

        match (limited_until, quota_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// On-disk pool state, keyed by token
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct PoolSnapshot {
    #[serde(default)]
    pub(crate) credentials: BTreeMap<String, CredentialRecord>,
    #[serde(default)]
    pub(crate) rotation_index: usize,
}
