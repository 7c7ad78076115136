//! Credential pool: multi-token rotation under per-token hourly quotas
//!
//! The pool owns N opaque access tokens and decides which one may be used
//! right now. It tracks, per token:
//! - usage inside the current fixed clock hour
//! - an upstream rate-limit flag with its expiry
//! - the last time the token was used
//!
//! ## Lazy reset
//!
//! There is no background timer. Every query first brings each record up to
//! date: a record whose stored hour bucket differs from the current one has
//! its usage zeroed, and an expired rate limit is lifted. The check is
//! idempotent and O(N), so the pool needs no task of its own.
//!
//! ## Concurrency
//!
//! All operations run under one mutex per pool, so "has headroom, then
//! increment" is atomic: use [`CredentialPool::acquire`] when a request is
//! about to be made. Every mutation is persisted to the snapshot file while
//! the lock is held, which keeps snapshots ordered. The save is a blocking
//! `std::fs` write plus fsync on the caller's thread, so every `acquire`
//! costs one small file write. A failed save is logged and the pool keeps
//! working from memory.

mod clock;
mod record;


pub use clock::{Clock, ManualClock, SystemClock};

use crate::config::{CredentialConfig, load_tokens};
use crate::error::Result;
use crate::utils::{mask_token, read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use record::{CredentialRecord, PoolSnapshot, next_hour};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, error, info, warn};

/// Handle to one opaque access token
///
/// Cheap to clone. `Debug` and `Display` never print the full token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::from(token.into()))
    }

    /// The raw token, for building the `Authorization` header
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Masked form for logs
    pub fn masked(&self) -> String {
        mask_token(&self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Point-in-time view of one credential, for status displays
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CredentialStatus {
    /// Masked token
    pub key_preview: String,
    /// Requests made in the current hour
    pub usage: u32,
    /// Requests allowed per hour
    pub hourly_limit: u32,
    /// Whether an upstream rate limit currently applies
    pub rate_limited: bool,
    /// Last time the credential was used
    pub last_used: Option<DateTime<Utc>>,
    /// When the credential becomes usable again (`None` = now)
    pub available_again: Option<DateTime<Utc>>,
}

struct Slot {
    credential: Credential,
    record: CredentialRecord,
}

struct PoolInner {
    slots: Vec<Slot>,
    rotation_index: usize,
}

/// Thread-safe pool of rotating, quota-tracked credentials
pub struct CredentialPool {
    inner: Mutex<PoolInner>,
    hourly_limit: u32,
    cooldown: chrono::Duration,
    state_file: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.len())
            .field("hourly_limit", &self.hourly_limit)
            .field("state_file", &self.state_file)
            .finish()
    }
}

impl CredentialPool {
    /// Build a pool from explicit tokens using the wall clock
    ///
    /// Placeholder-looking tokens and duplicates are dropped with a warning.
    /// Saved state for tokens present in `config.state_file` is restored.
    pub fn new<I, S>(tokens: I, config: &CredentialConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_clock(tokens, config, Arc::new(SystemClock))
    }

    /// [`CredentialPool::new`] with an explicit time source
    pub fn with_clock<I, S>(tokens: I, config: &CredentialConfig, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = clock.now();
        let credentials = accept_tokens(tokens);

        let mut snapshot = match read_json::<PoolSnapshot>(&config.state_file) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => PoolSnapshot::default(),
            Err(e) => {
                warn!(
                    path = %config.state_file.display(),
                    error = %e,
                    "could not read credential state, starting fresh"
                );
                PoolSnapshot::default()
            }
        };

        let slots: Vec<Slot> = credentials
            .into_iter()
            .map(|credential| {
                let record = snapshot
                    .credentials
                    .remove(credential.token())
                    .unwrap_or_else(|| CredentialRecord::fresh(now));
                Slot { credential, record }
            })
            .collect();

        let rotation_index = if snapshot.rotation_index < slots.len() {
            snapshot.rotation_index
        } else {
            0
        };

        if slots.is_empty() {
            warn!("credential pool is empty; requests will not be possible until tokens are added");
        } else {
            info!(count = slots.len(), hourly_limit = config.hourly_limit, "credential pool ready");
        }

        Self {
            inner: Mutex::new(PoolInner {
                slots,
                rotation_index,
            }),
            hourly_limit: config.hourly_limit,
            cooldown: chrono::Duration::from_std(config.rate_limit_cooldown)
                .unwrap_or_else(|_| chrono::Duration::hours(1)),
            state_file: config.state_file.clone(),
            clock,
        }
    }

    /// Build a pool from the token sources named in `config`
    ///
    /// Missing tokens are not an error here: the pool starts empty and every
    /// query reports nothing available until [`reload`](Self::reload) is called.
    pub fn from_config(config: &CredentialConfig) -> Self {
        let tokens = load_tokens(config).unwrap_or_else(|e| {
            warn!(error = %e, "no access tokens loaded");
            Vec::new()
        });
        Self::new(tokens, config)
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of credentials in the pool
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Whether the pool holds no credentials
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests allowed per credential per hour
    pub fn hourly_limit(&self) -> u32 {
        self.hourly_limit
    }

    /// Pick the next usable credential without consuming quota
    ///
    /// Scans from the rotation pointer with wrap-around and advances the
    /// pointer past the chosen credential. `None` means every credential is
    /// at its hourly limit or rate limited, which is an expected outcome.
    pub fn select_available(&self) -> Option<Credential> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let (selected, changed) = self.select_locked(&mut inner, now);
        if selected.is_some() || changed {
            self.persist(&inner);
        }
        selected.map(|idx| inner.slots[idx].credential.clone())
    }

    /// Select a credential and record one use of it, atomically
    ///
    /// This is the call to make right before an authorized request: two
    /// concurrent callers can never both take the last unit of headroom.
    pub fn acquire(&self) -> Option<Credential> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let (selected, changed) = self.select_locked(&mut inner, now);
        let Some(idx) = selected else {
            if changed {
                self.persist(&inner);
            }
            return None;
        };

        let slot = &mut inner.slots[idx];
        slot.record.usage += 1;
        slot.record.last_used = Some(now);
        debug!(
            key = %slot.credential,
            usage = slot.record.usage,
            limit = self.hourly_limit,
            "credential acquired"
        );
        let credential = slot.credential.clone();
        self.persist(&inner);
        Some(credential)
    }

    /// Count one request against `credential`
    ///
    /// No-op for credentials the pool does not know (e.g. removed by a reload).
    pub fn record_usage(&self, credential: &Credential) {
        let now = self.clock.now();
        let mut inner = self.lock();
        let Some(slot) = inner.slots.iter_mut().find(|s| s.credential == *credential) else {
            debug!(key = %credential, "usage recorded for unknown credential, ignoring");
            return;
        };

        slot.record.refresh(now);
        slot.record.usage += 1;
        slot.record.last_used = Some(now);
        debug!(key = %credential, usage = slot.record.usage, limit = self.hourly_limit, "credential usage");
        self.persist(&inner);
    }

    /// Bench `credential` for the cooldown period after an upstream 403
    pub fn mark_rate_limited(&self, credential: &Credential) {
        let now = self.clock.now();
        let mut inner = self.lock();
        let Some(slot) = inner.slots.iter_mut().find(|s| s.credential == *credential) else {
            debug!(key = %credential, "rate limit reported for unknown credential, ignoring");
            return;
        };

        let expiry = now + self.cooldown;
        slot.record.rate_limited = true;
        slot.record.rate_limit_expiry = Some(expiry);
        warn!(key = %credential, retry_after = %expiry, "credential rate limited");
        self.persist(&inner);
    }

    /// Whether [`select_available`](Self::select_available) would return a credential
    ///
    /// Read-only: neither the rotation pointer nor any record changes.
    pub fn has_available(&self) -> bool {
        let now = self.clock.now();
        self.lock()
            .slots
            .iter()
            .any(|s| s.record.is_selectable_at(now, self.hourly_limit))
    }

    /// Number of credentials usable right now
    pub fn available_count(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .slots
            .iter()
            .filter(|s| s.record.is_selectable_at(now, self.hourly_limit))
            .count()
    }

    /// Earliest moment something in the pool frees up
    ///
    /// The minimum over all pending rate-limit expiries and, if any credential
    /// is at its hourly limit, the top of the next clock hour. `None` when
    /// nothing is pending.
    pub fn next_reset_time(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let inner = self.lock();

        let expiries = inner
            .slots
            .iter()
            .filter(|s| s.record.is_rate_limited_at(now))
            .filter_map(|s| s.record.rate_limit_expiry);

        let quota_reset = inner
            .slots
            .iter()
            .any(|s| s.record.effective_usage(now) >= self.hourly_limit)
            .then(|| next_hour(now));

        expiries.chain(quota_reset).min()
    }

    /// When `credential` becomes usable again (`None` = usable now or unknown)
    pub fn available_again(&self, credential: &Credential) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.lock()
            .slots
            .iter()
            .find(|s| s.credential == *credential)
            .and_then(|s| s.record.available_again(now, self.hourly_limit))
    }

    /// Requests made across all credentials in the current hour
    pub fn total_hourly_usage(&self) -> u32 {
        let now = self.clock.now();
        self.lock()
            .slots
            .iter()
            .map(|s| s.record.effective_usage(now))
            .sum()
    }

    /// Combined hourly capacity of the pool
    pub fn max_hourly_limit(&self) -> u32 {
        self.hourly_limit.saturating_mul(self.len() as u32)
    }

    /// Status of every credential, in rotation order
    pub fn statuses(&self) -> Vec<CredentialStatus> {
        let now = self.clock.now();
        self.lock()
            .slots
            .iter()
            .map(|s| CredentialStatus {
                key_preview: s.credential.masked(),
                usage: s.record.effective_usage(now),
                hourly_limit: self.hourly_limit,
                rate_limited: s.record.is_rate_limited_at(now),
                last_used: s.record.last_used,
                available_again: s.record.available_again(now, self.hourly_limit),
            })
            .collect()
    }

    /// Replace the credential set
    ///
    /// Records of tokens present before and after the reload are kept as-is;
    /// new tokens start fresh; removed tokens are forgotten.
    pub fn reload<I, S>(&self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.clock.now();
        let incoming = accept_tokens(tokens);
        let mut inner = self.lock();

        let mut previous: Vec<Slot> = std::mem::take(&mut inner.slots);
        inner.slots = incoming
            .into_iter()
            .map(|credential| match previous.iter().position(|s| s.credential == credential) {
                Some(pos) => previous.swap_remove(pos),
                None => Slot {
                    credential,
                    record: CredentialRecord::fresh(now),
                },
            })
            .collect();

        if inner.rotation_index >= inner.slots.len() {
            inner.rotation_index = 0;
        }

        info!(
            count = inner.slots.len(),
            dropped = previous.len(),
            "credential pool reloaded"
        );
        self.persist(&inner);
    }

    /// Re-read the token sources in `config` and [`reload`](Self::reload)
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no source yields a token; the current
    /// credential set is left untouched in that case.
    pub fn reload_from_config(&self, config: &CredentialConfig) -> Result<usize> {
        let tokens = load_tokens(config)?;
        self.reload(tokens);
        Ok(self.len())
    }

    fn select_locked(&self, inner: &mut PoolInner, now: DateTime<Utc>) -> (Option<usize>, bool) {
        let mut changed = false;
        for slot in &mut inner.slots {
            let refresh = slot.record.refresh(now);
            if let Some(previous) = refresh.usage_reset {
                info!(
                    key = %slot.credential,
                    previous_usage = previous,
                    limit = self.hourly_limit,
                    "hourly usage reset"
                );
            }
            if refresh.limit_lifted {
                info!(key = %slot.credential, "rate limit expired");
            }
            changed |= refresh.changed();
        }

        let n = inner.slots.len();
        if n == 0 {
            return (None, changed);
        }

        let start = inner.rotation_index % n;
        for offset in 0..n {
            let idx = (start + offset) % n;
            if inner.slots[idx].record.is_selectable_at(now, self.hourly_limit) {
                inner.rotation_index = (idx + 1) % n;
                return (Some(idx), true);
            }
        }

        (None, changed)
    }

    fn persist(&self, inner: &PoolInner) {
        let snapshot = PoolSnapshot {
            credentials: inner
                .slots
                .iter()
                .map(|s| (s.credential.token().to_string(), s.record.clone()))
                .collect(),
            rotation_index: inner.rotation_index,
        };

        if let Err(e) = write_json_atomic(&self.state_file, &snapshot) {
            error!(error = %e, "failed to save credential state");
        }
    }
}

/// Whether `token` looks like filler text rather than a real access key
///
/// ```
/// use unsplash_dl::credentials::is_placeholder_token;
///
/// assert!(is_placeholder_token("YOUR_ACCESS_TOKEN_HERE"));
/// assert!(is_placeholder_token("dummy_test_key_1"));
/// assert!(!is_placeholder_token("Zq8mB1kLwPp0aX7cRvN3"));
/// ```
pub fn is_placeholder_token(token: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"(?i)dummy|test|your_|example|placeholder|sample").ok());
    match pattern {
        Some(re) => re.is_match(token),
        None => false,
    }
}

fn accept_tokens<I, S>(tokens: I) -> Vec<Credential>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut accepted: Vec<Credential> = Vec::new();
    for (i, token) in tokens.into_iter().enumerate() {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        if is_placeholder_token(token) {
            warn!(
                index = i + 1,
                key = %mask_token(token),
                "rejecting placeholder access token; replace it with a real key"
            );
            continue;
        }
        let credential = Credential::new(token);
        if accepted.contains(&credential) {
            debug!(key = %credential, "duplicate access token ignored");
            continue;
        }
        accepted.push(credential);
    }
    accepted
}
