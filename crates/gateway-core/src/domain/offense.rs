//! Per-IP offense tracking.
//!
//! Every failed password submission is recorded against the submitting IP
//! address.  Once an address reaches the configured number of failures it is
//! locked out until the timeout window since its last failure has passed.
//!
//! # The four states (for beginners)
//!
//! The state of an address is derived from two facts: how many failures it has
//! (`failed_attempts`) and how long ago the last one happened (`elapsed`).
//!
//! ```text
//!                           elapsed < timeout      elapsed >= timeout
//!                         ┌───────────────────┬──────────────────────┐
//! failed < max_attempts   │ NotTimedOut       │ NotTimedOutButFreed  │
//! failed == max_attempts  │ TimedOut (blocked)│ RecentlyFreed        │
//!                         └───────────────────┴──────────────────────┘
//! ```
//!
//! Both "freed" states mean the record is history and should be deleted;
//! [`OffenseTracker::purge_if_freed`] does exactly that.
//!
//! # Ordering of check and record
//!
//! Callers check first ([`OffenseTracker::purge_if_freed`]) and record after a
//! failed attempt ([`OffenseTracker::record_failure`]).  With that order the
//! attempt that reaches `max_attempts` is still answered as a plain rejection
//! reporting `0` attempts remaining, and only the *next* request sees the
//! lockout.  Failures are never counted past `max_attempts`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::clock::{Clock, SystemClock};

/// Number of failures allowed before an address is locked out, by default.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default lockout window.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Error returned when an [`OffensePolicy`] is constructed with unusable values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Lockout thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffensePolicy {
    max_attempts: u32,
    timeout: Duration,
}

impl OffensePolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ZeroAttempts`] if `max_attempts` is zero, since
    /// such a policy would lock out every address before its first attempt.
    pub fn new(max_attempts: u32, timeout: Duration) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            timeout,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for OffensePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Failure history of a single address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffenseRecord {
    /// Starts at 1 on the first failure; never exceeds the policy maximum.
    pub failed_attempts: u32,
    /// Clock reading (seconds) of the most recently recorded failure.
    pub last_attempt_secs: u64,
}

/// The state of an address under the current policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffenseStatus {
    /// Below the limit and inside the window; also the answer for an address
    /// with no history at all.
    NotTimedOut,
    /// Below the limit but the window has passed: the streak aged out.
    NotTimedOutButFreed,
    /// At the limit and inside the window: requests must be rejected.
    TimedOut,
    /// At the limit but the window has passed: the lockout is over.
    RecentlyFreed,
}

impl OffenseStatus {
    /// `true` only for [`OffenseStatus::TimedOut`].
    pub fn is_blocked(self) -> bool {
        matches!(self, OffenseStatus::TimedOut)
    }

    /// `true` for the two states whose record should be deleted.
    pub fn is_freed(self) -> bool {
        matches!(
            self,
            OffenseStatus::NotTimedOutButFreed | OffenseStatus::RecentlyFreed
        )
    }
}

/// Lock-guarded map from client address to its offense record.
///
/// The raw map is never exposed; every operation takes the lock once, so a
/// check-and-delete such as [`purge_if_freed`](Self::purge_if_freed) is atomic
/// with respect to concurrent requests from the same address.
///
/// # Examples
///
/// ```rust
/// use std::net::IpAddr;
/// use std::sync::Arc;
/// use std::time::Duration;
/// use gateway_core::{ManualClock, OffensePolicy, OffenseStatus, OffenseTracker};
///
/// let clock = Arc::new(ManualClock::new(0));
/// let policy = OffensePolicy::new(2, Duration::from_secs(60)).unwrap();
/// let tracker = OffenseTracker::with_clock(policy, clock.clone());
/// let ip: IpAddr = "192.0.2.7".parse().unwrap();
///
/// tracker.record_failure(ip);
/// tracker.record_failure(ip);
/// assert_eq!(tracker.evaluate(ip), OffenseStatus::TimedOut);
///
/// clock.advance(60);
/// assert_eq!(tracker.purge_if_freed(ip), OffenseStatus::RecentlyFreed);
/// assert!(tracker.is_empty());
/// ```
pub struct OffenseTracker {
    policy: OffensePolicy,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<IpAddr, OffenseRecord>>,
}

impl OffenseTracker {
    /// Creates a tracker driven by the system clock.
    pub fn new(policy: OffensePolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Creates a tracker driven by an explicit clock.
    pub fn with_clock(policy: OffensePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> OffensePolicy {
        self.policy
    }

    /// Records one failed attempt from `ip` and returns the updated record.
    ///
    /// Creates the record at one failure, otherwise increments the count and
    /// refreshes the timestamp.  An address already at `max_attempts` is left
    /// untouched.
    pub fn record_failure(&self, ip: IpAddr) -> OffenseRecord {
        let now = self.clock.now_secs();
        let max = self.policy.max_attempts;
        let mut records = self.records.lock();

        let record = records.entry(ip).or_insert(OffenseRecord {
            failed_attempts: 0,
            last_attempt_secs: now,
        });

        if record.failed_attempts < max {
            record.failed_attempts += 1;
            record.last_attempt_secs = now;
            if record.failed_attempts == max {
                warn!(%ip, attempts = max, "address reached the failure limit and is locked out");
            } else {
                debug!(%ip, attempts = record.failed_attempts, "recorded failed attempt");
            }
        }

        *record
    }

    /// Computes the state of `ip` without modifying anything.
    pub fn evaluate(&self, ip: IpAddr) -> OffenseStatus {
        let now = self.clock.now_secs();
        let records = self.records.lock();
        records
            .get(&ip)
            .map(|record| self.status_of(record, now))
            .unwrap_or(OffenseStatus::NotTimedOut)
    }

    /// Evaluates `ip` and deletes its record if the state is one of the two
    /// "freed" states.  Returns the state observed before any deletion.
    pub fn purge_if_freed(&self, ip: IpAddr) -> OffenseStatus {
        let now = self.clock.now_secs();
        let mut records = self.records.lock();

        let Some(record) = records.get(&ip) else {
            return OffenseStatus::NotTimedOut;
        };

        let status = self.status_of(record, now);
        if status.is_freed() {
            records.remove(&ip);
            debug!(%ip, ?status, "cleared offense record");
        }
        status
    }

    /// Deletes every record in a freed state and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_secs();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !self.status_of(record, now).is_freed());
        before - records.len()
    }

    /// Failures currently recorded against `ip` (0 when there is no record).
    pub fn failed_attempts(&self, ip: IpAddr) -> u32 {
        self.records
            .lock()
            .get(&ip)
            .map(|r| r.failed_attempts)
            .unwrap_or(0)
    }

    /// Attempts `ip` may still make before it is locked out.
    pub fn remaining_attempts(&self, ip: IpAddr) -> u32 {
        self.policy
            .max_attempts
            .saturating_sub(self.failed_attempts(ip))
    }

    /// Number of addresses with a record.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn status_of(&self, record: &OffenseRecord, now: u64) -> OffenseStatus {
        let elapsed = now.saturating_sub(record.last_attempt_secs);
        let window_passed = elapsed >= self.policy.timeout.as_secs();

        match (record.failed_attempts >= self.policy.max_attempts, window_passed) {
            (true, false) => OffenseStatus::TimedOut,
            (true, true) => OffenseStatus::RecentlyFreed,
            (false, false) => OffenseStatus::NotTimedOut,
            (false, true) => OffenseStatus::NotTimedOutButFreed,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
