//! Wall-clock abstraction with one-second resolution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of "now" in whole seconds.
///
/// The offense tracker only ever compares timestamps it produced itself, so
/// any monotone-enough epoch works.  Production code uses [`SystemClock`];
/// tests use [`ManualClock`] to jump past a lockout window instantly.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now_secs(&self) -> u64;
}

/// Unix time from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```rust
/// use gateway_core::{Clock, ManualClock};
///
/// let clock = ManualClock::new(100);
/// clock.advance(61);
/// assert_eq!(clock.now_secs(), 161);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at `start_secs`.
    pub fn new(start_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(start_secs),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
