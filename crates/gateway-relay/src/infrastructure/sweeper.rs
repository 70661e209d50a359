//! Periodic cleanup of expired offense records.
//!
//! Records are normally purged lazily when the same address returns.  An
//! address that fails once and never comes back would otherwise stay in the
//! table forever, so a background task sweeps it on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use gateway_core::OffenseTracker;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Spawns a task that calls [`OffenseTracker::sweep`] every `period`.
///
/// The task runs until the returned handle is aborted or the runtime stops.
pub fn spawn_offense_sweeper(tracker: Arc<OffenseTracker>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; there is nothing to sweep yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = tracker.sweep();
            if removed > 0 {
                debug!(removed, remaining = tracker.len(), "swept expired offense records");
            }
        }
    })
}
