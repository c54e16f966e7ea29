//! Pure elapsed-time accounting. Everything here is a function of the job's
//! timestamps and an injected `now`; no clock, no I/O.

use serde::{Deserialize, Serialize};

use crate::job::{Job, MechanicStatus};
use crate::UnixTimeMs;

/// Computed totals for the job-detail timer display.
///
/// `total_paused_seconds` echoes the job's aggregate counter, which is
/// authoritative for the active-time math. `total_paused_from_log` is recomputed
/// from the pause log (travel-marker entries excluded, since arriving folds
/// those into travel time rather than paused time) and exists as an audit
/// cross-check only; it is never substituted for the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeLedger {
    pub total_elapsed_seconds: u64,
    pub total_active_seconds: u64,
    pub total_travel_seconds: u64,
    pub total_paused_seconds: u64,
    pub total_paused_from_log: u64,
}

impl TimeLedger {
    /// Computes all totals at `now`. Idempotent: identical inputs produce
    /// identical outputs. Every interval is clamped, so out-of-order
    /// timestamps (clock skew, server edits) can never produce negative
    /// seconds.
    #[must_use]
    pub fn compute(job: &Job, now: UnixTimeMs) -> Self {
        let Some(started_at) = job.started_at else {
            return Self::default();
        };

        let end_time = Self::end_time(job, now, started_at);
        let total_elapsed_seconds = end_time.seconds_since(started_at);

        // Travel is billable: while traveling, paused time is not subtracted.
        let total_active_seconds = if job.mechanic_status == MechanicStatus::Travel {
            total_elapsed_seconds
        } else {
            total_elapsed_seconds.saturating_sub(job.total_paused_seconds)
        };

        let live_travel = match (job.mechanic_status, job.travel_started_at) {
            (MechanicStatus::Travel, Some(travel_start)) => now.seconds_since(travel_start),
            _ => 0,
        };
        let total_travel_seconds = job.total_travel_seconds.saturating_add(live_travel);

        let total_paused_from_log = job
            .pause_log
            .iter()
            .filter(|entry| !entry.is_travel())
            .map(|entry| entry.duration_seconds(now))
            .sum();

        Self {
            total_elapsed_seconds,
            total_active_seconds,
            total_travel_seconds,
            total_paused_seconds: job.total_paused_seconds,
            total_paused_from_log,
        }
    }

    /// The instant the elapsed clock runs to: `ended_at` once completed, `now`
    /// while actively working or traveling, otherwise frozen at the last
    /// observed status change (falling back to the open pause entry's start,
    /// then to `started_at` for a job with no recorded change).
    fn end_time(job: &Job, now: UnixTimeMs, started_at: UnixTimeMs) -> UnixTimeMs {
        if let Some(ended_at) = job.ended_at {
            return ended_at;
        }
        if job.mechanic_status.is_active() {
            return now;
        }
        job.last_status_change_at
            .or_else(|| job.open_pause_entry().map(|entry| entry.start))
            .unwrap_or(started_at)
    }
}
