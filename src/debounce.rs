//! Trailing debounce for the auto-save PATCH. The core cannot sleep, so the
//! shell owns the actual timer: each `schedule` hands out a fresh generation
//! token, and only the timer holding the newest token is allowed to fire.
//! Stale timers that come back after a reschedule or cancel are no-ops.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoSaveDebouncer {
    generation: u64,
    armed: bool,
}

impl AutoSaveDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a new delay, invalidating any timer scheduled earlier. Returns
    /// the token the shell must echo back on expiry.
    pub fn schedule(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.armed = true;
        self.generation
    }

    /// Timer expiry. True exactly when `token` is the newest schedule and
    /// nothing has fired or cancelled it since.
    pub fn try_fire(&mut self, token: u64) -> bool {
        if self.armed && token == self.generation {
            self.armed = false;
            true
        } else {
            false
        }
    }

    /// Forces a pending save to fire now, ahead of its timer. True when one
    /// was pending. The superseded timer's token is left stale so its later
    /// expiry is ignored.
    pub fn flush(&mut self) -> bool {
        let was_armed = self.armed;
        self.armed = false;
        was_armed
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_token_fires_once() {
        let mut debouncer = AutoSaveDebouncer::new();
        let token = debouncer.schedule();
        assert!(debouncer.try_fire(token));
        assert!(!debouncer.try_fire(token));
    }

    #[test]
    fn test_reschedule_supersedes_earlier_timer() {
        let mut debouncer = AutoSaveDebouncer::new();
        let first = debouncer.schedule();
        let second = debouncer.schedule();

        // The first timer expires after the reschedule and must not fire.
        assert!(!debouncer.try_fire(first));
        assert!(debouncer.try_fire(second));
    }

    #[test]
    fn test_cancel_disarms() {
        let mut debouncer = AutoSaveDebouncer::new();
        let token = debouncer.schedule();
        debouncer.cancel();
        assert!(!debouncer.is_armed());
        assert!(!debouncer.try_fire(token));
    }

    #[test]
    fn test_flush_fires_pending_and_invalidates_timer() {
        let mut debouncer = AutoSaveDebouncer::new();
        let token = debouncer.schedule();
        assert!(debouncer.flush());
        assert!(!debouncer.flush());
        assert!(!debouncer.try_fire(token));
    }

    #[test]
    fn test_flush_with_nothing_pending() {
        let mut debouncer = AutoSaveDebouncer::new();
        assert!(!debouncer.flush());
    }
}
