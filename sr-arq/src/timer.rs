//! Retransmission timer bookkeeping for the event-driven emulator.
//!
//! Reliable delivery needs one timer per side that fires once after a fixed
//! interval.  The emulator cannot remove an already-scheduled event from its
//! queue, so [`TimerSlot`] tags every start with a generation number: a fire
//! event is honoured only when its generation is still the armed one.  This
//! gives the semantics the engine relies on:
//!
//! - `start` while running **restarts** (the earlier fire becomes stale).
//! - `stop` cancels; the pending fire becomes stale.
//! - a started timer fires exactly once unless stopped or restarted first.
//!
//! The interval is fixed at configuration time; there is no RTT estimation or
//! back-off.

/// One side's single-shot timer.
#[derive(Debug, Default, Clone)]
pub struct TimerSlot {
    generation: u64,
    deadline: Option<f64>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer to expire at `now + interval`.
    ///
    /// Returns the generation the caller must attach to the fire event.
    pub fn start(&mut self, now: f64, interval: f64) -> u64 {
        self.generation += 1;
        self.deadline = Some(now + interval);
        self.generation
    }

    /// Cancel a pending expiry.  Returns `true` if the timer was running.
    pub fn stop(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Consume a fire event.
    ///
    /// Returns `true` when `generation` is the live one, in which case the
    /// timer is disarmed.  Stale fires return `false` and change nothing.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.deadline.is_some() && generation == self.generation {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Expiry time of the running timer.
    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once() {
        let mut t = TimerSlot::new();
        let g = t.start(0.0, 16.0);
        assert_eq!(t.deadline(), Some(16.0));
        assert!(t.fire(g));
        assert!(!t.fire(g));
        assert!(!t.is_running());
    }

    #[test]
    fn restart_invalidates_earlier_fire() {
        let mut t = TimerSlot::new();
        let first = t.start(0.0, 16.0);
        let second = t.start(5.0, 16.0);
        assert_eq!(t.deadline(), Some(21.0));
        assert!(!t.fire(first));
        assert!(t.is_running());
        assert!(t.fire(second));
    }

    #[test]
    fn stop_cancels_pending_fire() {
        let mut t = TimerSlot::new();
        let g = t.start(0.0, 16.0);
        assert!(t.stop());
        assert!(!t.stop());
        assert!(!t.fire(g));
    }
}
