//! Phase bookkeeping shared by every timer implementation.
//!
//! A timer is always in exactly one of three phases:
//!
//! ```text
//!            reset(d)                 deadline passes
//!   Idle ─────────────────▶ Armed ─────────────────────▶ Expired
//!    ▲                       │  ▲                           │
//!    │        stop() = true  │  │ reset(d)                  │ drain() / fired()
//!    ├───────────────────────┘  └───────────────────────────┤
//!    └──────────────────────────────────────────────────────┘
//! ```
//!
//! `Expired` is the "fired but nobody read the completion yet" phase. A
//! stopped timer that already expired keeps its completion until it is
//! drained, which is what makes `if !timer.stop() { timer.drain(); }` leave
//! the timer clean.

use std::time::Duration;
use tokio::time::Instant;

/// Roughly 30 years, used when `now + duration` would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns `now + duration`, saturating to a far-future instant.
pub(crate) fn deadline_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Schedules the tick after `fired`, dropping every tick that was missed.
pub(crate) fn next_tick(fired: Instant, period: Duration, now: Instant) -> Instant {
    let next = deadline_after(fired, period);
    if next <= now {
        deadline_after(now, period)
    } else {
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Armed(Instant),
    Expired(Instant),
}

#[derive(Debug)]
pub(crate) struct TimerState {
    phase: Phase,
}

impl TimerState {
    pub(crate) fn armed(now: Instant, duration: Duration) -> Self {
        Self {
            phase: Phase::Armed(deadline_after(now, duration)),
        }
    }

    /// Promotes an armed timer whose deadline has passed to `Expired`.
    pub(crate) fn settle(&mut self, now: Instant) -> Phase {
        if let Phase::Armed(deadline) = self.phase
            && deadline <= now
        {
            self.phase = Phase::Expired(deadline);
        }
        self.phase
    }

    pub(crate) fn stop(&mut self, now: Instant) -> bool {
        match self.settle(now) {
            Phase::Armed(_) => {
                self.phase = Phase::Idle;
                true
            }
            Phase::Idle | Phase::Expired(_) => false,
        }
    }

    /// Re-arms the timer. An undrained completion is discarded.
    pub(crate) fn reset(&mut self, now: Instant, duration: Duration) -> bool {
        let was_armed = matches!(self.settle(now), Phase::Armed(_));
        self.phase = Phase::Armed(deadline_after(now, duration));
        was_armed
    }

    pub(crate) fn drain(&mut self, now: Instant) -> Option<Instant> {
        match self.settle(now) {
            Phase::Expired(deadline) => {
                self.phase = Phase::Idle;
                Some(deadline)
            }
            Phase::Idle | Phase::Armed(_) => None,
        }
    }

    /// Marks the pending completion as read.
    pub(crate) fn observe(&mut self) {
        self.phase = Phase::Idle;
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Armed(deadline) | Phase::Expired(deadline) => Some(deadline),
            Phase::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_stop_before_deadline() {
        let start = Instant::now();
        let mut state = TimerState::armed(start, secs(5));

        assert!(state.stop(start + secs(1)));
        assert_eq!(state.settle(start + secs(10)), Phase::Idle);
        assert!(!state.stop(start + secs(10)));
        assert_eq!(state.drain(start + secs(10)), None);
    }

    #[test]
    fn test_stop_after_deadline_leaves_completion_to_drain() {
        let start = Instant::now();
        let mut state = TimerState::armed(start, secs(5));

        assert!(!state.stop(start + secs(5)));
        assert_eq!(state.drain(start + secs(6)), Some(start + secs(5)));
        assert_eq!(state.drain(start + secs(7)), None);
        assert_eq!(state.deadline(), None);
    }

    #[test]
    fn test_reset_reports_previous_phase() {
        let start = Instant::now();
        let mut state = TimerState::armed(start, secs(5));

        // Still armed
        assert!(state.reset(start + secs(1), secs(5)));
        assert_eq!(state.deadline(), Some(start + secs(6)));

        // Expired: reset discards the stale completion
        assert!(!state.reset(start + secs(7), secs(1)));
        assert_eq!(state.drain(start + secs(7)), None);
        assert_eq!(state.deadline(), Some(start + secs(8)));

        // Idle
        state.observe();
        assert!(!state.reset(start + secs(9), secs(1)));
    }

    #[test]
    fn test_deadline_saturates() {
        let start = Instant::now();
        let state = TimerState::armed(start, Duration::MAX);

        assert!(state.deadline().unwrap() > start + secs(86_400));
    }

    #[test]
    fn test_next_tick_drops_missed_ticks() {
        let start = Instant::now();

        assert_eq!(next_tick(start, secs(1), start), start + secs(1));
        assert_eq!(next_tick(start, secs(1), start + secs(3)), start + secs(4));
    }
}
