//! Elapsed-time measurement against an injected clock.

use std::time::{Duration, Instant};

use sandman_traits::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    pub fn start(clock: &dyn Clock) -> Self {
        Self {
            started: clock.now(),
        }
    }

    pub fn started_at(at: Instant) -> Self {
        Self { started: at }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn restart(&mut self, now: Instant) {
        self.started = now;
    }

    /// Saturates to zero if `now` precedes the start.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        u64::try_from(self.elapsed(now).as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandman_traits::ManualClock;

    #[test]
    fn measures_against_clock() {
        let clock = ManualClock::new();
        let mut t = Timer::start(&clock);
        clock.advance_ms(1500);
        assert_eq!(t.elapsed_ms(clock.now()), 1500);
        t.restart(clock.now());
        assert_eq!(t.elapsed(clock.now()), Duration::ZERO);
    }
}
