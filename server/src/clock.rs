//! Day/night timing. The caller always supplies `now`; nothing in here reads
//! a wall clock.

use shared::{Cycle, TimeRemaining};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct CycleClock {
    cycle: Cycle,
    day_duration: Duration,
    night_duration: Duration,
    cycle_end: Instant,
}

impl CycleClock {
    /// Starts on day one, ending `day_duration` after `now`. Returns `None`
    /// if that instant cannot be represented.
    pub fn start(
        now: Instant,
        day_duration: Duration,
        night_duration: Duration,
    ) -> Option<Self> {
        Some(Self {
            cycle: Cycle::Day,
            day_duration,
            night_duration,
            cycle_end: now.checked_add(day_duration)?,
        })
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    #[cfg(test)]
    pub fn cycle_end(&self) -> Instant {
        self.cycle_end
    }

    pub fn remaining(&self, now: Instant) -> TimeRemaining {
        TimeRemaining::from_duration(self.cycle_end.saturating_duration_since(now))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.cycle_end
    }

    /// Flips the cycle and schedules its end relative to `now`. Leaves the
    /// clock untouched and returns `None` if the new end overflows.
    pub fn advance(&mut self, now: Instant) -> Option<Cycle> {
        let next = self.cycle.flipped();
        let length = match next {
            Cycle::Day => self.day_duration,
            Cycle::Night => self.night_duration,
        };
        self.cycle_end = now.checked_add(length)?;
        self.cycle = next;
        Some(next)
    }
}
