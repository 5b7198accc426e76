/*
 *  pacer.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	Tick pacing: a monotonic clock for the state machine and the sleep that
 *	fills out the rest of each interval.
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use log::debug;
use std::time::{Duration, Instant};

pub struct Pacer {
    origin: Instant,
    tick_started: Instant,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

// the poll can eat most of an interval when MPD is slow, so the sleep is
// whatever is left rather than a fixed period
impl Pacer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { origin: now, tick_started: now }
    }

    /// Mark the start of a tick; returns the tick time since the pacer was
    /// created.
    #[inline]
    pub fn start_tick(&mut self) -> Duration {
        self.start_tick_at(Instant::now())
    }

    pub fn start_tick_at(&mut self, at: Instant) -> Duration {
        self.tick_started = at;
        at.saturating_duration_since(self.origin)
    }

    /// How long to sleep so the next tick starts `interval` after this one.
    #[inline]
    pub fn remaining(&self, interval: Duration) -> Duration {
        self.remaining_at(interval, Instant::now())
    }

    pub fn remaining_at(&self, interval: Duration, at: Instant) -> Duration {
        let spent = at.saturating_duration_since(self.tick_started);
        if spent > interval {
            debug!("tick overran by {:?}", spent - interval);
        }
        interval.saturating_sub(spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_clock_is_relative_to_origin() {
        let mut pacer = Pacer::new();
        let origin = pacer.origin;
        assert_eq!(pacer.start_tick_at(origin), Duration::ZERO);
        assert_eq!(pacer.start_tick_at(origin + Duration::from_millis(2500)), Duration::from_millis(2500));
    }

    #[test]
    fn test_sleep_fills_the_interval() {
        let mut pacer = Pacer::new();
        let start = pacer.origin + Duration::from_secs(10);
        pacer.start_tick_at(start);

        let interval = Duration::from_secs(1);
        assert_eq!(pacer.remaining_at(interval, start), interval);
        assert_eq!(
            pacer.remaining_at(interval, start + Duration::from_millis(300)),
            Duration::from_millis(700)
        );
        assert_eq!(pacer.remaining_at(interval, start + Duration::from_secs(3)), Duration::ZERO);
    }
}
