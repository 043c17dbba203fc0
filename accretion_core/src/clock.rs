// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame time sources.
//!
//! The core never reads a platform clock directly. A [`FrameClock`] is
//! supplied by the embedding layer (a display-link callback, a vsync event
//! source, or a test double) and queried exactly once per frame by the
//! animation context.

use crate::time::FrameTime;

/// Supplies the monotonic frame time used to advance animations.
///
/// Implementations must be non-decreasing: a later call never returns an
/// earlier time than a previous call.
pub trait FrameClock {
    /// Returns the time of the most recent frame signal.
    fn latest_frame_time(&self) -> FrameTime;
}

/// A hand-advanced clock for tests and offline drivers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualClock {
    now: FrameTime,
}

impl ManualClock {
    /// Creates a clock starting at the given time.
    #[must_use]
    pub const fn new(start: FrameTime) -> Self {
        Self { now: start }
    }

    /// Advances the clock by `millis` milliseconds.
    pub fn advance_millis(&mut self, millis: u64) {
        self.now = FrameTime(self.now.0 + millis * 1_000_000);
    }

    /// Sets the clock to an absolute time.
    ///
    /// # Panics
    ///
    /// Panics if `t` is earlier than the current time; the frame timeline is
    /// monotonic.
    pub fn set(&mut self, t: FrameTime) {
        assert!(t >= self.now, "frame clock must not move backwards");
        self.now = t;
    }
}

impl FrameClock for ManualClock {
    fn latest_frame_time(&self) -> FrameTime {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let mut clock = ManualClock::new(FrameTime::from_millis(10));
        clock.advance_millis(6);
        assert_eq!(clock.latest_frame_time(), FrameTime::from_millis(16));
    }

    #[test]
    #[should_panic(expected = "must not move backwards")]
    fn manual_clock_rejects_regression() {
        let mut clock = ManualClock::new(FrameTime::from_millis(10));
        clock.set(FrameTime::from_millis(5));
    }
}
