// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic frame time.
//!
//! [`FrameTime`] is a point on the consumer's frame timeline, expressed in
//! nanoseconds since an arbitrary epoch. It is snapshotted once per frame by
//! the animation context and never read mid-frame, so every animator pulsed
//! in one pass observes the same instant.
//!
//! [`Duration`] is a signed nanosecond span. It is signed because producers
//! may request degenerate (negative) start delays; the animation layer clamps
//! those rather than rejecting them.

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time on the frame timeline, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameTime(pub u64);

impl FrameTime {
    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Creates a frame time from whole milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Returns the span between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_since(self, earlier: Self) -> Duration {
        if self.0 >= earlier.0 {
            // The difference of two u64 frame times fits in i64 for any
            // realistic uptime (~292 years).
            #[allow(clippy::cast_possible_wrap)]
            Duration(self.0.saturating_sub(earlier.0) as i64)
        } else {
            Duration(0)
        }
    }

    /// Adds a signed duration, saturating at the epoch for negative results.
    #[inline]
    #[must_use]
    pub const fn offset_by(self, d: Duration) -> Self {
        if d.0 >= 0 {
            Self(self.0.saturating_add(d.0 as u64))
        } else {
            Self(self.0.saturating_sub(d.0.unsigned_abs()))
        }
    }
}

impl Add<Duration> for FrameTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        self.offset_by(rhs)
    }
}

impl Sub for FrameTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        self.saturating_since(rhs)
    }
}

impl fmt::Debug for FrameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameTime({}ns)", self.0)
    }
}

/// A signed span of time in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub i64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> i64 {
        self.0
    }

    /// Creates a duration from whole milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a duration from whole seconds.
    #[inline]
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Whether this duration is negative.
    #[inline]
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Clamps this duration into `[min, max]`.
    #[inline]
    #[must_use]
    pub const fn clamp(self, min: Self, max: Self) -> Self {
        if self.0 < min.0 {
            min
        } else if self.0 > max.0 {
            max
        } else {
            self
        }
    }

    /// This duration as a fraction of `whole`, unclamped.
    ///
    /// Returns 1.0 for a zero-length `whole` so that zero-duration animators
    /// complete on their first pulse instead of dividing by zero.
    #[inline]
    #[must_use]
    pub fn fraction_of(self, whole: Self) -> f32 {
        if whole.0 <= 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.0 as f32 / whole.0 as f32
        }
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Duration {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}ns)", self.0)
    }
}
