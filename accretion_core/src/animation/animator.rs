// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Timed scalar interpolation bound to one animatable target.
//!
//! An [`Animator`] drives exactly one scalar: a node property field, a
//! free-standing float cell, a paint scalar, or the reveal-clip radius. All
//! four target kinds go through one `match` ([`AnimationTarget`]) rather than
//! virtual dispatch.
//!
//! Producer-initiated lifecycle changes ([`StagingRequest`]) are buffered and
//! promoted by [`push_staging`](Animator::push_staging) at the next sync, so
//! user calls never race the consumer's per-frame advance. The running state
//! machine is `NotStarted → {Running ↔ Reversing} → Finished`, with
//! `Finished` terminal until an explicit `Start` or `Reset`.

use alloc::vec::Vec;

use core::fmt;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::node::{NodeField, NodeId, NodeProperties, RevealClip};
use crate::node::{DirtyFields, FloatCellId, PaintCellId, PaintField, PropertyCells};
use crate::time::{Duration, FrameTime};

/// Upper clamp for start delays and durations.
///
/// Values beyond this are producer bugs; playback still terminates instead of
/// stalling for hours.
const MAX_TIME_SPAN: Duration = Duration::from_secs(60 * 60);

/// Process-unique animator identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimatorId(pub(crate) u64);

impl fmt::Debug for AnimatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnimatorId({})", self.0)
    }
}

/// A finished-animator event, queued for exactly-once listener dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinishedAnimation {
    /// The node the animator was attached to.
    pub node: NodeId,
    /// The finished animator.
    pub animator: AnimatorId,
}

/// What an animator writes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnimationTarget {
    /// A scalar field of the owning node's committed properties.
    Node(NodeField),
    /// A free-standing float cell.
    Float(FloatCellId),
    /// One scalar field of a paint cell.
    Paint(PaintCellId, PaintField),
    /// The radius of the owning node's reveal clip, centered at the given
    /// local point.
    RevealRadius {
        /// Reveal center x in local coordinates.
        center_x: f32,
        /// Reveal center y in local coordinates.
        center_y: f32,
    },
}

impl AnimationTarget {
    fn read(&self, props: &NodeProperties, cells: &PropertyCells) -> f32 {
        match *self {
            Self::Node(field) => field.get(props),
            Self::Float(id) => cells.float(id),
            Self::Paint(id, field) => cells.paint_field(id, field),
            Self::RevealRadius { .. } => props.reveal_clip.map_or(0.0, |r| r.radius),
        }
    }

    fn write(&self, value: f32, props: &mut NodeProperties, cells: &mut PropertyCells) -> DirtyFields {
        match *self {
            Self::Node(field) => field.set(props, value),
            Self::Float(id) => {
                cells.set_float(id, value);
                DirtyFields::CONTENT_VALUES
            }
            Self::Paint(id, field) => {
                cells.set_paint_field(id, field, value);
                DirtyFields::CONTENT_VALUES
            }
            Self::RevealRadius { center_x, center_y } => {
                props.reveal_clip = Some(RevealClip {
                    center_x,
                    center_y,
                    radius: value,
                });
                DirtyFields::REVEAL
            }
        }
    }
}

/// Interpolation curve applied to the raw time fraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interpolator {
    /// Constant velocity.
    Linear,
    /// Slow start and end, fast middle.
    AccelerateDecelerate,
    /// Fast start, slow end.
    Decelerate,
    /// Overshoots the final value, then settles back.
    Overshoot {
        /// Overshoot amount; 2.0 gives the stock feel.
        tension: f32,
    },
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::AccelerateDecelerate
    }
}

impl Interpolator {
    /// Maps a raw fraction in `[0, 1]` to an eased fraction.
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Self::Linear => t,
            Self::AccelerateDecelerate => {
                let x = (f64::from(t) + 1.0) * core::f64::consts::PI;
                #[allow(clippy::cast_possible_truncation)]
                {
                    (x.cos() / 2.0) as f32 + 0.5
                }
            }
            Self::Decelerate => {
                let inv = 1.0 - t;
                1.0 - inv * inv
            }
            Self::Overshoot { tension } => {
                let x = t - 1.0;
                x * x * ((tension + 1.0) * x + tension) + 1.0
            }
        }
    }
}

/// Running play state of an animator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    /// Created or reset; not advancing.
    NotStarted,
    /// Advancing from the start value toward the final value.
    Running,
    /// Advancing from the final value back toward the start value.
    Reversing,
    /// Terminal until an explicit `Start` or `Reset`.
    Finished,
}

/// A producer-initiated lifecycle change, deferred until the next sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagingRequest {
    /// Begin (or restart) forward playback.
    Start,
    /// Reverse direction, keeping current progress if already active.
    Reverse,
    /// Return to the not-started state and the start value.
    Reset,
    /// Stop at the current value and finish.
    Cancel,
    /// Jump to the final value and finish.
    End,
}

/// A timed interpolation driver bound to one scalar target.
#[derive(Debug)]
pub struct Animator {
    pub(crate) id: AnimatorId,
    target: AnimationTarget,
    final_value: f32,
    /// Explicit start value; when `None`, the target's current value is
    /// latched at start time.
    start_value: Option<f32>,
    from_value: f32,
    duration: Duration,
    start_delay: Duration,
    interpolator: Interpolator,
    play_state: PlayState,
    staging_request: Option<StagingRequest>,
    start_time: Option<FrameTime>,
}

impl Animator {
    /// Creates an animator driving `target` to `final_value` over the default
    /// 300 ms with the default curve.
    #[must_use]
    pub fn new(target: AnimationTarget, final_value: f32) -> Self {
        Self {
            id: AnimatorId(0),
            target,
            final_value,
            start_value: None,
            from_value: 0.0,
            duration: Duration::from_millis(300),
            start_delay: Duration::ZERO,
            interpolator: Interpolator::default(),
            play_state: PlayState::NotStarted,
            staging_request: None,
            start_time: None,
        }
    }

    /// Sets the playback duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the start delay.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Sets an explicit start value instead of latching the target's current
    /// value at start time.
    #[must_use]
    pub fn with_start_value(mut self, value: f32) -> Self {
        self.start_value = Some(value);
        self
    }

    /// Sets the interpolation curve.
    #[must_use]
    pub fn with_interpolator(mut self, interpolator: Interpolator) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// This animator's id (assigned when attached to a node).
    #[must_use]
    pub fn id(&self) -> AnimatorId {
        self.id
    }

    /// Current play state, as seen by the consumer side.
    #[must_use]
    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    /// Buffers a lifecycle request for promotion at the next sync.
    ///
    /// A later request in the same producer frame replaces an earlier one.
    pub fn request(&mut self, request: StagingRequest) {
        self.staging_request = Some(request);
    }

    fn clamped(span: Duration, what: &str) -> Duration {
        if span.is_negative() || span > MAX_TIME_SPAN {
            log::warn!(
                "animator {what} {}ns outside sane range; clamping",
                span.nanos()
            );
            span.clamp(Duration::ZERO, MAX_TIME_SPAN)
        } else {
            span
        }
    }

    fn latch_from_value(&mut self, props: &NodeProperties, cells: &PropertyCells) {
        self.from_value = self
            .start_value
            .unwrap_or_else(|| self.target.read(props, cells));
    }

    /// Elapsed active fraction in `[0, 1]`, or `None` inside the start delay.
    fn raw_fraction(&self, now: FrameTime) -> Option<f32> {
        let start = self.start_time?;
        if now < start {
            return None;
        }
        let duration = Self::clamped(self.duration, "duration");
        Some(now.saturating_since(start).fraction_of(duration).clamp(0.0, 1.0))
    }

    /// Promotes a buffered staging request into the running state.
    ///
    /// Returns the dirty fields written by requests that jump the value
    /// (`Reset`, `End`). Transitions into `Finished` queue a completion
    /// event for exactly-once dispatch.
    pub(crate) fn push_staging(
        &mut self,
        node: NodeId,
        frame_time: FrameTime,
        props: &mut NodeProperties,
        cells: &mut PropertyCells,
        finished: &mut Vec<FinishedAnimation>,
    ) -> DirtyFields {
        let Some(request) = self.staging_request.take() else {
            return DirtyFields::empty();
        };

        match request {
            StagingRequest::Start => {
                self.latch_from_value(props, cells);
                self.play_state = PlayState::Running;
                self.start_time = Some(frame_time + Self::clamped(self.start_delay, "start delay"));
                DirtyFields::empty()
            }
            StagingRequest::Reverse => {
                match self.play_state {
                    PlayState::Running | PlayState::Reversing => {
                        // Flip direction in place, keeping current progress.
                        let p = self.raw_fraction(frame_time).unwrap_or(0.0);
                        let duration = Self::clamped(self.duration, "duration");
                        let remaining = Duration(
                            (f64::from(1.0 - p) * duration.nanos() as f64) as i64,
                        );
                        self.start_time = Some(frame_time.offset_by(Duration::ZERO - remaining));
                        self.play_state = if self.play_state == PlayState::Running {
                            PlayState::Reversing
                        } else {
                            PlayState::Running
                        };
                    }
                    PlayState::NotStarted | PlayState::Finished => {
                        self.latch_from_value(props, cells);
                        self.play_state = PlayState::Reversing;
                        self.start_time =
                            Some(frame_time + Self::clamped(self.start_delay, "start delay"));
                    }
                }
                DirtyFields::empty()
            }
            StagingRequest::Reset => {
                self.play_state = PlayState::NotStarted;
                self.start_time = None;
                match self.start_value {
                    Some(v) => self.target.write(v, props, cells),
                    None => DirtyFields::empty(),
                }
            }
            StagingRequest::Cancel => {
                let was_active = self.play_state != PlayState::Finished;
                self.play_state = PlayState::Finished;
                if was_active {
                    finished.push(FinishedAnimation {
                        node,
                        animator: self.id,
                    });
                }
                DirtyFields::empty()
            }
            StagingRequest::End => self.force_end(node, props, cells, finished),
        }
    }

    /// Jumps to the terminal value and finishes, queueing the completion
    /// event if the animator had not already finished.
    pub(crate) fn force_end(
        &mut self,
        node: NodeId,
        props: &mut NodeProperties,
        cells: &mut PropertyCells,
        finished: &mut Vec<FinishedAnimation>,
    ) -> DirtyFields {
        let was_active = self.play_state != PlayState::Finished;
        let terminal = match self.play_state {
            PlayState::Reversing => self.from_value,
            _ => self.final_value,
        };
        self.play_state = PlayState::Finished;
        if !was_active {
            return DirtyFields::empty();
        }
        finished.push(FinishedAnimation {
            node,
            animator: self.id,
        });
        self.target.write(terminal, props, cells)
    }

    /// Writes `value` only if it differs from the target's current value, so
    /// a pulse that changes nothing reports no dirty fields.
    fn write_if_changed(
        &self,
        value: f32,
        props: &mut NodeProperties,
        cells: &mut PropertyCells,
    ) -> DirtyFields {
        // A reveal target with no clip yet always writes: radius 0 with a
        // clip conceals the node, while no clip leaves it unclipped.
        let unchanged = match self.target {
            AnimationTarget::RevealRadius { .. } if props.reveal_clip.is_none() => false,
            _ => self.target.read(props, cells) == value,
        };
        if unchanged {
            DirtyFields::empty()
        } else {
            self.target.write(value, props, cells)
        }
    }

    /// Advances the animator to `frame_time`, writing the interpolated value.
    ///
    /// Returns the dirty fields written plus whether the animator is now
    /// finished (and should be released by its manager).
    pub(crate) fn animate(
        &mut self,
        node: NodeId,
        frame_time: FrameTime,
        props: &mut NodeProperties,
        cells: &mut PropertyCells,
        finished: &mut Vec<FinishedAnimation>,
    ) -> (DirtyFields, bool) {
        match self.play_state {
            PlayState::NotStarted => return (DirtyFields::empty(), false),
            PlayState::Finished => return (DirtyFields::empty(), true),
            PlayState::Running | PlayState::Reversing => {}
        }

        let Some(p) = self.raw_fraction(frame_time) else {
            // Still inside the start delay: hold the "before" value.
            let before = match self.play_state {
                PlayState::Reversing => self.final_value,
                _ => self.from_value,
            };
            return (self.write_if_changed(before, props, cells), false);
        };

        let eased = self.interpolator.apply(match self.play_state {
            PlayState::Reversing => 1.0 - p,
            _ => p,
        });
        let value = self.from_value + (self.final_value - self.from_value) * eased;
        let dirty = self.write_if_changed(value, props, cells);

        if p >= 1.0 {
            self.play_state = PlayState::Finished;
            finished.push(FinishedAnimation {
                node,
                animator: self.id,
            });
            (dirty, true)
        } else {
            (dirty, false)
        }
    }
}
