// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame animation scheduling across the whole tree.

use alloc::vec::Vec;

use core::mem;

use super::animator::{AnimatorId, FinishedAnimation};
use crate::clock::FrameClock;
use crate::node::{NodeHandle, NodeId, NodeStore};
use crate::time::FrameTime;

/// Receives finished-animator events when the consumer dispatches them.
pub trait AnimationListener {
    /// Called exactly once per animator that reached a terminal state this
    /// frame, whether it completed naturally or was force-finished.
    fn on_animator_finished(&mut self, node: NodeId, animator: AnimatorId);
}

/// Schedules animation pulses for one tree.
///
/// Nodes that gain their first animator are queued for the next frame. At
/// frame start the queue becomes the current frame's work list; the sync
/// traversal pulses the nodes it reaches and
/// [`run_remaining_animations`](Self::run_remaining_animations) pulses the
/// rest, so animators keep advancing while their node is detached from the
/// visible tree.
#[derive(Debug, Default)]
pub struct AnimationContext {
    /// Nodes still owed a pulse this frame.
    current: Vec<NodeHandle>,
    /// Nodes queued for the next frame.
    next: Vec<NodeHandle>,
    frame_time: FrameTime,
    in_frame: bool,
    /// Completion events queued for exactly-once dispatch.
    pub(crate) finished: Vec<FinishedAnimation>,
}

impl AnimationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a frame, snapshotting the clock's latest frame time.
    ///
    /// Every animator pulsed this frame sees the same timestamp. Panics if
    /// the previous frame was never closed with
    /// [`run_remaining_animations`](Self::run_remaining_animations).
    pub fn start_frame(&mut self, clock: &dyn FrameClock) {
        assert!(!self.in_frame, "animation frame already in progress");
        assert!(
            self.current.is_empty(),
            "previous frame left unpulsed animation nodes"
        );
        self.frame_time = clock.latest_frame_time();
        mem::swap(&mut self.current, &mut self.next);
        self.in_frame = true;
    }

    /// The timestamp every pulse in the current frame uses.
    #[must_use]
    pub fn frame_time(&self) -> FrameTime {
        self.frame_time
    }

    /// Whether any node holds animators scheduled now or for the next frame.
    #[must_use]
    pub fn has_animations(&self) -> bool {
        !self.current.is_empty() || !self.next.is_empty()
    }

    /// Queues a node for its first pulse next frame.
    pub(crate) fn schedule(&mut self, handle: NodeHandle) {
        self.next.push(handle);
    }

    /// Pulses every scheduled node the sync traversal did not reach, then
    /// closes the frame.
    ///
    /// Unreached nodes are detached from the visible tree; their animators
    /// advance without producing damage. Nodes whose animators all finished
    /// leave the schedule.
    pub fn run_remaining_animations(&mut self, store: &mut NodeStore) {
        assert!(self.in_frame, "run_remaining_animations outside a frame");
        let current = mem::take(&mut self.current);
        for handle in current {
            if store.pulse_off_tree(handle, self.frame_time, &mut self.finished) {
                self.next.push(handle);
            }
        }
        self.in_frame = false;
    }

    /// Drains queued completion events into `listener`.
    ///
    /// Each finished animator is reported exactly once across the lifetime of
    /// the context, no matter how it reached its terminal state.
    pub fn dispatch_finished(&mut self, listener: &mut dyn AnimationListener) {
        for event in self.finished.drain(..) {
            listener.on_animator_finished(event.node, event.animator);
        }
    }
}
