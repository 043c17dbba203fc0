// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node animator ownership and frame pulsing.

use alloc::vec::Vec;

use smallvec::SmallVec;

use super::animator::{Animator, AnimatorId, FinishedAnimation, StagingRequest};
use crate::node::{DirtyFields, NodeId, NodeProperties, PropertyCells};
use crate::time::FrameTime;

/// Owns the animators attached to one node.
///
/// Producer-side additions and removals are staged and take effect at the
/// next sync, mirroring the property staging protocol. The manager is the
/// sole owner of each animator from attachment until it finishes or its node
/// is destroyed (after force-finishing).
#[derive(Debug, Default)]
pub struct AnimatorManager {
    /// Animators active on the consumer side.
    animators: SmallVec<[Animator; 2]>,
    /// Added since the last sync; promoted by [`push_staging`](Self::push_staging).
    staged: SmallVec<[Animator; 2]>,
    /// Removal requests, applied before promotion.
    removals: SmallVec<[AnimatorId; 2]>,
}

impl AnimatorManager {
    /// Stages a new animator for promotion at the next sync.
    pub(crate) fn add(&mut self, animator: Animator) {
        self.staged.push(animator);
    }

    /// Stages removal of an animator. A removed animator is dropped without
    /// firing its completion listener.
    pub(crate) fn remove(&mut self, id: AnimatorId) {
        if let Some(pos) = self.staged.iter().position(|a| a.id == id) {
            self.staged.swap_remove(pos);
        } else {
            self.removals.push(id);
        }
    }

    /// Buffers a lifecycle request on the matching animator.
    ///
    /// Returns whether the animator was found.
    pub(crate) fn request(&mut self, id: AnimatorId, request: StagingRequest) -> bool {
        for a in self.staged.iter_mut().chain(self.animators.iter_mut()) {
            if a.id == id {
                a.request(request);
                return true;
            }
        }
        false
    }

    /// Whether any animator is attached (staged or active).
    #[must_use]
    pub fn has_animators(&self) -> bool {
        !self.animators.is_empty() || !self.staged.is_empty()
    }

    /// Number of attached animators (staged plus active).
    #[must_use]
    pub fn len(&self) -> usize {
        self.animators.len() + self.staged.len()
    }

    /// Whether no animators are attached at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies staged removals, promotes staged animators, and pushes every
    /// animator's buffered lifecycle request into its running state.
    pub(crate) fn push_staging(
        &mut self,
        node: NodeId,
        frame_time: FrameTime,
        props: &mut NodeProperties,
        cells: &mut PropertyCells,
        finished: &mut Vec<FinishedAnimation>,
    ) -> DirtyFields {
        for id in self.removals.drain(..) {
            if let Some(pos) = self.animators.iter().position(|a| a.id == id) {
                self.animators.swap_remove(pos);
            }
        }
        self.animators.extend(self.staged.drain(..));

        let mut dirty = DirtyFields::empty();
        for a in &mut self.animators {
            dirty |= a.push_staging(node, frame_time, props, cells, finished);
        }
        dirty
    }

    /// Pulses every animator, releasing those that finished.
    ///
    /// Returns the union of dirty-property fields the animators wrote, which
    /// tells the sync driver what geometry to damage.
    pub(crate) fn animate(
        &mut self,
        node: NodeId,
        frame_time: FrameTime,
        props: &mut NodeProperties,
        cells: &mut PropertyCells,
        finished: &mut Vec<FinishedAnimation>,
    ) -> DirtyFields {
        let mut dirty = DirtyFields::empty();
        self.animators.retain(|a| {
            let (d, done) = a.animate(node, frame_time, props, cells, finished);
            dirty |= d;
            !done
        });
        dirty
    }

    /// Force-finishes every attached animator, firing each completion event
    /// exactly once, and releases them all.
    ///
    /// Used when a node is detached from the visible tree or destroyed.
    pub(crate) fn force_end_all(
        &mut self,
        node: NodeId,
        props: &mut NodeProperties,
        cells: &mut PropertyCells,
        finished: &mut Vec<FinishedAnimation>,
    ) -> DirtyFields {
        self.animators.extend(self.staged.drain(..));
        let mut dirty = DirtyFields::empty();
        for mut a in self.animators.drain(..) {
            dirty |= a.force_end(node, props, cells, finished);
        }
        self.removals.clear();
        dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::animator::{AnimationTarget, Interpolator, PlayState};
    use crate::node::NodeField;
    use crate::time::Duration;

    fn linear_x(id: u64, to: f32, millis: i64) -> Animator {
        let mut a = Animator::new(AnimationTarget::Node(NodeField::TranslationX), to)
            .with_duration(Duration::from_millis(millis))
            .with_interpolator(Interpolator::Linear);
        a.id = AnimatorId(id);
        a.request(StagingRequest::Start);
        a
    }

    #[test]
    fn staged_animators_only_run_after_push() {
        let node = NodeId(1);
        let mut props = NodeProperties::default();
        let mut cells = PropertyCells::default();
        let mut finished = Vec::new();
        let mut mgr = AnimatorManager::default();
        mgr.add(linear_x(1, 10.0, 100));

        let dirty = mgr.animate(node, FrameTime::from_millis(50), &mut props, &mut cells, &mut finished);
        assert!(dirty.is_empty(), "staged animator must not advance");
        assert_eq!(props.x, 0.0);

        let _ = mgr.push_staging(node, FrameTime(0), &mut props, &mut cells, &mut finished);
        let dirty = mgr.animate(node, FrameTime::from_millis(50), &mut props, &mut cells, &mut finished);
        assert_eq!(dirty, DirtyFields::TRANSLATION);
        assert!((props.x - 5.0).abs() < 1e-6);
    }

    #[test]
    fn finished_animators_are_released() {
        let node = NodeId(1);
        let mut props = NodeProperties::default();
        let mut cells = PropertyCells::default();
        let mut finished = Vec::new();
        let mut mgr = AnimatorManager::default();
        mgr.add(linear_x(1, 10.0, 100));
        let _ = mgr.push_staging(node, FrameTime(0), &mut props, &mut cells, &mut finished);

        let _ = mgr.animate(node, FrameTime::from_millis(500), &mut props, &mut cells, &mut finished);
        assert!(mgr.is_empty(), "finished animator released");
        assert_eq!(finished.len(), 1);
    }

    #[test]
    fn dirty_masks_are_merged_across_animators() {
        let node = NodeId(1);
        let mut props = NodeProperties::default();
        let mut cells = PropertyCells::default();
        let mut finished = Vec::new();
        let mut mgr = AnimatorManager::default();
        mgr.add(linear_x(1, 10.0, 100));
        let mut alpha = Animator::new(AnimationTarget::Node(NodeField::Alpha), 0.0)
            .with_duration(Duration::from_millis(100))
            .with_interpolator(Interpolator::Linear);
        alpha.id = AnimatorId(2);
        alpha.request(StagingRequest::Start);
        mgr.add(alpha);
        let _ = mgr.push_staging(node, FrameTime(0), &mut props, &mut cells, &mut finished);

        let dirty = mgr.animate(node, FrameTime::from_millis(50), &mut props, &mut cells, &mut finished);
        assert_eq!(dirty, DirtyFields::TRANSLATION | DirtyFields::ALPHA);
    }

    #[test]
    fn removal_drops_without_completion_event() {
        let node = NodeId(1);
        let mut props = NodeProperties::default();
        let mut cells = PropertyCells::default();
        let mut finished = Vec::new();
        let mut mgr = AnimatorManager::default();
        mgr.add(linear_x(7, 10.0, 100));
        let _ = mgr.push_staging(node, FrameTime(0), &mut props, &mut cells, &mut finished);

        mgr.remove(AnimatorId(7));
        let _ = mgr.push_staging(node, FrameTime::from_millis(10), &mut props, &mut cells, &mut finished);
        assert!(mgr.is_empty());
        assert!(finished.is_empty(), "removal is not completion");
    }

    #[test]
    fn force_end_all_finishes_everything_once() {
        let node = NodeId(1);
        let mut props = NodeProperties::default();
        let mut cells = PropertyCells::default();
        let mut finished = Vec::new();
        let mut mgr = AnimatorManager::default();
        mgr.add(linear_x(1, 10.0, 100));
        mgr.add(linear_x(2, 20.0, 100));
        let _ = mgr.push_staging(node, FrameTime(0), &mut props, &mut cells, &mut finished);

        let _ = mgr.force_end_all(node, &mut props, &mut cells, &mut finished);
        assert!(mgr.is_empty());
        assert_eq!(finished.len(), 2);
        assert!((props.x - 20.0).abs() < 1e-6, "jumped to a final value");

        // Idempotent: nothing left to finish.
        let _ = mgr.force_end_all(node, &mut props, &mut cells, &mut finished);
        assert_eq!(finished.len(), 2);
    }

    #[test]
    fn requests_reach_staged_and_active_animators() {
        let node = NodeId(1);
        let mut props = NodeProperties::default();
        let mut cells = PropertyCells::default();
        let mut finished = Vec::new();
        let mut mgr = AnimatorManager::default();
        let mut a = Animator::new(AnimationTarget::Node(NodeField::TranslationX), 10.0);
        a.id = AnimatorId(3);
        mgr.add(a);
        assert!(mgr.request(AnimatorId(3), StagingRequest::Start));
        assert!(!mgr.request(AnimatorId(99), StagingRequest::Start));

        let _ = mgr.push_staging(node, FrameTime(0), &mut props, &mut cells, &mut finished);
        assert_eq!(
            mgr.animators[0].play_state(),
            PlayState::Running,
            "request on staged animator promoted with it"
        );
    }
}
