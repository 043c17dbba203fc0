// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The staging-to-committed sync pass.
//!
//! [`NodeStore::prepare_tree`] walks the committed tree once per frame,
//! promoting producer staging state (in [`SyncMode::Full`]), pulsing
//! animators, and accumulating pixel damage through the transform stack. The
//! pass also maintains tree membership: children acquire a parent reference
//! when their content list is committed and drop it when the list that named
//! them is replaced, and a node whose last parent reference goes away is
//! reported, force-finished, and stripped of consumer resources.

use core::mem;

use kurbo::Rect;
use smallvec::SmallVec;

use crate::animation::AnimationContext;
use crate::damage::{DamageAccumulator, MAX_DAMAGE};
use crate::node::store::NodeStore;
use crate::node::{DirtyFields, NodeHandle, NodeId, NodeProperties};

/// How much of the staged state a sync pass promotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Promote staged properties, content, and animator requests, then pulse.
    Full,
    /// Pulse animators only; producer staging stays pending. Used when the
    /// consumer redraws without a fresh producer submission.
    ConsumerOnly,
}

/// Observes structural tree changes during a sync pass.
pub trait TreeObserver {
    /// The node's last committed parent reference went away this pass. The
    /// node may still be externally retained and re-attached later.
    fn on_node_possibly_detached(&mut self, node: NodeId);
}

/// A [`TreeObserver`] that ignores everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl TreeObserver for NullObserver {
    fn on_node_possibly_detached(&mut self, _node: NodeId) {}
}

/// The node's current committed extent mapped into its parent's space, or
/// `None` when it cannot contribute pixels. Perspective falls back to the
/// maximal extent.
fn committed_extent(props: &NodeProperties) -> Option<Rect> {
    if props.alpha <= 0.0 {
        return None;
    }
    let bounds = props.bounds();
    if bounds.is_zero_area() {
        return None;
    }
    Some(props.local_transform().map_rect(bounds).unwrap_or(MAX_DAMAGE))
}

impl NodeStore {
    /// Runs one sync pass from `root`, accumulating damage into `damage`.
    ///
    /// Every node reached is pulsed at the context's frame time exactly once
    /// per frame. In [`SyncMode::Full`] the pass also promotes staged
    /// properties and content and commits tree-membership changes; damage is
    /// recorded under both the pre- and post-promotion geometry of every
    /// changed node.
    ///
    /// A node reached twice in one pass sits in a shared subtree whose
    /// screen positions cannot be told apart, so it contributes the maximal
    /// damage extent instead.
    pub fn prepare_tree(
        &mut self,
        root: NodeHandle,
        mode: SyncMode,
        damage: &mut DamageAccumulator,
        ctx: &mut AnimationContext,
        observer: &mut dyn TreeObserver,
    ) {
        let _ = self.node(root);
        self.sync_seq += 1;
        self.prepare_node(root, mode, damage, ctx, observer);
    }

    fn prepare_node(
        &mut self,
        handle: NodeHandle,
        mode: SyncMode,
        damage: &mut DamageAccumulator,
        ctx: &mut AnimationContext,
        observer: &mut dyn TreeObserver,
    ) {
        let seq = self.sync_seq;
        let frame_time = ctx.frame_time();
        let full = mode == SyncMode::Full;

        let old_extent = {
            let node = self.node_mut(handle);
            if node.last_visit == seq {
                // Shared subtree: the same node under two committed parents.
                damage.dirty(MAX_DAMAGE);
                return;
            }
            node.last_visit = seq;
            committed_extent(&node.properties)
        };

        // Promote staged properties and pulse animators. Animator staging is
        // promoted on every pulse so lifecycle requests take effect even on
        // consumer-only frames; property staging waits for a full sync.
        let mut changed = DirtyFields::empty();
        {
            let Self { slots, cells, .. } = self;
            let node = slots[handle.idx as usize].as_mut().expect("live slot");
            if full && !node.dirty.is_empty() {
                changed |= node.dirty;
                node.properties = node.staging_properties;
            }
            if node.last_pulse != Some(frame_time) {
                node.last_pulse = Some(frame_time);
                changed |= node.animators.push_staging(
                    node.id,
                    frame_time,
                    &mut node.properties,
                    cells,
                    &mut ctx.finished,
                );
                changed |= node.animators.animate(
                    node.id,
                    frame_time,
                    &mut node.properties,
                    cells,
                    &mut ctx.finished,
                );
            }
        }

        if !changed.is_empty() {
            // Old geometry, recorded in the parent's frame: the pixels the
            // node may have covered before this pass.
            if let Some(old) = old_extent {
                damage.dirty(old);
            }
        }

        let (info, bounds) = {
            let node = self.node(handle);
            (node.properties.damage_info(), node.properties.bounds())
        };
        damage.push_transform(info);
        if !changed.is_empty() {
            damage.dirty(bounds);
        }

        if full {
            self.promote_content(handle, ctx, observer);
            self.node_mut(handle).dirty = DirtyFields::empty();
        }

        let children: SmallVec<[NodeHandle; 8]> = self.node(handle).content.children().collect();
        for child in children {
            self.prepare_node(child, mode, damage, ctx, observer);
        }

        damage.pop_transform();
    }

    /// Commits the staged content list, updating tree membership.
    ///
    /// New children gain their parent reference before old children lose
    /// theirs, so a child present in both lists never transits through zero.
    fn promote_content(
        &mut self,
        handle: NodeHandle,
        ctx: &mut AnimationContext,
        observer: &mut dyn TreeObserver,
    ) {
        let Some(new) = self.node_mut(handle).staging_content.take() else {
            return;
        };
        for child in new.children() {
            self.node_mut(child).parent_ref_count += 1;
        }
        let old = mem::replace(&mut self.node_mut(handle).content, new);
        for child in old.children() {
            self.dec_parent_ref_sync(child, ctx, observer);
            self.dec_list_ref_sync(child, ctx, observer);
        }
    }

    fn dec_parent_ref_sync(
        &mut self,
        handle: NodeHandle,
        ctx: &mut AnimationContext,
        observer: &mut dyn TreeObserver,
    ) {
        let Self { slots, cells, .. } = self;
        let node = slots[handle.idx as usize].as_mut().expect("live slot");
        assert!(node.parent_ref_count > 0, "parent ref underflow");
        node.parent_ref_count -= 1;
        if node.parent_ref_count == 0 {
            // Left the tree: report it, force-finish its animators, and drop
            // consumer-side resources. The node itself may survive through
            // external references.
            observer.on_node_possibly_detached(node.id);
            let _ = node.animators.force_end_all(
                node.id,
                &mut node.properties,
                cells,
                &mut ctx.finished,
            );
            node.has_backend_layer = false;
        }
    }

    fn dec_list_ref_sync(
        &mut self,
        handle: NodeHandle,
        ctx: &mut AnimationContext,
        observer: &mut dyn TreeObserver,
    ) {
        let node = self.node_mut(handle);
        assert!(node.external_ref_count > 0, "external ref underflow");
        node.external_ref_count -= 1;
        if node.external_ref_count == 0 && node.parent_ref_count == 0 {
            self.destroy_sync(handle, ctx, observer);
        }
    }

    /// Frees a node during a sync pass, recursively releasing its subtree.
    /// Unlike producer-side destruction, live animators are force-finished
    /// rather than fatal, since the consumer owns teardown here.
    fn destroy_sync(
        &mut self,
        handle: NodeHandle,
        ctx: &mut AnimationContext,
        observer: &mut dyn TreeObserver,
    ) {
        let idx = handle.idx as usize;
        let mut node = self.slots[idx].take().expect("live slot");
        let _ = node.animators.force_end_all(
            node.id,
            &mut node.properties,
            &mut self.cells,
            &mut ctx.finished,
        );
        self.free_slot(handle.idx);
        for child in node.content.children() {
            self.dec_parent_ref_sync(child, ctx, observer);
            self.dec_list_ref_sync(child, ctx, observer);
        }
        if let Some(staged) = node.staging_content.take() {
            for child in staged.children() {
                self.dec_list_ref_sync(child, ctx, observer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::animation::{
        AnimationListener, AnimationTarget, Animator, AnimatorId, Interpolator, StagingRequest,
    };
    use crate::clock::ManualClock;
    use crate::node::{Content, NodeField};
    use crate::time::Duration;

    struct Fixture {
        store: NodeStore,
        ctx: AnimationContext,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: NodeStore::new(),
                ctx: AnimationContext::new(),
                clock: ManualClock::default(),
            }
        }

        /// One full frame: sync from `root`, finish off-tree animations, and
        /// return the accumulated damage.
        fn frame(&mut self, root: NodeHandle, mode: SyncMode) -> Rect {
            self.frame_observed(root, mode, &mut NullObserver)
        }

        fn frame_observed(
            &mut self,
            root: NodeHandle,
            mode: SyncMode,
            observer: &mut dyn TreeObserver,
        ) -> Rect {
            let mut damage = DamageAccumulator::new();
            self.ctx.start_frame(&self.clock);
            self.store.prepare_tree(root, mode, &mut damage, &mut self.ctx, observer);
            self.ctx.run_remaining_animations(&mut self.store);
            damage.finish()
        }

        fn attach(&mut self, parent: NodeHandle, child: NodeHandle) {
            let mut content = Content::new();
            content.push_child(child);
            self.store.set_content(parent, content);
        }
    }

    #[derive(Default)]
    struct Detachments(Vec<NodeId>);

    impl TreeObserver for Detachments {
        fn on_node_possibly_detached(&mut self, node: NodeId) {
            self.0.push(node);
        }
    }

    #[test]
    fn full_sync_damages_old_and_new_extents() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        fx.store.set_size(root, 800.0, 600.0);
        fx.store.set_size(child, 10.0, 10.0);
        fx.attach(root, child);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(16);
        fx.store.set_position(child, 100.0, 100.0);
        let damage = fx.frame(root, SyncMode::Full);
        // Old extent (0,0)-(10,10) plus new extent (100,100)-(110,110).
        assert_eq!(damage, Rect::new(0.0, 0.0, 110.0, 110.0));
    }

    #[test]
    fn consumer_only_leaves_staging_pending() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        fx.store.set_size(root, 100.0, 100.0);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(16);
        fx.store.set_position(root, 50.0, 50.0);
        let damage = fx.frame(root, SyncMode::ConsumerOnly);
        assert_eq!(damage, Rect::ZERO, "staging not promoted, nothing moved");
        assert_eq!(fx.store.properties(root).x, 0.0);
        assert!(fx.store.dirty_fields(root).contains(DirtyFields::TRANSLATION));

        fx.clock.advance_millis(16);
        let damage = fx.frame(root, SyncMode::Full);
        assert_eq!(fx.store.properties(root).x, 50.0);
        assert!(damage.area() > 0.0);
    }

    #[test]
    fn clean_sync_produces_no_damage() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        fx.store.set_size(root, 800.0, 600.0);
        fx.store.set_size(child, 40.0, 40.0);
        fx.attach(root, child);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(16);
        assert_eq!(fx.frame(root, SyncMode::Full), Rect::ZERO);
    }

    #[test]
    fn zero_alpha_subtree_contributes_nothing() {
        // A change inside a fully transparent subtree produces no visible
        // damage.
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let hidden = fx.store.create_node();
        fx.store.set_size(root, 800.0, 600.0);
        fx.store.set_size(hidden, 50.0, 50.0);
        fx.store.set_alpha(hidden, 0.0);
        fx.attach(root, hidden);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(16);
        fx.store.set_position(hidden, 200.0, 200.0);
        assert_eq!(fx.frame(root, SyncMode::Full), Rect::ZERO);
    }

    #[test]
    fn becoming_transparent_damages_old_extent() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        fx.store.set_size(root, 800.0, 600.0);
        fx.store.set_size(child, 30.0, 30.0);
        fx.attach(root, child);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(16);
        fx.store.set_alpha(child, 0.0);
        let damage = fx.frame(root, SyncMode::Full);
        assert_eq!(damage, Rect::new(0.0, 0.0, 30.0, 30.0), "vanishing pixels repaint");
    }

    #[test]
    fn animator_damage_tracks_movement() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        fx.store.set_size(root, 800.0, 600.0);
        fx.store.set_size(child, 10.0, 10.0);
        fx.attach(root, child);

        let mut a = Animator::new(AnimationTarget::Node(NodeField::TranslationX), 100.0)
            .with_duration(Duration::from_millis(100))
            .with_interpolator(Interpolator::Linear);
        a.request(StagingRequest::Start);
        fx.store.add_animator(&mut fx.ctx, child, a);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(50);
        let damage = fx.frame(root, SyncMode::ConsumerOnly);
        assert_eq!(fx.store.properties(child).x, 50.0);
        // Old extent at x=0 plus the new extent at x=50.
        assert_eq!(damage, Rect::new(0.0, 0.0, 60.0, 10.0));
    }

    #[test]
    fn shared_child_degrades_to_maximal_damage() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let left = fx.store.create_node();
        let right = fx.store.create_node();
        let shared = fx.store.create_node();
        fx.store.set_size(root, 800.0, 600.0);
        fx.store.set_size(left, 800.0, 600.0);
        fx.store.set_size(right, 800.0, 600.0);
        fx.store.set_size(shared, 10.0, 10.0);
        fx.attach(left, shared);
        fx.attach(right, shared);
        let mut content = Content::new();
        content.push_child(left);
        content.push_child(right);
        fx.store.set_content(root, content);

        fx.store.set_position(shared, 5.0, 5.0);
        let damage = fx.frame(root, SyncMode::Full);
        // The maximal extent, clipped down to the enclosing bounds.
        assert_eq!(damage, Rect::new(0.0, 0.0, 800.0, 600.0), "conservative fallback");
    }

    #[test]
    fn detach_reports_and_force_finishes() {
        // Scenario: remove an animating child from its parent's content.
        #[derive(Default)]
        struct Recorder(Vec<(NodeId, AnimatorId)>);
        impl AnimationListener for Recorder {
            fn on_animator_finished(&mut self, node: NodeId, animator: AnimatorId) {
                self.0.push((node, animator));
            }
        }

        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        fx.store.set_size(root, 800.0, 600.0);
        fx.attach(root, child);
        let mut a = Animator::new(AnimationTarget::Node(NodeField::TranslationX), 100.0)
            .with_duration(Duration::from_millis(1000))
            .with_interpolator(Interpolator::Linear);
        a.request(StagingRequest::Start);
        let id = fx.store.add_animator(&mut fx.ctx, child, a);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(16);
        fx.store.set_content(root, Content::new());
        let mut detached = Detachments::default();
        let _ = fx.frame_observed(root, SyncMode::Full, &mut detached);

        assert_eq!(detached.0, alloc::vec![fx.store.id(child)]);
        assert!(fx.store.is_alive(child), "still externally retained");
        assert_eq!(fx.store.properties(child).x, 100.0, "jumped to final value");
        assert!(!fx.store.has_animators(child));

        let mut rec = Recorder::default();
        fx.ctx.dispatch_finished(&mut rec);
        assert_eq!(rec.0, alloc::vec![(fx.store.id(child), id)]);
    }

    #[test]
    fn detach_clears_backend_layer() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        fx.attach(root, child);
        let _ = fx.frame(root, SyncMode::Full);
        fx.store.set_backend_layer(child, true);

        fx.clock.advance_millis(16);
        fx.store.set_content(root, Content::new());
        let _ = fx.frame(root, SyncMode::Full);
        assert!(!fx.store.has_backend_layer(child));
    }

    #[test]
    fn unreferenced_subtree_is_destroyed_at_sync() {
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        let grandchild = fx.store.create_node();
        fx.attach(child, grandchild);
        fx.attach(root, child);
        fx.store.release(child);
        fx.store.release(grandchild);
        let _ = fx.frame(root, SyncMode::Full);
        assert!(fx.store.is_alive(child));

        fx.clock.advance_millis(16);
        fx.store.set_content(root, Content::new());
        let _ = fx.frame(root, SyncMode::Full);
        assert!(!fx.store.is_alive(child));
        assert!(!fx.store.is_alive(grandchild));
    }

    #[test]
    fn child_kept_across_content_swap_survives() {
        // The child appears in both the old and new content lists; the new
        // list's reference lands before the old list's is dropped.
        let mut fx = Fixture::new();
        let root = fx.store.create_node();
        let child = fx.store.create_node();
        fx.attach(root, child);
        fx.store.release(child);
        let _ = fx.frame(root, SyncMode::Full);

        fx.clock.advance_millis(16);
        let mut content = Content::new();
        content.push_commands(crate::node::CommandBatch(1));
        content.push_child(child);
        fx.store.set_content(root, content);
        let _ = fx.frame(root, SyncMode::Full);
        assert!(fx.store.is_alive(child));
    }
}
