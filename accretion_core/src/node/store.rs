// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slab storage for render nodes.
//!
//! Nodes live in a generational slab: a [`NodeHandle`] is a slot index plus a
//! generation counter, and every access validates the generation so a stale
//! handle panics instead of silently reading a reused slot. Alongside the
//! handle each node carries a [`NodeId`], allocated from a never-reused
//! counter, for identity that survives slot reuse (logging, completion
//! events, external maps).
//!
//! All producer-facing setters write the *staging* copy of a node and mark
//! the matching [`DirtyFields`] bit; committed state only changes during a
//! sync pass or an animator pulse.

use alloc::vec::Vec;

use core::sync::atomic::{AtomicU64, Ordering};

use crate::animation::{
    AnimationContext, Animator, AnimatorId, AnimatorManager, FinishedAnimation, StagingRequest,
};
use crate::node::{
    Content, DirtyFields, FloatCellId, NodeHandle, NodeId, NodeProperties, PaintCell, PaintCellId,
    PropertyCells, RevealClip,
};
use crate::time::FrameTime;
use crate::transform::Transform3d;

/// One node's full double-buffered state.
#[derive(Debug)]
pub(crate) struct RenderNode {
    pub(crate) id: NodeId,
    /// Producer-owned property copy.
    pub(crate) staging_properties: NodeProperties,
    /// Consumer-owned property copy; what drawing and damage read.
    pub(crate) properties: NodeProperties,
    /// Replacement content, pending promotion. `None` means "keep current".
    pub(crate) staging_content: Option<Content>,
    pub(crate) content: Content,
    /// Which staging fields differ from committed state.
    pub(crate) dirty: DirtyFields,
    /// Occurrences in committed content lists.
    pub(crate) parent_ref_count: u32,
    /// Producer handles plus occurrences in any content list at all.
    pub(crate) external_ref_count: u32,
    pub(crate) animators: AnimatorManager,
    /// Consumer-side cached layer (e.g. a GPU texture) is attached.
    pub(crate) has_backend_layer: bool,
    /// Sync pass that last reached this node, for shared-subtree detection.
    pub(crate) last_visit: u64,
    /// Frame time of the last animator pulse, so off-tree pulsing skips
    /// nodes the traversal already advanced this frame.
    pub(crate) last_pulse: Option<FrameTime>,
    /// Already queued in the animation context's frame lists.
    pub(crate) in_animation_list: bool,
}

impl RenderNode {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            staging_properties: NodeProperties::default(),
            properties: NodeProperties::default(),
            staging_content: None,
            content: Content::new(),
            dirty: DirtyFields::empty(),
            parent_ref_count: 0,
            external_ref_count: 1,
            animators: AnimatorManager::default(),
            has_backend_layer: false,
            last_visit: 0,
            last_pulse: None,
            in_animation_list: false,
        }
    }
}

/// Owns every node of one scene plus the shared property-cell arenas.
#[derive(Debug, Default)]
pub struct NodeStore {
    pub(crate) slots: Vec<Option<RenderNode>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    pub(crate) cells: PropertyCells,
    /// Never-reused id counters. Atomic so allocation order is well defined
    /// even if id handout ever moves off the owning thread.
    next_node_id: AtomicU64,
    next_animator_id: AtomicU64,
    /// Bumped once per sync pass.
    pub(crate) sync_seq: u64,
}

impl NodeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether no nodes are alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `handle` still refers to a live node.
    #[must_use]
    pub fn is_alive(&self, handle: NodeHandle) -> bool {
        let idx = handle.idx as usize;
        idx < self.generations.len()
            && self.generations[idx] == handle.generation
            && self.slots[idx].is_some()
    }

    /// Panics on a stale or foreign handle; returns the slot index.
    fn validate(&self, handle: NodeHandle) -> usize {
        assert!(self.is_alive(handle), "stale {handle:?}");
        handle.idx as usize
    }

    pub(crate) fn node(&self, handle: NodeHandle) -> &RenderNode {
        let idx = self.validate(handle);
        self.slots[idx].as_ref().expect("validated slot")
    }

    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> &mut RenderNode {
        let idx = self.validate(handle);
        self.slots[idx].as_mut().expect("validated slot")
    }

    /// Creates a node with default properties, empty content, and one
    /// external reference held by the caller.
    pub fn create_node(&mut self) -> NodeHandle {
        let id = NodeId(self.next_node_id.fetch_add(1, Ordering::Relaxed) + 1);
        let node = RenderNode::new(id);
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(node);
            NodeHandle {
                idx,
                generation: self.generations[idx as usize],
            }
        } else {
            let idx = u32::try_from(self.slots.len()).expect("node slab overflow");
            self.slots.push(Some(node));
            self.generations.push(0);
            NodeHandle { idx, generation: 0 }
        }
    }

    /// The node's never-reused identity.
    #[must_use]
    pub fn id(&self, handle: NodeHandle) -> NodeId {
        self.node(handle).id
    }

    /// Takes an additional external reference on the node.
    pub fn retain(&mut self, handle: NodeHandle) {
        self.node_mut(handle).external_ref_count += 1;
    }

    /// Drops one external reference.
    ///
    /// When the last reference of either kind goes away the node is
    /// destroyed, recursively releasing the children its content lists were
    /// keeping alive. Destroying a node that still has animators attached or
    /// a backend layer cached is a producer bug and panics.
    pub fn release(&mut self, handle: NodeHandle) {
        let idx = self.validate(handle);
        self.dec_external(idx);
    }

    /// Returns a freed slot to the free list, invalidating outstanding
    /// handles to it.
    pub(crate) fn free_slot(&mut self, idx: u32) {
        self.generations[idx as usize] = self.generations[idx as usize].wrapping_add(1);
        self.free.push(idx);
    }

    fn dec_external(&mut self, idx: usize) {
        let node = self.slots[idx].as_mut().expect("live slot");
        assert!(node.external_ref_count > 0, "external ref underflow");
        node.external_ref_count -= 1;
        if node.external_ref_count == 0 && node.parent_ref_count == 0 {
            self.destroy(idx);
        }
    }

    /// Frees a node whose reference counts both reached zero.
    fn destroy(&mut self, idx: usize) {
        let node = self.slots[idx].take().expect("live slot");
        assert!(
            node.animators.is_empty(),
            "node {:?} destroyed with active animators",
            node.id
        );
        assert!(
            !node.has_backend_layer,
            "node {:?} destroyed with a live backend layer",
            node.id
        );
        self.free_slot(idx as u32);
        // Committed children were holding a parent ref and a list ref,
        // staged children only a list ref.
        for child in node.content.children() {
            let child_idx = self.validate(child);
            let n = self.slots[child_idx].as_mut().expect("live slot");
            assert!(n.parent_ref_count > 0, "parent ref underflow");
            n.parent_ref_count -= 1;
            self.dec_external(child_idx);
        }
        if let Some(staged) = &node.staging_content {
            for child in staged.children() {
                let child_idx = self.validate(child);
                self.dec_external(child_idx);
            }
        }
    }

    // Staging property setters. Each writes the producer copy and marks the
    // node dirty only when the value actually changed.

    /// Sets the node's position within its parent.
    pub fn set_position(&mut self, handle: NodeHandle, x: f64, y: f64) {
        let node = self.node_mut(handle);
        let p = &mut node.staging_properties;
        if p.x != x || p.y != y {
            p.x = x;
            p.y = y;
            node.dirty |= DirtyFields::TRANSLATION;
        }
    }

    /// Sets the node's untransformed size.
    pub fn set_size(&mut self, handle: NodeHandle, width: f64, height: f64) {
        let node = self.node_mut(handle);
        let p = &mut node.staging_properties;
        if p.width != width || p.height != height {
            p.width = width;
            p.height = height;
            node.dirty |= DirtyFields::BOUNDS;
        }
    }

    /// Sets the node's alpha in `[0, 1]`.
    pub fn set_alpha(&mut self, handle: NodeHandle, alpha: f32) {
        let node = self.node_mut(handle);
        if node.staging_properties.alpha != alpha {
            node.staging_properties.alpha = alpha;
            node.dirty |= DirtyFields::ALPHA;
        }
    }

    /// Sets or clears the node's explicit transform matrix.
    pub fn set_transform(&mut self, handle: NodeHandle, transform: Option<Transform3d>) {
        let node = self.node_mut(handle);
        if node.staging_properties.transform != transform {
            node.staging_properties.transform = transform;
            node.dirty |= DirtyFields::TRANSFORM;
        }
    }

    /// Sets the node's elevation, used for draw-order partitioning.
    pub fn set_elevation(&mut self, handle: NodeHandle, z: f32) {
        let node = self.node_mut(handle);
        if node.staging_properties.translation_z != z {
            node.staging_properties.translation_z = z;
            node.dirty |= DirtyFields::ELEVATION;
        }
    }

    /// Sets whether the node clips its own output to its bounds.
    pub fn set_clip_to_bounds(&mut self, handle: NodeHandle, clip: bool) {
        let node = self.node_mut(handle);
        if node.staging_properties.clip_to_bounds != clip {
            node.staging_properties.clip_to_bounds = clip;
            node.dirty |= DirtyFields::CLIP;
        }
    }

    /// Sets or clears the node's circular reveal clip.
    pub fn set_reveal_clip(&mut self, handle: NodeHandle, reveal: Option<RevealClip>) {
        let node = self.node_mut(handle);
        if node.staging_properties.reveal_clip != reveal {
            node.staging_properties.reveal_clip = reveal;
            node.dirty |= DirtyFields::REVEAL;
        }
    }

    /// Marks the node as projecting its damage backwards onto the nearest
    /// enclosing projection receiver.
    pub fn set_projects_backwards(&mut self, handle: NodeHandle, projects: bool) {
        let node = self.node_mut(handle);
        if node.staging_properties.projects_backwards != projects {
            node.staging_properties.projects_backwards = projects;
            node.dirty |= DirtyFields::PROJECTION;
        }
    }

    /// Marks the node as a projection receiver.
    pub fn set_projection_receiver(&mut self, handle: NodeHandle, receives: bool) {
        let node = self.node_mut(handle);
        if node.staging_properties.is_projection_receiver != receives {
            node.staging_properties.is_projection_receiver = receives;
            node.dirty |= DirtyFields::PROJECTION;
        }
    }

    /// Replaces the node's staged content list.
    ///
    /// The list takes a keep-alive reference on every child it names, held
    /// until the list itself is replaced or destroyed.
    pub fn set_content(&mut self, handle: NodeHandle, content: Content) {
        for child in content.children() {
            let idx = self.validate(child);
            self.slots[idx].as_mut().expect("live slot").external_ref_count += 1;
        }
        let old = {
            let node = self.node_mut(handle);
            node.dirty |= DirtyFields::DISPLAY_LIST;
            node.staging_content.replace(content)
        };
        if let Some(old) = old {
            for child in old.children() {
                let idx = self.validate(child);
                self.dec_external(idx);
            }
        }
    }

    /// The committed properties, as the consumer sees them.
    #[must_use]
    pub fn properties(&self, handle: NodeHandle) -> &NodeProperties {
        &self.node(handle).properties
    }

    /// The staged properties, as the producer last wrote them.
    #[must_use]
    pub fn staging_properties(&self, handle: NodeHandle) -> &NodeProperties {
        &self.node(handle).staging_properties
    }

    /// The committed content list.
    #[must_use]
    pub fn content(&self, handle: NodeHandle) -> &Content {
        &self.node(handle).content
    }

    /// The staging dirty mask (which producer writes await promotion).
    #[must_use]
    pub fn dirty_fields(&self, handle: NodeHandle) -> DirtyFields {
        self.node(handle).dirty
    }

    /// The shared property-cell arenas.
    #[must_use]
    pub fn cells(&self) -> &PropertyCells {
        &self.cells
    }

    /// Allocates a float cell for consumer-side animation of a recorded
    /// command input.
    pub fn create_float_cell(&mut self, initial: f32) -> FloatCellId {
        self.cells.create_float(initial)
    }

    /// Allocates a paint cell.
    pub fn create_paint_cell(&mut self, initial: PaintCell) -> PaintCellId {
        self.cells.create_paint(initial)
    }

    /// Marks that the consumer has a cached layer attached to this node.
    ///
    /// The flag is cleared automatically when the node leaves the tree; a
    /// node must not be destroyed while it is set.
    pub fn set_backend_layer(&mut self, handle: NodeHandle, attached: bool) {
        self.node_mut(handle).has_backend_layer = attached;
    }

    /// Whether the consumer has a cached layer attached to this node.
    #[must_use]
    pub fn has_backend_layer(&self, handle: NodeHandle) -> bool {
        self.node(handle).has_backend_layer
    }

    /// Attaches an animator to the node, assigning its id.
    ///
    /// The animator is staged until the next sync. The node joins the
    /// animation context's next-frame list the first time it gains an
    /// animator while holding none.
    pub fn add_animator(
        &mut self,
        ctx: &mut AnimationContext,
        handle: NodeHandle,
        mut animator: Animator,
    ) -> AnimatorId {
        let id = AnimatorId(self.next_animator_id.fetch_add(1, Ordering::Relaxed) + 1);
        animator.id = id;
        let node = self.node_mut(handle);
        node.animators.add(animator);
        if !node.in_animation_list {
            node.in_animation_list = true;
            ctx.schedule(handle);
        }
        id
    }

    /// Detaches an animator without firing its completion listener.
    pub fn remove_animator(&mut self, handle: NodeHandle, id: AnimatorId) {
        self.node_mut(handle).animators.remove(id);
    }

    /// Buffers a lifecycle request on one of the node's animators, to take
    /// effect at the next sync. Returns whether the animator was found.
    pub fn request_animator(
        &mut self,
        handle: NodeHandle,
        id: AnimatorId,
        request: StagingRequest,
    ) -> bool {
        self.node_mut(handle).animators.request(id, request)
    }

    /// Whether the node has any animators attached, staged or active.
    #[must_use]
    pub fn has_animators(&self, handle: NodeHandle) -> bool {
        self.node(handle).animators.has_animators()
    }

    /// Committed drawing order of the node's children: negative elevations
    /// ascending, then zero elevations in recording order, then positive
    /// elevations ascending.
    #[must_use]
    pub fn draw_order(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let node = self.node(handle);
        let mut keyed: Vec<(f32, NodeHandle)> = node
            .content
            .children()
            .map(|child| (self.node(child).properties.translation_z, child))
            .collect();
        // Stable sort keeps recording order within equal elevations.
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        keyed.into_iter().map(|(_, child)| child).collect()
    }

    /// Pulses a node the sync traversal did not reach this frame.
    ///
    /// Promotes staged animators first, so animators on detached nodes start
    /// and advance without a sync; their writes produce no damage. Returns
    /// whether the node should stay in the animation schedule.
    pub(crate) fn pulse_off_tree(
        &mut self,
        handle: NodeHandle,
        frame_time: FrameTime,
        finished: &mut Vec<FinishedAnimation>,
    ) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        let Self { slots, cells, .. } = self;
        let node = slots[handle.idx as usize].as_mut().expect("live slot");
        if node.last_pulse != Some(frame_time) {
            node.last_pulse = Some(frame_time);
            let _ = node
                .animators
                .push_staging(node.id, frame_time, &mut node.properties, cells, finished);
            let _ = node
                .animators
                .animate(node.id, frame_time, &mut node.properties, cells, finished);
        }
        if node.animators.has_animators() {
            true
        } else {
            node.in_animation_list = false;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DrawOp;

    #[test]
    fn handles_go_stale_after_destroy() {
        let mut store = NodeStore::new();
        let a = store.create_node();
        store.release(a);
        assert!(!store.is_alive(a));

        let b = store.create_node();
        assert_eq!(b.index(), a.index(), "slot reused");
        assert!(!store.is_alive(a), "old generation stays dead");
        assert!(store.is_alive(b));
    }

    #[test]
    #[should_panic(expected = "stale NodeHandle")]
    fn stale_handle_access_panics() {
        let mut store = NodeStore::new();
        let a = store.create_node();
        store.release(a);
        let _ = store.properties(a);
    }

    #[test]
    fn node_ids_are_never_reused() {
        let mut store = NodeStore::new();
        let a = store.create_node();
        let a_id = store.id(a);
        store.release(a);
        let b = store.create_node();
        assert_ne!(store.id(b), a_id);
    }

    #[test]
    fn setters_write_staging_only() {
        let mut store = NodeStore::new();
        let n = store.create_node();
        store.set_position(n, 10.0, 20.0);
        store.set_alpha(n, 0.5);

        assert_eq!(store.staging_properties(n).x, 10.0);
        assert_eq!(store.properties(n).x, 0.0, "committed copy untouched");
        assert_eq!(
            store.dirty_fields(n),
            DirtyFields::TRANSLATION | DirtyFields::ALPHA
        );
    }

    #[test]
    fn unchanged_writes_stay_clean() {
        let mut store = NodeStore::new();
        let n = store.create_node();
        store.set_alpha(n, 1.0);
        store.set_position(n, 0.0, 0.0);
        assert!(store.dirty_fields(n).is_empty());
    }

    #[test]
    fn staged_content_keeps_children_alive() {
        let mut store = NodeStore::new();
        let parent = store.create_node();
        let child = store.create_node();

        let mut content = Content::new();
        content.push_child(child);
        store.set_content(parent, content);

        store.release(child);
        assert!(store.is_alive(child), "content list keeps the child alive");

        store.set_content(parent, Content::new());
        assert!(!store.is_alive(child), "replaced list drops it");
    }

    #[test]
    fn releasing_parent_releases_staged_children() {
        let mut store = NodeStore::new();
        let parent = store.create_node();
        let child = store.create_node();
        let mut content = Content::new();
        content.push_child(child);
        store.set_content(parent, content);
        store.release(child);

        store.release(parent);
        assert!(!store.is_alive(parent));
        assert!(!store.is_alive(child));
    }

    #[test]
    #[should_panic(expected = "destroyed with a live backend layer")]
    fn destroy_with_backend_layer_is_fatal() {
        let mut store = NodeStore::new();
        let n = store.create_node();
        store.set_backend_layer(n, true);
        store.release(n);
    }

    #[test]
    fn draw_order_partitions_by_elevation() {
        let mut store = NodeStore::new();
        let parent = store.create_node();
        let below = store.create_node();
        let a = store.create_node();
        let b = store.create_node();
        let above = store.create_node();

        // Recording order: a, above, below, b.
        let mut content = Content::new();
        content.push_child(a);
        content.push_child(above);
        content.push_child(below);
        content.push_child(b);
        store.set_content(parent, content);

        // Elevation lives in committed properties; commit directly for the
        // ordering check.
        store.node_mut(below).properties.translation_z = -4.0;
        store.node_mut(above).properties.translation_z = 2.5;
        let staged = store.node_mut(parent).staging_content.take().expect("staged");
        // Move the keep-alive refs along with the list.
        store.node_mut(parent).content = staged;

        assert_eq!(store.draw_order(parent), alloc::vec![below, a, b, above]);
    }

    #[test]
    fn content_interleaves_commands_and_children() {
        let mut store = NodeStore::new();
        let child = store.create_node();
        let mut content = Content::new();
        content.push_commands(crate::node::CommandBatch(7));
        content.push_child(child);
        assert_eq!(content.ops.len(), 2);
        assert!(matches!(content.ops[0], DrawOp::Commands(_)));
        assert_eq!(content.children().count(), 1);
    }
}
