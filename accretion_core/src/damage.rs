// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transform-stack damage accumulation.
//!
//! The [`DamageAccumulator`] is driven by the tree-sync pass: one frame is
//! pushed per node (or explicit matrix) on the way down, dirty rectangles are
//! unioned into the innermost frame, and each pop maps the frame's pending
//! rectangle through its transform into the parent frame. After the traversal
//! unwinds, [`finish`](DamageAccumulator::finish) yields the root-space
//! dirty rectangle for the whole pass.
//!
//! Frames live in a pooled arena indexed by a depth counter, so steady-state
//! push/pop performs no allocation. The root frame is created up front and is
//! never popped; an unbalanced push/pop sequence is a programming error and
//! panics at the point of detection.
//!
//! Two cases intentionally give up precision:
//!
//! - A transform with perspective cannot map rectangles reliably, so its
//!   subtree's damage collapses to [`MAX_DAMAGE`].
//! - A node flagged as projecting backwards composites into an ancestor
//!   *projection receiver* rather than its parent; its damage is walked up
//!   through the recorded frame transforms to the nearest receiver, bypassing
//!   normal parent-chain folding (and any intermediate clips, which the
//!   projected content escapes).

use alloc::vec::Vec;

use kurbo::Rect;

use crate::transform::Transform3d;

/// Sentinel rectangle larger than any realistic output extent.
///
/// Used when exact damage cannot be computed (perspective transforms,
/// nodes visited twice in one pass).
pub const MAX_DAMAGE: Rect = Rect::new(-1e7, -1e7, 1e7, 1e7);

/// Snapshot of the committed node state the damage path reads.
///
/// Captured at push time so that popping and the backwards-projection walk
/// never need to reach back into the node store.
#[derive(Clone, Copy, Debug)]
pub struct NodeDamageInfo {
    /// The node's committed local transform, including its translation.
    pub transform: Transform3d,
    /// Local-space clip rectangle, when the node clips to its bounds.
    pub clip: Option<Rect>,
    /// Committed alpha; a fully transparent node contributes no damage.
    pub alpha: f32,
    /// Whether this node composites into an ancestor projection receiver.
    pub projects_backwards: bool,
    /// Whether this node receives backwards-projected descendants.
    pub is_projection_receiver: bool,
}

impl NodeDamageInfo {
    /// An opaque, unclipped, non-projecting node with the given transform.
    #[must_use]
    pub const fn with_transform(transform: Transform3d) -> Self {
        Self {
            transform,
            clip: None,
            alpha: 1.0,
            projects_backwards: false,
            is_projection_receiver: false,
        }
    }
}

/// What maps a frame's pending rectangle into its parent's space.
#[derive(Clone, Copy, Debug)]
enum TransformSource {
    /// The root frame; pending rectangles are already in root space.
    Root,
    /// An explicit matrix with no node semantics (no clip, no alpha).
    Matrix(Transform3d),
    /// A node's snapshotted damage-relevant state.
    Node(NodeDamageInfo),
}

/// One entry in the transform stack.
#[derive(Clone, Copy, Debug)]
struct DamageFrame {
    source: TransformSource,
    /// Pending dirty rectangle in this frame's local space. A degenerate
    /// rectangle (non-positive area) means "nothing dirty yet".
    pending: Rect,
}

fn is_empty(r: &Rect) -> bool {
    r.x1 <= r.x0 || r.y1 <= r.y0
}

fn union_into(dst: &mut Rect, src: Rect) {
    if is_empty(&src) {
        return;
    }
    if is_empty(dst) {
        *dst = src;
    } else {
        *dst = dst.union(src);
    }
}

/// Stack-based accumulator composing active transforms and folding dirty
/// rectangles outward as the tree unwinds.
#[derive(Debug)]
pub struct DamageAccumulator {
    /// Pooled frame arena; `frames[..=depth]` are active.
    frames: Vec<DamageFrame>,
    depth: usize,
}

impl Default for DamageAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl DamageAccumulator {
    /// Creates an accumulator holding a fresh root frame.
    #[must_use]
    pub fn new() -> Self {
        let mut frames = Vec::with_capacity(16);
        frames.push(DamageFrame {
            source: TransformSource::Root,
            pending: Rect::ZERO,
        });
        Self { frames, depth: 0 }
    }

    /// Opens a new frame for a node, snapshotting its damage-relevant state.
    pub fn push_transform(&mut self, info: NodeDamageInfo) {
        self.push_frame(TransformSource::Node(info));
    }

    /// Opens a new frame for an explicit matrix.
    pub fn push_matrix(&mut self, matrix: Transform3d) {
        self.push_frame(TransformSource::Matrix(matrix));
    }

    fn push_frame(&mut self, source: TransformSource) {
        self.depth += 1;
        if self.depth < self.frames.len() {
            // Reuse a pooled frame.
            self.frames[self.depth] = DamageFrame {
                source,
                pending: Rect::ZERO,
            };
        } else {
            self.frames.push(DamageFrame {
                source,
                pending: Rect::ZERO,
            });
        }
    }

    /// Unions a rectangle into the innermost frame's pending damage.
    pub fn dirty(&mut self, rect: Rect) {
        union_into(&mut self.frames[self.depth].pending, rect);
    }

    /// Current stack depth, excluding the root frame.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Closes the innermost frame, folding its pending damage into the
    /// parent frame's coordinate space.
    ///
    /// # Panics
    ///
    /// Panics if only the root frame remains; pushes and pops must balance
    /// within a traversal level.
    pub fn pop_transform(&mut self) {
        assert!(self.depth > 0, "unbalanced damage stack: pop of root frame");
        let frame = self.frames[self.depth];
        self.depth -= 1;

        if is_empty(&frame.pending) {
            return;
        }

        match frame.source {
            TransformSource::Root => unreachable!("root frame is never popped"),
            TransformSource::Matrix(m) => {
                let mapped = m.map_rect(frame.pending).unwrap_or(MAX_DAMAGE);
                union_into(&mut self.frames[self.depth].pending, mapped);
            }
            TransformSource::Node(info) => self.pop_node_frame(&info, frame.pending),
        }
    }

    fn pop_node_frame(&mut self, info: &NodeDamageInfo, mut pending: Rect) {
        if info.alpha <= 0.0 {
            return;
        }
        if let Some(clip) = info.clip {
            pending = pending.intersect(clip);
            if is_empty(&pending) {
                return;
            }
        }

        let mapped = match info.transform.map_rect(pending) {
            Some(r) => r,
            None => {
                log::warn!("perspective transform in damage path; using maximal damage");
                MAX_DAMAGE
            }
        };

        if info.projects_backwards {
            self.project_to_receiver(mapped);
        } else {
            union_into(&mut self.frames[self.depth].pending, mapped);
        }
    }

    /// Walks `rect` up through the recorded frame transforms to the nearest
    /// projection receiver (or the root, if none), unioning it there.
    fn project_to_receiver(&mut self, mut rect: Rect) {
        let mut i = self.depth;
        loop {
            match self.frames[i].source {
                TransformSource::Node(ancestor) if ancestor.is_projection_receiver => break,
                TransformSource::Root => break,
                TransformSource::Node(ancestor) => {
                    rect = ancestor.transform.map_rect(rect).unwrap_or(MAX_DAMAGE);
                }
                TransformSource::Matrix(m) => {
                    rect = m.map_rect(rect).unwrap_or(MAX_DAMAGE);
                }
            }
            i -= 1;
        }
        union_into(&mut self.frames[i].pending, rect);
    }

    /// Returns the root frame's accumulated damage rounded out to integer
    /// bounds, then clears it for the next pass.
    ///
    /// # Panics
    ///
    /// Panics if any non-root frame is still open.
    pub fn finish(&mut self) -> Rect {
        assert!(
            self.depth == 0,
            "unbalanced damage stack: {} frame(s) still open at finish",
            self.depth
        );
        let pending = self.frames[0].pending;
        self.frames[0].pending = Rect::ZERO;
        if is_empty(&pending) {
            Rect::ZERO
        } else {
            pending.expand()
        }
    }
}
