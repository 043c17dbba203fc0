// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node identity types.

use core::fmt;

/// A handle to a node in a [`NodeStore`](super::NodeStore).
///
/// Contains both a slot index and a generation counter so that stale handles
/// are detected after a node is destroyed and its slot reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    /// Slot index into the store's arrays.
    pub(crate) idx: u32,
    /// Generation counter; must match the store's generation for this slot.
    pub(crate) generation: u32,
}

impl NodeHandle {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({}@gen{})", self.idx, self.generation)
    }
}

/// Process-unique node identity.
///
/// Ids are allocated from a monotonically increasing counter owned by the
/// store and are never reused, even when the underlying slot is. Ordering
/// carries no meaning beyond creation sequence.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Index of a free-standing float property cell owned by the store.
///
/// Cells back recorded drawing commands whose scalar inputs are animated on
/// the consumer side without re-recording the command list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FloatCellId(pub(crate) u32);

/// Index of a paint property cell (stroke width + alpha) owned by the store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PaintCellId(pub(crate) u32);
