// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recorded node content: opaque command batches and child references.

use alloc::vec::Vec;

use core::fmt;

use super::id::NodeHandle;

/// An opaque reference to a recorded drawing-command batch.
///
/// Batches are recorded and replayed by the drawing backend. This core only
/// stores and swaps them; it never interprets them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBatch(pub u64);

impl fmt::Debug for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandBatch({})", self.0)
    }
}

/// One entry in a node's content list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOp {
    /// Replay an opaque command batch.
    Commands(CommandBatch),
    /// Draw a child node at this point in the list.
    Node(NodeHandle),
}

/// A node's recorded content: an ordered list of command batches and child
/// references.
///
/// Children referenced here are owned by live parent edges; the tree-sync
/// driver adjusts reference counts whenever a staging content list is
/// promoted.
#[derive(Clone, Debug, Default)]
pub struct Content {
    /// Ordered draw operations.
    pub ops: Vec<DrawOp>,
}

impl Content {
    /// An empty content list.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Appends an opaque command batch.
    pub fn push_commands(&mut self, batch: CommandBatch) {
        self.ops.push(DrawOp::Commands(batch));
    }

    /// Appends a child reference.
    pub fn push_child(&mut self, child: NodeHandle) {
        self.ops.push(DrawOp::Node(child));
    }

    /// Whether the list has no operations at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates the referenced children in content order.
    pub fn children(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Node(h) => Some(*h),
            DrawOp::Commands(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_skip_command_batches() {
        let a = NodeHandle {
            idx: 0,
            generation: 0,
        };
        let b = NodeHandle {
            idx: 1,
            generation: 0,
        };
        let mut content = Content::new();
        content.push_commands(CommandBatch(7));
        content.push_child(a);
        content.push_commands(CommandBatch(8));
        content.push_child(b);

        let kids: Vec<_> = content.children().collect();
        assert_eq!(kids, [a, b]);
    }
}
