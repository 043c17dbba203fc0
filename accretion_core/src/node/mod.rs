// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The retained node tree and its staging protocol.
//!
//! Every node carries two copies of its mutable state: a *staging* copy the
//! producer writes freely, and a *committed* copy the consumer draws from.
//! A sync pass ([`NodeStore::prepare_tree`]) promotes staging to committed
//! under a dirty-field mask while both sides are quiescent, so neither side
//! ever observes a half-written frame.

mod cells;
mod content;
mod id;
mod properties;
mod store;
mod sync;

pub use cells::{PaintCell, PaintField, PropertyCells};
pub use content::{CommandBatch, Content, DrawOp};
pub use id::{FloatCellId, NodeHandle, NodeId, PaintCellId};
pub use properties::{DirtyFields, NodeField, NodeProperties, RevealClip};
pub use store::NodeStore;
pub use sync::{NullObserver, SyncMode, TreeObserver};
