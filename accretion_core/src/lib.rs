// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained scene-graph core with staged state and damage accumulation.
//!
//! `accretion_core` keeps a tree of render nodes double-buffered between a
//! producer thread that records scene changes and a consumer thread that
//! draws them. It is `no_std` compatible (with `alloc`) and stores nodes in
//! a generational slab behind index handles.
//!
//! # Architecture
//!
//! The crate is organized around a per-frame sync pass that promotes staged
//! producer state into the committed tree and figures out what to repaint:
//!
//! ```text
//!   Producer writes ──► staging properties / content / animator requests
//!                                   │
//!           AnimationContext::start_frame(clock)
//!                                   ▼
//!   NodeStore::prepare_tree() ──► committed tree + DamageAccumulator
//!                                   │
//!           AnimationContext::run_remaining_animations()
//!                                   ▼
//!   DamageAccumulator::finish() ──► dirty rect for the backend
//! ```
//!
//! **[`node`]** — The generational node slab, double-buffered properties and
//! content under a dirty-field mask, and the sync pass itself.
//!
//! **[`damage`]** — Stack-based damage accumulation through the transform
//! hierarchy, with clipping, alpha culling, and backwards projection.
//!
//! **[`animation`]** — Per-node animators with staged lifecycle requests,
//! frame scheduling, and exactly-once completion dispatch.
//!
//! **[`transform`]** — 4x4 transform type for node positioning and rect
//! mapping.
//!
//! **[`time`]**, **[`clock`]** — Frame timestamps and the clock trait the
//! animation context snapshots each frame.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod animation;
pub mod clock;
pub mod damage;
pub mod node;
pub mod time;
pub mod transform;
