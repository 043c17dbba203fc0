// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Consumer-driven property animation.
//!
//! Animators live on the consumer side of the staging protocol: producers
//! attach them and buffer lifecycle requests, and the sync pass promotes
//! both before each frame's pulse. An [`AnimationContext`] keeps the set of
//! nodes owed a pulse per frame, including nodes currently detached from the
//! visible tree.

mod animator;
mod context;
mod manager;

pub use animator::{
    AnimationTarget, Animator, AnimatorId, FinishedAnimation, Interpolator, PlayState,
    StagingRequest,
};
pub use context::{AnimationContext, AnimationListener};
pub use manager::AnimatorManager;
