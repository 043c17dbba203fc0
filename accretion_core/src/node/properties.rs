// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry and paint properties, double-buffered per node.
//!
//! Every node carries two independent [`NodeProperties`] values: a *staging*
//! copy written by the producer and a *committed* copy read by the consumer.
//! The tree-sync driver is the only code that copies staging into committed,
//! guided by the per-node [`DirtyFields`] mask. Animators also write the
//! committed copy, but only from the consumer side during a frame pulse.

use bitflags::bitflags;
use kurbo::Rect;

use crate::damage::NodeDamageInfo;
use crate::transform::Transform3d;

bitflags! {
    /// Which property fields changed since the last full sync.
    ///
    /// Produced by producer-side setters and by animator pulses; consumed by
    /// the tree-sync driver to damage exactly the affected geometry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct DirtyFields: u16 {
        /// `x` or `y` changed.
        const TRANSLATION = 1 << 0;
        /// `width` or `height` changed.
        const BOUNDS = 1 << 1;
        /// `alpha` changed.
        const ALPHA = 1 << 2;
        /// The transform matrix changed.
        const TRANSFORM = 1 << 3;
        /// `translation_z` (elevation) changed.
        const ELEVATION = 1 << 4;
        /// Clip-to-bounds changed.
        const CLIP = 1 << 5;
        /// The reveal clip changed.
        const REVEAL = 1 << 6;
        /// Projection flags changed.
        const PROJECTION = 1 << 7;
        /// The staging content list was re-recorded.
        const DISPLAY_LIST = 1 << 8;
        /// Animated scalar inputs of recorded commands changed.
        const CONTENT_VALUES = 1 << 9;
    }
}

/// A circular reveal clip, animated by reveal animators.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevealClip {
    /// Center x in local coordinates.
    pub center_x: f32,
    /// Center y in local coordinates.
    pub center_y: f32,
    /// Current radius.
    pub radius: f32,
}

/// One copy of a node's geometry and paint state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeProperties {
    /// Horizontal translation relative to the parent.
    pub x: f64,
    /// Vertical translation relative to the parent.
    pub y: f64,
    /// Local width; the node's bounds are `(0, 0, width, height)`.
    pub width: f64,
    /// Local height.
    pub height: f64,
    /// Opacity in `[0, 1]`. Zero short-circuits damage and drawing.
    pub alpha: f32,
    /// Whether drawing and damage are clipped to the node's bounds.
    pub clip_to_bounds: bool,
    /// Optional transform applied after the `(x, y)` translation.
    pub transform: Option<Transform3d>,
    /// Elevation; drives sibling draw order (negative z draws first).
    pub translation_z: f32,
    /// Optional circular reveal clip.
    pub reveal_clip: Option<RevealClip>,
    /// This node composites into an ancestor projection receiver.
    pub projects_backwards: bool,
    /// This node receives backwards-projected descendants.
    pub is_projection_receiver: bool,
}

impl Default for NodeProperties {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            alpha: 1.0,
            clip_to_bounds: true,
            transform: None,
            translation_z: 0.0,
            reveal_clip: None,
            projects_backwards: false,
            is_projection_receiver: false,
        }
    }
}

impl NodeProperties {
    /// The node's local bounds.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// The full local-to-parent transform: translation composed with the
    /// optional matrix.
    #[must_use]
    pub fn local_transform(&self) -> Transform3d {
        let translation = Transform3d::from_translation(self.x, self.y);
        match self.transform {
            Some(m) => translation * m,
            None => translation,
        }
    }

    /// Snapshots the state the damage accumulator needs for this node.
    #[must_use]
    pub fn damage_info(&self) -> NodeDamageInfo {
        NodeDamageInfo {
            transform: self.local_transform(),
            clip: self.clip_to_bounds.then(|| self.bounds()),
            alpha: self.alpha,
            projects_backwards: self.projects_backwards,
            is_projection_receiver: self.is_projection_receiver,
        }
    }
}

/// An animatable scalar field of a node's committed properties.
///
/// Reads and writes go through a single `match` rather than per-field
/// virtual dispatch, keeping the per-frame hot path branch-predictable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeField {
    /// Horizontal translation.
    TranslationX,
    /// Vertical translation.
    TranslationY,
    /// Elevation.
    TranslationZ,
    /// Opacity.
    Alpha,
}

impl NodeField {
    /// Reads the current value of this field.
    #[must_use]
    pub fn get(self, props: &NodeProperties) -> f32 {
        #[allow(clippy::cast_possible_truncation)]
        match self {
            Self::TranslationX => props.x as f32,
            Self::TranslationY => props.y as f32,
            Self::TranslationZ => props.translation_z,
            Self::Alpha => props.alpha,
        }
    }

    /// Writes `value` to this field, returning the dirty bit it affects.
    pub fn set(self, props: &mut NodeProperties, value: f32) -> DirtyFields {
        match self {
            Self::TranslationX => {
                props.x = f64::from(value);
                DirtyFields::TRANSLATION
            }
            Self::TranslationY => {
                props.y = f64::from(value);
                DirtyFields::TRANSLATION
            }
            Self::TranslationZ => {
                props.translation_z = value;
                DirtyFields::ELEVATION
            }
            Self::Alpha => {
                props.alpha = value;
                DirtyFields::ALPHA
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_properties_are_opaque_and_clipped() {
        let p = NodeProperties::default();
        assert_eq!(p.alpha, 1.0);
        assert!(p.clip_to_bounds);
        assert_eq!(p.bounds(), Rect::ZERO);
    }

    #[test]
    fn local_transform_composes_translation_and_matrix() {
        let mut p = NodeProperties::default();
        p.x = 10.0;
        p.y = 20.0;
        p.transform = Some(Transform3d::from_scale(2.0, 2.0));
        let mapped = p
            .local_transform()
            .map_rect(Rect::new(0.0, 0.0, 1.0, 1.0))
            .unwrap();
        // Scale applies in local space, then the translation.
        assert_eq!(mapped, Rect::new(10.0, 20.0, 12.0, 22.0));
    }

    #[test]
    fn damage_info_reflects_clip_and_alpha() {
        let mut p = NodeProperties::default();
        p.width = 100.0;
        p.height = 50.0;
        p.alpha = 0.5;
        let info = p.damage_info();
        assert_eq!(info.clip, Some(Rect::new(0.0, 0.0, 100.0, 50.0)));
        assert_eq!(info.alpha, 0.5);

        p.clip_to_bounds = false;
        assert_eq!(p.damage_info().clip, None);
    }

    #[test]
    fn node_field_round_trip() {
        let mut p = NodeProperties::default();
        for field in [
            NodeField::TranslationX,
            NodeField::TranslationY,
            NodeField::TranslationZ,
            NodeField::Alpha,
        ] {
            let dirty = field.set(&mut p, 0.25);
            assert!(!dirty.is_empty(), "every field maps to a dirty bit");
            assert_eq!(field.get(&p), 0.25);
        }
    }

}
