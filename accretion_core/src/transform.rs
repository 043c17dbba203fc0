// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 transform for node positioning.
//!
//! This type covers the subset of transform math the damage path actually
//! needs (identity, multiply, perspective detection, 2-D rectangle mapping)
//! without pulling in a full linear-algebra crate. Rectangles that pass
//! through a perspective transform cannot be mapped exactly at
//! rectangle-union granularity; [`map_rect`](Transform3d::map_rect) reports
//! that case to the caller instead of producing unreliable bounds.

use core::ops::Mul;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect};

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, matching the memory layout
/// used by GPU APIs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a pure 2-D translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, 0.0, 1.0],
            ],
        }
    }

    /// Creates a non-uniform 2-D scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_z(radians: f64) -> Self {
        #[cfg(feature = "std")]
        let (s, c) = radians.sin_cos();
        #[cfg(not(feature = "std"))]
        let (s, c) = (radians.sin(), radians.cos());
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a transform with the given perspective row entries.
    ///
    /// Mostly useful in tests; real perspective transforms arrive from
    /// embedding layers that build camera matrices.
    #[inline]
    #[must_use]
    pub const fn with_perspective(mut self, px: f64, py: f64) -> Self {
        self.cols[0][3] = px;
        self.cols[1][3] = py;
        self
    }

    /// Whether this transform has a non-trivial perspective component.
    ///
    /// Such transforms cannot map rectangles to rectangles reliably; damage
    /// for them collapses to the maximal sentinel.
    #[inline]
    #[must_use]
    pub fn has_perspective(&self) -> bool {
        let c = &self.cols;
        c[0][3] != 0.0 || c[1][3] != 0.0 || c[2][3] != 0.0 || c[3][3] != 1.0
    }

    /// Whether every element is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols
            .iter()
            .all(|col| col.iter().all(|v| v.is_finite()))
    }

    /// Maps a 2-D point through this transform, ignoring z.
    #[inline]
    #[must_use]
    pub fn map_point(&self, p: Point) -> Point {
        let c = &self.cols;
        Point::new(
            c[0][0] * p.x + c[1][0] * p.y + c[3][0],
            c[0][1] * p.x + c[1][1] * p.y + c[3][1],
        )
    }

    /// Maps a rectangle through this transform, returning the axis-aligned
    /// bounding box of its four mapped corners.
    ///
    /// Returns `None` if the transform has perspective or non-finite
    /// elements; the caller must fall back to maximal damage in that case.
    #[must_use]
    pub fn map_rect(&self, r: Rect) -> Option<Rect> {
        if self.has_perspective() || !self.is_finite() {
            return None;
        }
        let corners = [
            self.map_point(Point::new(r.x0, r.y0)),
            self.map_point(Point::new(r.x1, r.y0)),
            self.map_point(Point::new(r.x0, r.y1)),
            self.map_point(Point::new(r.x1, r.y1)),
        ];
        let mut out = Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
        for p in &corners[1..] {
            out.x0 = out.x0.min(p.x);
            out.y0 = out.y0.min(p.y);
            out.x1 = out.x1.max(p.x);
            out.y1 = out.y1.max(p.y);
        }
        Some(out)
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform3d::default(), Transform3d::IDENTITY);
    }

    #[test]
    fn identity_multiply() {
        let t = Transform3d::from_translation(1.0, 2.0);
        assert_eq!(Transform3d::IDENTITY * t, t);
        assert_eq!(t * Transform3d::IDENTITY, t);
    }

    #[test]
    fn translation_composition() {
        let a = Transform3d::from_translation(1.0, 0.0);
        let b = Transform3d::from_translation(0.0, 2.0);
        let c = a * b;
        assert_eq!(c.cols[3], [1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn map_rect_translation() {
        let t = Transform3d::from_translation(10.0, 20.0);
        let r = t.map_rect(Rect::new(0.0, 0.0, 5.0, 5.0)).unwrap();
        assert_eq!(r, Rect::new(10.0, 20.0, 15.0, 25.0));
    }

    #[test]
    fn map_rect_scale() {
        let t = Transform3d::from_scale(2.0, 3.0);
        let r = t.map_rect(Rect::new(1.0, 1.0, 2.0, 2.0)).unwrap();
        assert_eq!(r, Rect::new(2.0, 3.0, 4.0, 6.0));
    }

    #[test]
    fn map_rect_rotation_bounds_all_corners() {
        let t = Transform3d::from_rotation_z(core::f64::consts::FRAC_PI_2);
        let r = t.map_rect(Rect::new(0.0, 0.0, 10.0, 4.0)).unwrap();
        let eps = 1e-9;
        // +90° maps (x, y) to (-y, x).
        assert!((r.x0 - -4.0).abs() < eps);
        assert!((r.y0 - 0.0).abs() < eps);
        assert!((r.x1 - 0.0).abs() < eps);
        assert!((r.y1 - 10.0).abs() < eps);
    }

    #[test]
    fn perspective_refuses_rect_mapping() {
        let t = Transform3d::IDENTITY.with_perspective(0.001, 0.0);
        assert!(t.has_perspective());
        assert!(t.map_rect(Rect::new(0.0, 0.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn non_finite_refuses_rect_mapping() {
        let mut t = Transform3d::IDENTITY;
        t.cols[3][0] = f64::NAN;
        assert!(t.map_rect(Rect::new(0.0, 0.0, 1.0, 1.0)).is_none());
    }
}
