// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Free-standing animatable property cells.
//!
//! Recorded command batches may reference scalar inputs (a circle radius, a
//! paint's stroke width) that animate every frame without re-recording the
//! batch. Those scalars live here, in arenas owned by the store and addressed
//! by stable indices, so animators can write them and playback can read them
//! with no shared-pointer plumbing.

use alloc::vec::Vec;

use super::id::{FloatCellId, PaintCellId};

/// Animatable scalar fields of a paint cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaintField {
    /// Stroke width.
    StrokeWidth,
    /// Paint alpha.
    Alpha,
}

/// A paint value with animatable scalar fields.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PaintCell {
    /// Current stroke width.
    pub stroke_width: f32,
    /// Current alpha.
    pub alpha: f32,
}

/// Arena of float and paint cells referenced by recorded command batches.
#[derive(Debug, Default)]
pub struct PropertyCells {
    floats: Vec<f32>,
    paints: Vec<PaintCell>,
}

impl PropertyCells {
    /// Allocates a float cell with an initial value.
    pub fn create_float(&mut self, initial: f32) -> FloatCellId {
        let id = FloatCellId(u32::try_from(self.floats.len()).expect("cell arena overflow"));
        self.floats.push(initial);
        id
    }

    /// Allocates a paint cell with an initial value.
    pub fn create_paint(&mut self, initial: PaintCell) -> PaintCellId {
        let id = PaintCellId(u32::try_from(self.paints.len()).expect("cell arena overflow"));
        self.paints.push(initial);
        id
    }

    /// Reads a float cell.
    #[must_use]
    pub fn float(&self, id: FloatCellId) -> f32 {
        self.floats[id.0 as usize]
    }

    /// Writes a float cell.
    pub fn set_float(&mut self, id: FloatCellId, value: f32) {
        self.floats[id.0 as usize] = value;
    }

    /// Reads a paint cell.
    #[must_use]
    pub fn paint(&self, id: PaintCellId) -> PaintCell {
        self.paints[id.0 as usize]
    }

    /// Reads one scalar field of a paint cell.
    #[must_use]
    pub fn paint_field(&self, id: PaintCellId, field: PaintField) -> f32 {
        let cell = self.paints[id.0 as usize];
        match field {
            PaintField::StrokeWidth => cell.stroke_width,
            PaintField::Alpha => cell.alpha,
        }
    }

    /// Writes one scalar field of a paint cell.
    pub fn set_paint_field(&mut self, id: PaintCellId, field: PaintField, value: f32) {
        let cell = &mut self.paints[id.0 as usize];
        match field {
            PaintField::StrokeWidth => cell.stroke_width = value,
            PaintField::Alpha => cell.alpha = value,
        }
    }
}
