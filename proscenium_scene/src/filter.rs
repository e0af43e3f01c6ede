// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cache filters.
//!
//! Filters run over a node's bitmap cache right after it is redrawn. They
//! only take effect on cached nodes.

use core::fmt;

use kurbo::{Affine, Rect, Shape};
use peniko::{BlendMode, Brush, Color, Compose, Mix};

use crate::graphics::PATH_TOLERANCE;
use crate::surface::{Effects, Surface};

/// Post-processing step applied to a cache surface.
pub trait Filter: fmt::Debug {
    /// Extra room the filter needs around the cached content.
    ///
    /// `x0`/`y0` are the (usually negative) offsets of the padded area and
    /// `width()`/`height()` the total growth, in cache pixels.
    fn bounds(&self) -> Option<Rect> {
        None
    }

    /// Applies the filter to the `width`×`height` region at (`x`, `y`) in
    /// device pixels. Returns whether anything was changed.
    fn apply_filter(&self, surface: &mut dyn Surface, x: u32, y: u32, width: u32, height: u32)
    -> bool;
}

/// Recolors every covered pixel while keeping its alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TintFilter {
    /// Replacement color. Its alpha controls the strength of the tint.
    pub color: Color,
}

impl TintFilter {
    /// Creates a tint filter.
    pub const fn new(color: Color) -> Self {
        Self { color }
    }
}

impl Filter for TintFilter {
    fn apply_filter(
        &self,
        surface: &mut dyn Surface,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> bool {
        let region = Rect::new(
            f64::from(x),
            f64::from(y),
            f64::from(x) + f64::from(width),
            f64::from(y) + f64::from(height),
        );
        surface.save();
        surface.set_transform(Affine::IDENTITY);
        surface.push_effects(&Effects::blend(BlendMode::new(
            Mix::Normal,
            Compose::SrcAtop,
        )));
        surface.fill_path(&region.to_path(PATH_TOLERANCE), &Brush::Solid(self.color));
        surface.restore();
        true
    }
}

/// Union of the bounds of `filters`, or `None` if none report any.
pub(crate) fn filter_bounds<'a>(filters: impl IntoIterator<Item = &'a dyn Filter>) -> Option<Rect> {
    filters
        .into_iter()
        .filter_map(|f| f.bounds())
        .reduce(|a, b| a.union(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{Op, RecordingSurface};

    #[derive(Debug)]
    struct Pad(f64);

    impl Filter for Pad {
        fn bounds(&self) -> Option<Rect> {
            Some(Rect::new(-self.0, -self.0, self.0, self.0))
        }

        fn apply_filter(&self, _: &mut dyn Surface, _: u32, _: u32, _: u32, _: u32) -> bool {
            false
        }
    }

    #[test]
    fn filter_bounds_union() {
        let a = Pad(2.0);
        let b = Pad(5.0);
        let tint = TintFilter::new(Color::WHITE);
        let filters: [&dyn Filter; 3] = [&a, &tint, &b];
        assert_eq!(
            filter_bounds(filters),
            Some(Rect::new(-5.0, -5.0, 5.0, 5.0))
        );
        assert_eq!(filter_bounds([&tint as &dyn Filter]), None);
    }

    #[test]
    fn tint_composites_over_region_and_restores() {
        let mut s = RecordingSurface::new(8, 8);
        s.set_transform(Affine::scale(3.0));
        assert!(TintFilter::new(Color::WHITE).apply_filter(&mut s, 0, 0, 8, 8));
        assert_eq!(s.transform(), Affine::scale(3.0));
        assert_eq!(s.save_depth(), 0);
        let fill = s
            .events()
            .iter()
            .find(|e| matches!(e.op, Op::Fill { .. }))
            .expect("tint should fill");
        assert_eq!(fill.state.transform, Affine::IDENTITY);
        assert!(fill.state.blend.is_some());
    }
}
