// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording reference surface.
//!
//! [`RecordingSurface`] implements [`Surface`] by logging every state change
//! and draw call together with the drawing state it was issued under. Pixel
//! readback is answered analytically: each recorded draw is tested against
//! the pixel centre and composited source-over with the accumulated opacity.
//!
//! It is not a renderer:
//! - Coverage is binary at the pixel centre. There is no anti-aliasing.
//! - Blend modes and shadows are recorded but do not affect readback.
//! - Gradient and image brushes read back as opaque black.
//!
//! That is enough to drive alpha hit testing deterministically in tests and
//! in headless hosts, and to assert on the exact sequence of surface calls a
//! draw produced.

use alloc::boxed::Box;
use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Point, Rect, Shape, Stroke, StrokeOpts};
use peniko::{BlendMode, Brush};

use crate::matrix::Shadow;
use crate::surface::{Effects, Image, Rgba, Surface, SurfaceError, SurfaceFactory};

const STROKE_TOLERANCE: f64 = 0.01;

/// Drawing state in force when an op was recorded.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    /// Current transform.
    pub transform: Affine,
    /// Product of all pushed opacities.
    pub opacity: f32,
    /// Innermost pushed blend mode.
    pub blend: Option<BlendMode>,
    /// Innermost pushed shadow.
    pub shadow: Option<Shadow>,
    /// Active clip paths, each with the transform it was issued under.
    pub clips: Vec<(Affine, BezPath)>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            opacity: 1.0,
            blend: None,
            shadow: None,
            clips: Vec::new(),
        }
    }
}

impl StateSnapshot {
    fn clips_contain(&self, device: Point) -> bool {
        self.clips.iter().all(|(xf, path)| {
            invert(*xf).is_some_and(|inv| path.contains(inv * device))
        })
    }
}

/// Operation recorded by [`RecordingSurface`].
#[derive(Clone, Debug)]
pub enum Op {
    /// The surface was cleared.
    Clear,
    /// State was pushed.
    Save,
    /// State was popped.
    Restore,
    /// Effects were pushed.
    Effects(Effects),
    /// A clip path was added.
    Clip(BezPath),
    /// A path was filled.
    Fill {
        /// Path in user space.
        path: BezPath,
        /// Fill brush.
        brush: Brush,
    },
    /// A path was stroked.
    Stroke {
        /// Path in user space.
        path: BezPath,
        /// Stroke style.
        style: Stroke,
        /// Stroke brush.
        brush: Brush,
        /// Stroke outline in user space, used for coverage.
        outline: BezPath,
    },
    /// An image was drawn.
    Image {
        /// The image.
        image: Image,
        /// Source rectangle in image pixels.
        src: Rect,
        /// Destination rectangle in user space.
        dst: Rect,
    },
}

impl Op {
    /// Whether this op puts pixels on the surface.
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Fill { .. } | Self::Stroke { .. } | Self::Image { .. })
    }
}

/// A recorded op and the state it was applied under.
#[derive(Clone, Debug)]
pub struct Event {
    /// The op.
    pub op: Op,
    /// State snapshot at the time of the op (after applying it, for state ops).
    pub state: StateSnapshot,
}

/// Surface that records calls and answers readback analytically.
#[derive(Debug)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    state: StateSnapshot,
    stack: Vec<StateSnapshot>,
    /// Ops since the most recent clear, starting with that clear.
    events: Vec<Event>,
    tainted: bool,
}

impl RecordingSurface {
    /// Creates an empty surface. Zero dimensions are raised to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            state: StateSnapshot::default(),
            stack: Vec::new(),
            events: Vec::new(),
            tainted: false,
        }
    }

    /// The events recorded since creation or the last clear.
    ///
    /// Clearing drops the earlier history, so the log only ever holds one
    /// frame's worth of ops.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterates over the draw events that still contribute pixels.
    pub fn live_draws(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.op.is_draw())
    }

    /// Depth of the save stack.
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether an origin-dirty image has been drawn since the last clear.
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    fn record(&mut self, op: Op) {
        self.events.push(Event {
            op,
            state: self.state.clone(),
        });
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "source coordinates are checked non-negative and bounded by the image lookup"
    )]
    fn sample(&self, x: u32, y: u32) -> Rgba {
        let device = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
        // Premultiplied accumulator.
        let mut acc = [0.0_f32; 4];
        for event in self.live_draws() {
            let state = &event.state;
            if !state.clips_contain(device) {
                continue;
            }
            let Some(inv) = invert(state.transform) else {
                continue;
            };
            let local = inv * device;
            let src = match &event.op {
                Op::Fill { path, brush } if path.contains(local) => brush_rgba(brush),
                Op::Stroke { outline, brush, .. } if outline.contains(local) => {
                    brush_rgba(brush)
                }
                Op::Image { image, src, dst } if dst.contains(local) => {
                    let sx = src.x0 + (local.x - dst.x0) * src.width() / dst.width();
                    let sy = src.y0 + (local.y - dst.y0) * src.height() / dst.height();
                    if sx < 0.0 || sy < 0.0 {
                        continue;
                    }
                    match image.pixel(sx as u32, sy as u32) {
                        Some(px) => px,
                        None => continue,
                    }
                }
                _ => continue,
            };
            let alpha = f32::from(src.a) / 255.0 * state.opacity;
            let inv_alpha = 1.0 - alpha;
            acc[0] = f32::from(src.r) / 255.0 * alpha + acc[0] * inv_alpha;
            acc[1] = f32::from(src.g) / 255.0 * alpha + acc[1] * inv_alpha;
            acc[2] = f32::from(src.b) / 255.0 * alpha + acc[2] * inv_alpha;
            acc[3] = alpha + acc[3] * inv_alpha;
        }
        if acc[3] <= 0.0 {
            return Rgba::TRANSPARENT;
        }
        let unpremul = |c: f32| to_u8(c / acc[3]);
        Rgba::new(
            unpremul(acc[0]),
            unpremul(acc[1]),
            unpremul(acc[2]),
            to_u8(acc[3]),
        )
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.state = StateSnapshot::default();
        self.stack.clear();
        self.tainted = false;
        self.events.clear();
        self.record(Op::Clear);
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
        self.record(Op::Save);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
        self.record(Op::Restore);
    }

    fn transform(&self) -> Affine {
        self.state.transform
    }

    fn set_transform(&mut self, transform: Affine) {
        self.state.transform = transform;
    }

    fn push_effects(&mut self, effects: &Effects) {
        self.state.opacity *= effects.opacity.clamp(0.0, 1.0);
        if effects.blend.is_some() {
            self.state.blend = effects.blend;
        }
        if effects.shadow.is_some() {
            self.state.shadow = effects.shadow;
        }
        self.record(Op::Effects(*effects));
    }

    fn clip(&mut self, path: &BezPath) {
        self.state
            .clips
            .push((self.state.transform, path.clone()));
        self.record(Op::Clip(path.clone()));
    }

    fn fill_path(&mut self, path: &BezPath, brush: &Brush) {
        self.record(Op::Fill {
            path: path.clone(),
            brush: brush.clone(),
        });
    }

    fn stroke_path(&mut self, path: &BezPath, style: &Stroke, brush: &Brush) {
        let outline = kurbo::stroke(
            path.iter(),
            style,
            &StrokeOpts::default(),
            STROKE_TOLERANCE,
        );
        self.record(Op::Stroke {
            path: path.clone(),
            style: style.clone(),
            brush: brush.clone(),
            outline,
        });
    }

    fn draw_image(&mut self, image: &Image, src: Option<Rect>, dst: Rect) {
        if !image.is_origin_clean() {
            self.tainted = true;
        }
        self.record(Op::Image {
            image: image.clone(),
            src: src.unwrap_or_else(|| image.bounds()),
            dst,
        });
    }

    fn pixel(&mut self, x: u32, y: u32) -> Result<Rgba, SurfaceError> {
        if self.tainted {
            return Err(SurfaceError::Unreadable);
        }
        if x >= self.width || y >= self.height {
            return Err(SurfaceError::OutOfBounds { x, y });
        }
        Ok(self.sample(x, y))
    }

    fn snapshot(&mut self) -> Image {
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let px = self.sample(x, y);
                pixels.extend_from_slice(&[px.r, px.g, px.b, px.a]);
            }
        }
        let mut image = Image::from_rgba8(self.width, self.height, pixels);
        image.set_origin_clean(!self.tainted);
        image
    }
}

/// Factory producing [`RecordingSurface`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordingFactory;

impl SurfaceFactory for RecordingFactory {
    fn create_surface(&self, width: u32, height: u32) -> Box<dyn Surface> {
        Box::new(RecordingSurface::new(width, height))
    }
}

fn invert(xf: Affine) -> Option<Affine> {
    let det = xf.determinant();
    if det.abs() < 1e-12 || !det.is_finite() {
        None
    } else {
        Some(xf.inverse())
    }
}

fn brush_rgba(brush: &Brush) -> Rgba {
    match brush {
        Brush::Solid(color) => {
            let c = color.to_rgba8();
            Rgba::new(c.r, c.g, c.b, c.a)
        }
        _ => Rgba::new(0, 0, 0, 255),
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is clamped to 0..=255 before the cast"
)]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Circle;
    use peniko::Color;

    fn circle(r: f64) -> BezPath {
        Circle::new((0.0, 0.0), r).to_path(0.01)
    }

    #[test]
    fn fill_covers_pixel_centres_under_transform() {
        let mut s = RecordingSurface::new(20, 20);
        s.set_transform(Affine::translate((10.0, 10.0)));
        s.fill_path(&circle(3.0), &Brush::Solid(Color::BLACK));
        assert_eq!(s.pixel(10, 10).unwrap().a, 255);
        assert_eq!(s.pixel(0, 0).unwrap().a, 0);
    }

    #[test]
    fn opacity_multiplies_until_restore() {
        let mut s = RecordingSurface::new(4, 4);
        let rect = Rect::new(0.0, 0.0, 4.0, 4.0).to_path(0.01);
        s.save();
        s.push_effects(&Effects {
            opacity: 0.5,
            ..Effects::default()
        });
        s.push_effects(&Effects {
            opacity: 0.5,
            ..Effects::default()
        });
        s.fill_path(&rect, &Brush::Solid(Color::BLACK));
        s.restore();
        assert_eq!(s.pixel(1, 1).unwrap().a, 64);
        assert_eq!(s.save_depth(), 0);
    }

    #[test]
    fn clip_limits_coverage() {
        let mut s = RecordingSurface::new(10, 10);
        s.clip(&Rect::new(0.0, 0.0, 5.0, 10.0).to_path(0.01));
        s.fill_path(
            &Rect::new(0.0, 0.0, 10.0, 10.0).to_path(0.01),
            &Brush::Solid(Color::BLACK),
        );
        assert_eq!(s.pixel(2, 2).unwrap().a, 255);
        assert_eq!(s.pixel(7, 2).unwrap().a, 0);
    }

    #[test]
    fn stroke_coverage_follows_outline() {
        let mut s = RecordingSurface::new(20, 20);
        s.set_transform(Affine::translate((10.0, 10.0)));
        s.stroke_path(&circle(6.0), &Stroke::new(2.0), &Brush::Solid(Color::BLACK));
        assert_eq!(s.pixel(10, 10).unwrap().a, 0);
        assert_eq!(s.pixel(16, 10).unwrap().a, 255);
    }

    #[test]
    fn tainted_image_blocks_readback_until_clear() {
        let mut s = RecordingSurface::new(2, 2);
        let image = Image::solid(2, 2, Rgba::new(255, 0, 0, 255)).tainted();
        s.draw_image(&image, None, image.bounds());
        assert_eq!(s.pixel(0, 0), Err(SurfaceError::Unreadable));
        assert!(!s.snapshot().is_origin_clean());
        s.clear();
        assert_eq!(s.pixel(0, 0), Ok(Rgba::TRANSPARENT));
    }

    #[test]
    fn image_is_sampled_through_destination_rect() {
        let mut pixels = alloc::vec![0_u8; 8];
        pixels[4..8].copy_from_slice(&[0, 0, 255, 255]);
        let image = Image::from_rgba8(2, 1, pixels);
        let mut s = RecordingSurface::new(8, 4);
        s.draw_image(&image, None, Rect::new(0.0, 0.0, 8.0, 4.0));
        assert_eq!(s.pixel(1, 1).unwrap().a, 0);
        assert_eq!(s.pixel(6, 1).unwrap(), Rgba::new(0, 0, 255, 255));
    }

    #[test]
    fn out_of_bounds_pixel_is_an_error() {
        let mut s = RecordingSurface::new(1, 1);
        assert_eq!(
            s.pixel(1, 0),
            Err(SurfaceError::OutOfBounds { x: 1, y: 0 })
        );
    }

    #[test]
    fn clear_discards_earlier_draws() {
        let mut s = RecordingSurface::new(4, 4);
        s.fill_path(
            &Rect::new(0.0, 0.0, 4.0, 4.0).to_path(0.01),
            &Brush::Solid(Color::BLACK),
        );
        s.clear();
        assert_eq!(s.live_draws().count(), 0);
        assert_eq!(s.pixel(1, 1).unwrap().a, 0);
    }

    #[test]
    fn clear_bounds_the_event_log() {
        let mut s = RecordingSurface::new(1, 1);
        let path = Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.01);
        for _ in 0..10_000 {
            s.clear();
            s.fill_path(&path, &Brush::Solid(Color::BLACK));
            s.clear();
        }
        assert_eq!(s.events().len(), 1);
        assert!(matches!(s.events()[0].op, Op::Clear));

        s.fill_path(&path, &Brush::Solid(Color::BLACK));
        assert_eq!(s.events().len(), 2);
        assert_eq!(s.pixel(0, 0).unwrap().a, 255);
    }
}
