// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vello CPU–backed surfaces for `proscenium_scene`.
//!
//! [`VelloCpuSurface`] implements [`Surface`] on top of the sparse-strips
//! [`vello_cpu::RenderContext`], and [`VelloCpuFactory`] hands them out to
//! stages, bitmap caches and hit samplers.
//!
//! Drawing is recorded into the render context and only rasterized when
//! pixels are read back, so a hit sample costs one small render.
//!
//! ```
//! use kurbo::Point;
//! use peniko::Color;
//! use proscenium_scene::{Graphics, HitMode, Stage, TickParams};
//! use proscenium_vello_cpu::VelloCpuFactory;
//!
//! let mut stage = Stage::new(Box::new(VelloCpuFactory), 64, 64);
//! let root = stage.root();
//! let mut g = Graphics::new();
//! g.fill_circle(32.0, 32.0, 16.0, Color::BLACK);
//! let dot = stage.scene_mut().create_shape(g);
//! stage.scene_mut().add_child(root, dot);
//!
//! stage.update(&TickParams::default());
//! assert_eq!(
//!     stage.object_under_point(Point::new(32.0, 32.0), HitMode::All),
//!     Ok(Some(dot))
//! );
//! ```

#![no_std]

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, BezPath, Cap, Join, PathEl, Point, Rect, Stroke};
use peniko::{Brush, Fill, ImageSampler};
use proscenium_scene::{Effects, Image, Rgba, Shadow, Surface, SurfaceError, SurfaceFactory};
use vello_common::filter_effects::{EdgeMode, Filter, FilterPrimitive};
use vello_cpu::kurbo::{
    Affine as CpuAffine, BezPath as CpuBezPath, Cap as CpuCap, Join as CpuJoin,
    Point as CpuPoint, Rect as CpuRect, Stroke as CpuStroke,
};
use vello_cpu::{Image as CpuImage, ImageSource, Pixmap, RenderContext};

#[derive(Clone, Copy, Debug)]
struct Frame {
    transform: Affine,
    /// Layers open in the enclosing frame when this one was saved.
    layers: u32,
}

/// A [`Surface`] rendering with `vello_cpu`.
pub struct VelloCpuSurface {
    ctx: RenderContext,
    width: u16,
    height: u16,
    transform: Affine,
    /// Layers pushed since the last save.
    layers: u32,
    stack: Vec<Frame>,
    tainted: bool,
}

impl fmt::Debug for VelloCpuSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VelloCpuSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("transform", &self.transform)
            .field("layers", &self.layers)
            .field("depth", &self.stack.len())
            .field("tainted", &self.tainted)
            .finish_non_exhaustive()
    }
}

impl VelloCpuSurface {
    /// Creates a transparent surface.
    pub fn new(width: u16, height: u16) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut ctx = RenderContext::new(width, height);
        ctx.reset();
        Self {
            ctx,
            width,
            height,
            transform: Affine::IDENTITY,
            layers: 0,
            stack: Vec::new(),
            tainted: false,
        }
    }

    /// Creates a surface from `u32` dimensions, clamped to what the render
    /// context supports.
    pub fn from_size(width: u32, height: u32) -> Self {
        let clamp = |len: u32| {
            u16::try_from(len).unwrap_or_else(|_| {
                log::warn!("surface dimension {len} clamped to {}", u16::MAX);
                u16::MAX
            })
        };
        Self::new(clamp(width), clamp(height))
    }

    /// The underlying render context.
    pub fn render_context(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    /// Rasterizes everything drawn so far.
    pub fn render(&mut self) -> Pixmap {
        let mut pixmap = Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        pixmap
    }

    fn set_brush(&mut self, brush: &Brush) {
        match brush.clone() {
            Brush::Solid(color) => self.ctx.set_paint(color),
            Brush::Gradient(gradient) => self.ctx.set_paint(gradient),
            Brush::Image(image_brush) => {
                let image = CpuImage {
                    image: ImageSource::from_peniko_image_data(&image_brush.image),
                    sampler: image_brush.sampler,
                };
                self.ctx.set_paint(image);
            }
        }
    }
}

fn affine_to_cpu(xf: Affine) -> CpuAffine {
    CpuAffine::new(xf.as_coeffs())
}

fn point_to_cpu(p: Point) -> CpuPoint {
    CpuPoint::new(p.x, p.y)
}

fn path_to_cpu(path: &BezPath) -> CpuBezPath {
    let mut out = CpuBezPath::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn cap_to_cpu(cap: Cap) -> CpuCap {
    match cap {
        Cap::Butt => CpuCap::Butt,
        Cap::Round => CpuCap::Round,
        Cap::Square => CpuCap::Square,
    }
}

fn stroke_to_cpu(style: &Stroke) -> CpuStroke {
    let mut stroke = CpuStroke::new(style.width)
        .with_dashes(style.dash_offset, style.dash_pattern.iter().copied());
    stroke.miter_limit = style.miter_limit;
    stroke.join = match style.join {
        Join::Bevel => CpuJoin::Bevel,
        Join::Miter => CpuJoin::Miter,
        Join::Round => CpuJoin::Round,
    };
    stroke.start_cap = cap_to_cpu(style.start_cap);
    stroke.end_cap = cap_to_cpu(style.end_cap);
    stroke
}

/// A blur radius is about two standard deviations of the Gaussian.
#[expect(
    clippy::cast_possible_truncation,
    reason = "vello filter parameters are f32"
)]
fn shadow_filter(shadow: &Shadow) -> Filter {
    Filter::from_primitive(FilterPrimitive::DropShadow {
        dx: shadow.offset_x as f32,
        dy: shadow.offset_y as f32,
        std_deviation: (shadow.blur / 2.0) as f32,
        color: shadow.color,
        edge_mode: EdgeMode::None,
    })
}

impl Surface for VelloCpuSurface {
    fn width(&self) -> u32 {
        u32::from(self.width)
    }

    fn height(&self) -> u32 {
        u32::from(self.height)
    }

    fn clear(&mut self) {
        self.ctx.reset();
        self.stack.clear();
        self.layers = 0;
        self.tainted = false;
        self.transform = Affine::IDENTITY;
        self.ctx.set_transform(CpuAffine::IDENTITY);
    }

    fn save(&mut self) {
        self.stack.push(Frame {
            transform: self.transform,
            layers: self.layers,
        });
        self.layers = 0;
    }

    fn restore(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        for _ in 0..self.layers {
            self.ctx.pop_layer();
        }
        self.layers = frame.layers;
        self.set_transform(frame.transform);
    }

    fn transform(&self) -> Affine {
        self.transform
    }

    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
        self.ctx.set_transform(affine_to_cpu(transform));
    }

    fn push_effects(&mut self, effects: &Effects) {
        if effects.is_noop() {
            return;
        }
        let opacity = (effects.opacity < 1.0).then_some(effects.opacity.max(0.0));
        let filter = effects.shadow.as_ref().map(shadow_filter);
        self.ctx.push_layer(None, effects.blend, opacity, None, filter);
        self.layers += 1;
    }

    fn clip(&mut self, path: &BezPath) {
        self.ctx.set_fill_rule(Fill::NonZero);
        self.ctx.push_clip_layer(&path_to_cpu(path));
        self.layers += 1;
    }

    fn fill_path(&mut self, path: &BezPath, brush: &Brush) {
        self.set_brush(brush);
        self.ctx.set_fill_rule(Fill::NonZero);
        self.ctx.fill_path(&path_to_cpu(path));
    }

    fn stroke_path(&mut self, path: &BezPath, style: &Stroke, brush: &Brush) {
        self.set_brush(brush);
        self.ctx.set_stroke(stroke_to_cpu(style));
        self.ctx.stroke_path(&path_to_cpu(path));
    }

    fn draw_image(&mut self, image: &Image, src: Option<Rect>, dst: Rect) {
        let src = src.unwrap_or_else(|| image.bounds());
        if src.width() == 0.0 || src.height() == 0.0 || dst.width() == 0.0 || dst.height() == 0.0
        {
            return;
        }
        if !image.is_origin_clean() {
            self.tainted = true;
        }
        let local = Affine::translate((dst.x0, dst.y0))
            * Affine::scale_non_uniform(dst.width() / src.width(), dst.height() / src.height())
            * Affine::translate((-src.x0, -src.y0));

        let mut dst_path = CpuBezPath::new();
        dst_path.move_to((dst.x0, dst.y0));
        dst_path.line_to((dst.x1, dst.y0));
        dst_path.line_to((dst.x1, dst.y1));
        dst_path.line_to((dst.x0, dst.y1));
        dst_path.close_path();
        self.ctx.set_fill_rule(Fill::NonZero);
        self.ctx.push_clip_layer(&dst_path);

        let saved_paint = self.ctx.paint().clone();
        self.ctx.set_paint(CpuImage {
            image: ImageSource::from_peniko_image_data(image.data()),
            sampler: ImageSampler::default(),
        });
        self.ctx.set_transform(affine_to_cpu(self.transform * local));
        self.ctx.fill_rect(&CpuRect::new(
            0.0,
            0.0,
            f64::from(image.width()),
            f64::from(image.height()),
        ));
        self.ctx.set_transform(affine_to_cpu(self.transform));
        self.ctx.set_paint(saved_paint);
        self.ctx.pop_layer();
    }

    fn pixel(&mut self, x: u32, y: u32) -> Result<Rgba, SurfaceError> {
        if self.tainted {
            return Err(SurfaceError::Unreadable);
        }
        if x >= self.width() || y >= self.height() {
            return Err(SurfaceError::OutOfBounds { x, y });
        }
        let index = y as usize * usize::from(self.width) + x as usize;
        let pixels = self.render().take_unpremultiplied();
        pixels
            .get(index)
            .map(|p| Rgba::new(p.r, p.g, p.b, p.a))
            .ok_or(SurfaceError::OutOfBounds { x, y })
    }

    fn snapshot(&mut self) -> Image {
        let pixels = self.render().take_unpremultiplied();
        let mut bytes = Vec::with_capacity(pixels.len() * 4);
        for p in pixels {
            bytes.extend_from_slice(&[p.r, p.g, p.b, p.a]);
        }
        let image = Image::from_rgba8(self.width(), self.height(), bytes);
        if self.tainted {
            image.tainted()
        } else {
            image
        }
    }
}

/// Creates [`VelloCpuSurface`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct VelloCpuFactory;

impl SurfaceFactory for VelloCpuFactory {
    fn create_surface(&self, width: u32, height: u32) -> Box<dyn Surface> {
        Box::new(VelloCpuSurface::from_size(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;
    use peniko::Color;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> BezPath {
        Rect::new(x0, y0, x1, y1).to_path(0.1)
    }

    #[test]
    fn fill_then_read_back() {
        let mut s = VelloCpuSurface::new(8, 8);
        s.fill_path(&square(0.0, 0.0, 4.0, 4.0), &Brush::Solid(Color::BLACK));
        assert_eq!(s.pixel(1, 1).unwrap().a, 255);
        assert_eq!(s.pixel(6, 6).unwrap().a, 0);
        assert_eq!(
            s.pixel(8, 0),
            Err(SurfaceError::OutOfBounds { x: 8, y: 0 })
        );
    }

    #[test]
    fn restore_closes_clip_layers() {
        let mut s = VelloCpuSurface::new(8, 8);
        s.save();
        s.clip(&square(0.0, 0.0, 2.0, 8.0));
        s.fill_path(&square(0.0, 0.0, 8.0, 8.0), &Brush::Solid(Color::BLACK));
        s.restore();
        s.fill_path(&square(6.0, 6.0, 8.0, 8.0), &Brush::Solid(Color::BLACK));
        assert_eq!(s.pixel(1, 1).unwrap().a, 255);
        assert_eq!(s.pixel(4, 1).unwrap().a, 0);
        assert_eq!(s.pixel(7, 7).unwrap().a, 255);
    }

    #[test]
    fn transform_is_saved_and_restored() {
        let mut s = VelloCpuSurface::new(8, 8);
        s.save();
        s.concat_transform(Affine::translate((4.0, 4.0)));
        s.fill_path(&square(0.0, 0.0, 2.0, 2.0), &Brush::Solid(Color::BLACK));
        s.restore();
        assert_eq!(s.transform(), Affine::IDENTITY);
        assert_eq!(s.pixel(5, 5).unwrap().a, 255);
        assert_eq!(s.pixel(1, 1).unwrap().a, 0);
    }

    #[test]
    fn tainted_images_block_readback_until_clear() {
        let mut s = VelloCpuSurface::new(4, 4);
        let image = Image::solid(2, 2, Rgba::new(255, 0, 0, 255)).tainted();
        s.draw_image(&image, None, Rect::new(0.0, 0.0, 4.0, 4.0));
        assert_eq!(s.pixel(0, 0), Err(SurfaceError::Unreadable));
        assert!(!s.snapshot().is_origin_clean());
        s.clear();
        assert_eq!(s.pixel(0, 0).map(|p| p.a), Ok(0));
    }

    #[test]
    fn image_is_scaled_into_destination() {
        let mut s = VelloCpuSurface::new(8, 8);
        let image = Image::solid(2, 2, Rgba::new(0, 0, 255, 255));
        s.draw_image(&image, None, Rect::new(2.0, 2.0, 6.0, 6.0));
        let inside = s.pixel(4, 4).unwrap();
        assert_eq!((inside.b, inside.a), (255, 255));
        assert_eq!(s.pixel(7, 7).unwrap().a, 0);
    }

    #[test]
    fn factory_clamps_to_at_least_one_pixel() {
        let s = VelloCpuFactory.create_surface(0, 3);
        assert_eq!((s.width(), s.height()), (1, 3));
    }
}
