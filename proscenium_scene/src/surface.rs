// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raster surface contract.
//!
//! A [`Surface`] is a 2D drawing target with a current transform, a
//! save/restore stack, path clipping, fills, strokes, image blits and pixel
//! readback. The scene draws into surfaces for display, for bitmap caches and
//! for 1×1 hit sampling; which backend sits behind the trait is up to the
//! host. [`SurfaceFactory`] creates new surfaces of a given size.
//!
//! Images drawn from a source that is not origin-clean taint the surface.
//! Reading pixels back from a tainted surface fails with
//! [`SurfaceError::Unreadable`] until the surface is cleared.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, BezPath, Rect, Stroke};
use peniko::{BlendMode, Blob, Brush, ImageAlphaType, ImageData, ImageFormat};

use crate::matrix::Shadow;

/// Unpremultiplied 8-bit RGBA pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Creates a pixel from its components.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Errors reported by surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceError {
    /// Pixel data cannot be read because a non-origin-clean image was drawn.
    Unreadable,
    /// The requested pixel lies outside the surface.
    OutOfBounds {
        /// Requested x.
        x: u32,
        /// Requested y.
        y: u32,
    },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable => write!(f, "surface is tainted by a cross-origin image"),
            Self::OutOfBounds { x, y } => write!(f, "pixel ({x}, {y}) is outside the surface"),
        }
    }
}

impl core::error::Error for SurfaceError {}

/// Bitmap image that can be drawn into a surface.
///
/// Wraps peniko [`ImageData`] and records whether the pixels are
/// origin-clean, i.e. safe to read back after drawing.
#[derive(Clone, Debug)]
pub struct Image {
    data: ImageData,
    origin_clean: bool,
}

impl Image {
    /// Wraps existing image data. The image is origin-clean.
    pub fn new(data: ImageData) -> Self {
        Self {
            data,
            origin_clean: true,
        }
    }

    /// Creates an origin-clean image from unpremultiplied RGBA8 bytes.
    ///
    /// `pixels` must hold `width * height * 4` bytes in row-major order.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 4,
            "pixel buffer does not match image size"
        );
        Self::new(ImageData {
            data: Blob::from(pixels),
            format: ImageFormat::Rgba8,
            alpha_type: ImageAlphaType::Alpha,
            width,
            height,
        })
    }

    /// Creates an origin-clean image filled with a single pixel value.
    pub fn solid(width: u32, height: u32, pixel: Rgba) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&[pixel.r, pixel.g, pixel.b, pixel.a]);
        }
        Self::from_rgba8(width, height, pixels)
    }

    /// Marks this image as coming from a foreign origin.
    #[must_use]
    pub fn tainted(mut self) -> Self {
        self.origin_clean = false;
        self
    }

    /// Sets whether this image is origin-clean.
    pub fn set_origin_clean(&mut self, origin_clean: bool) {
        self.origin_clean = origin_clean;
    }

    /// Whether pixels drawn from this image may be read back.
    pub fn is_origin_clean(&self) -> bool {
        self.origin_clean
    }

    /// The underlying image data.
    pub fn data(&self) -> &ImageData {
        &self.data
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.data.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.data.height
    }

    /// Image bounds as a rectangle at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width()), f64::from(self.height()))
    }

    /// Reads one pixel, or `None` outside the image.
    ///
    /// Only RGBA8 and BGRA8 layouts are interpreted; the alpha type is
    /// reported as stored.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let idx = (y as usize * self.width() as usize + x as usize) * 4;
        let bytes = self.data.data.data().get(idx..idx + 4)?;
        Some(match self.data.format {
            ImageFormat::Bgra8 => Rgba::new(bytes[2], bytes[1], bytes[0], bytes[3]),
            _ => Rgba::new(bytes[0], bytes[1], bytes[2], bytes[3]),
        })
    }
}

/// Compositing state pushed onto a surface.
///
/// Effects stay in force until the matching [`Surface::restore`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Effects {
    /// Multiplier applied to everything drawn while the effects are active.
    pub opacity: f32,
    /// Blend mode used to composite onto what is already there.
    pub blend: Option<BlendMode>,
    /// Drop shadow.
    pub shadow: Option<Shadow>,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            blend: None,
            shadow: None,
        }
    }
}

impl Effects {
    /// Effects that only change the blend mode.
    pub fn blend(mode: BlendMode) -> Self {
        Self {
            blend: Some(mode),
            ..Self::default()
        }
    }

    /// Whether pushing these effects would change nothing.
    pub fn is_noop(&self) -> bool {
        self.opacity >= 1.0 && self.blend.is_none() && self.shadow.is_none()
    }
}

/// A 2D raster drawing target.
///
/// Paths passed to drawing methods are in user space and are mapped through
/// the current transform. [`Surface::save`] snapshots the transform, the clip
/// and any pushed [`Effects`]; [`Surface::restore`] reverts to the snapshot.
pub trait Surface: fmt::Debug {
    /// Width in device pixels.
    fn width(&self) -> u32;

    /// Height in device pixels.
    fn height(&self) -> u32;

    /// Clears all pixels to transparent, resets the state stack and the
    /// transform, and forgets any taint.
    fn clear(&mut self);

    /// Pushes the current drawing state.
    fn save(&mut self);

    /// Pops back to the most recently saved drawing state.
    ///
    /// An unmatched restore is ignored.
    fn restore(&mut self);

    /// The current user-to-device transform.
    fn transform(&self) -> Affine;

    /// Replaces the current transform.
    fn set_transform(&mut self, transform: Affine);

    /// Right-multiplies the current transform by `transform`.
    fn concat_transform(&mut self, transform: Affine) {
        let current = self.transform();
        self.set_transform(current * transform);
    }

    /// Applies opacity, blending and shadow to subsequent drawing.
    fn push_effects(&mut self, effects: &Effects);

    /// Intersects the clip with `path`, filled with the non-zero rule.
    fn clip(&mut self, path: &BezPath);

    /// Fills `path` with the non-zero rule.
    fn fill_path(&mut self, path: &BezPath, brush: &Brush);

    /// Strokes `path`.
    fn stroke_path(&mut self, path: &BezPath, style: &Stroke, brush: &Brush);

    /// Draws `src` (or the whole image) of `image` into the user-space
    /// rectangle `dst`.
    fn draw_image(&mut self, image: &Image, src: Option<Rect>, dst: Rect);

    /// Reads one device pixel.
    fn pixel(&mut self, x: u32, y: u32) -> Result<Rgba, SurfaceError>;

    /// Captures the current contents as an image.
    ///
    /// The image is origin-clean only if the surface is.
    fn snapshot(&mut self) -> Image;
}

/// Creates surfaces.
pub trait SurfaceFactory: fmt::Debug {
    /// Creates a surface of the given size in device pixels.
    fn create_surface(&self, width: u32, height: u32) -> Box<dyn Surface>;
}
