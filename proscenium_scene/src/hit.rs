// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Alpha hit sampling.
//!
//! Hit tests draw the candidate into a 1×1 scratch surface, translated so the
//! query point lands on the single pixel, and read the alpha back. Anything
//! above [`ALPHA_THRESHOLD`] is a hit. [`HitSampler`] owns that scratch
//! surface together with the policy for readback failures.

use alloc::boxed::Box;
use core::fmt;

use kurbo::Affine;

use crate::surface::{Surface, SurfaceError, SurfaceFactory};

/// Alpha values at or below this count as transparent.
pub const ALPHA_THRESHOLD: u8 = 1;

/// Which nodes a container hit test may report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HitMode {
    /// Every visible node with coverage.
    #[default]
    All,
    /// Only nodes with `mouse_enabled` set, honoring `mouse_children`.
    MouseEnabled,
    /// Like [`HitMode::MouseEnabled`], and additionally only nodes that (or
    /// whose ancestors) registered pointer interest.
    Listeners,
}

impl HitMode {
    /// Whether mouse eligibility is checked.
    pub fn is_mouse(self) -> bool {
        !matches!(self, Self::All)
    }
}

/// Error returned by hit tests when sampling errors are not suppressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTestError {
    /// The scratch surface could not be read.
    Sampling(SurfaceError),
}

impl fmt::Display for HitTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sampling(err) => write!(f, "hit sampling failed: {err}"),
        }
    }
}

impl core::error::Error for HitTestError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Sampling(err) => Some(err),
        }
    }
}

/// The 1×1 scratch surface used for hit tests.
#[derive(Debug)]
pub struct HitSampler {
    surface: Box<dyn Surface>,
    suppress_errors: bool,
}

impl HitSampler {
    /// Wraps an existing surface. Only its top-left pixel is read.
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface,
            suppress_errors: false,
        }
    }

    /// Creates a 1×1 sampler using `factory`.
    pub fn from_factory(factory: &dyn SurfaceFactory) -> Self {
        Self::new(factory.create_surface(1, 1))
    }

    /// When set, readback failures count as misses instead of errors.
    #[must_use]
    pub fn with_suppressed_errors(mut self, suppress: bool) -> Self {
        self.suppress_errors = suppress;
        self
    }

    /// Changes the error policy.
    pub fn set_suppress_errors(&mut self, suppress: bool) {
        self.suppress_errors = suppress;
    }

    /// Whether readback failures are suppressed.
    pub fn suppresses_errors(&self) -> bool {
        self.suppress_errors
    }

    /// Clears the scratch surface and sets its transform, ready for one
    /// candidate to be drawn.
    pub fn begin(&mut self, transform: Affine) -> &mut dyn Surface {
        self.surface.clear();
        self.surface.set_transform(transform);
        self.surface.as_mut()
    }

    /// Reads the sample and clears the surface.
    pub fn finish(&mut self) -> Result<bool, HitTestError> {
        let result = self.surface.pixel(0, 0);
        self.surface.clear();
        match result {
            Ok(px) => Ok(px.a > ALPHA_THRESHOLD),
            Err(err) if self.suppress_errors => {
                log::debug!("hit sample treated as miss: {err}");
                Ok(false)
            }
            Err(err) => Err(HitTestError::Sampling(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::RecordingFactory;
    use crate::surface::{Image, Rgba};
    use kurbo::{Rect, Shape};
    use peniko::{Brush, Color};

    #[test]
    fn faint_pixels_are_misses() {
        let mut sampler = HitSampler::from_factory(&RecordingFactory);
        let square = Rect::new(-1.0, -1.0, 1.0, 1.0).to_path(0.01);

        let s = sampler.begin(Affine::IDENTITY);
        s.fill_path(&square, &Brush::Solid(Color::from_rgba8(0, 0, 0, 1)));
        assert_eq!(sampler.finish(), Ok(false));

        let s = sampler.begin(Affine::IDENTITY);
        s.fill_path(&square, &Brush::Solid(Color::from_rgba8(0, 0, 0, 2)));
        assert_eq!(sampler.finish(), Ok(true));
    }

    #[test]
    fn tainted_sample_errors_unless_suppressed() {
        let image = Image::solid(4, 4, Rgba::new(0, 0, 0, 255)).tainted();
        let mut sampler = HitSampler::from_factory(&RecordingFactory);
        sampler
            .begin(Affine::IDENTITY)
            .draw_image(&image, None, image.bounds());
        assert_eq!(
            sampler.finish(),
            Err(HitTestError::Sampling(SurfaceError::Unreadable))
        );

        sampler.set_suppress_errors(true);
        sampler
            .begin(Affine::IDENTITY)
            .draw_image(&image, None, image.bounds());
        assert_eq!(sampler.finish(), Ok(false));
    }

    #[test]
    fn finish_leaves_surface_clean() {
        let mut sampler = HitSampler::from_factory(&RecordingFactory);
        let square = Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.01);
        sampler
            .begin(Affine::IDENTITY)
            .fill_path(&square, &Brush::Solid(Color::BLACK));
        assert_eq!(sampler.finish(), Ok(true));
        sampler.begin(Affine::IDENTITY);
        assert_eq!(sampler.finish(), Ok(false));
    }
}
