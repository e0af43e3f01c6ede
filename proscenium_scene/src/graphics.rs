// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vector drawing command lists for shape nodes.

use alloc::vec::Vec;

use kurbo::{BezPath, Circle, Rect, RoundedRect, Shape, Stroke, StrokeOpts};
use peniko::{Brush, Color};

use crate::surface::Surface;

/// Tolerance used when flattening kurbo shapes into paths.
pub const PATH_TOLERANCE: f64 = 0.01;

#[derive(Clone, Debug)]
enum Command {
    Fill { path: BezPath, brush: Brush },
    Stroke {
        path: BezPath,
        style: Stroke,
        brush: Brush,
    },
}

/// An ordered list of fill and stroke commands.
///
/// Built with chained calls:
///
/// ```
/// use kurbo::Circle;
/// use peniko::Color;
/// use proscenium_scene::Graphics;
///
/// let mut g = Graphics::new();
/// g.fill(&Circle::new((0.0, 0.0), 10.0), Color::BLACK)
///     .stroke(&Circle::new((0.0, 0.0), 10.0), 2.0, Color::WHITE);
/// assert!(!g.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Graphics {
    commands: Vec<Command>,
}

impl Graphics {
    /// Creates an empty command list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fill of `shape`.
    pub fn fill(&mut self, shape: &impl Shape, brush: impl Into<Brush>) -> &mut Self {
        self.commands.push(Command::Fill {
            path: shape.to_path(PATH_TOLERANCE),
            brush: brush.into(),
        });
        self
    }

    /// Appends a stroke of `shape` with a plain stroke of `width`.
    pub fn stroke(&mut self, shape: &impl Shape, width: f64, brush: impl Into<Brush>) -> &mut Self {
        self.stroke_with(shape, Stroke::new(width), brush)
    }

    /// Appends a stroke of `shape` with a full stroke style.
    pub fn stroke_with(
        &mut self,
        shape: &impl Shape,
        style: Stroke,
        brush: impl Into<Brush>,
    ) -> &mut Self {
        self.commands.push(Command::Stroke {
            path: shape.to_path(PATH_TOLERANCE),
            style,
            brush: brush.into(),
        });
        self
    }

    /// Fills a rectangle.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) -> &mut Self {
        self.fill(&rect, color)
    }

    /// Fills a rounded rectangle.
    pub fn fill_round_rect(&mut self, rect: Rect, radius: f64, color: Color) -> &mut Self {
        self.fill(&RoundedRect::from_rect(rect, radius), color)
    }

    /// Fills a circle.
    pub fn fill_circle(&mut self, x: f64, y: f64, radius: f64, color: Color) -> &mut Self {
        self.fill(&Circle::new((x, y), radius), color)
    }

    /// Removes all commands.
    pub fn clear(&mut self) -> &mut Self {
        self.commands.clear();
        self
    }

    /// Whether there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Replays the commands onto `surface`.
    pub fn draw(&self, surface: &mut dyn Surface) {
        for command in &self.commands {
            match command {
                Command::Fill { path, brush } => surface.fill_path(path, brush),
                Command::Stroke { path, style, brush } => surface.stroke_path(path, style, brush),
            }
        }
    }

    /// Intersects the surface clip with the geometry, ignoring paint.
    ///
    /// Used when this shape acts as a mask.
    pub fn draw_as_path(&self, surface: &mut dyn Surface) {
        surface.clip(&self.to_path());
    }

    /// All geometry merged into one path.
    ///
    /// Strokes contribute their outline, so the non-zero fill of the result
    /// covers exactly what [`Graphics::draw`] paints.
    pub fn to_path(&self) -> BezPath {
        let mut out = BezPath::new();
        for command in &self.commands {
            match command {
                Command::Fill { path, .. } => out.extend(path.iter()),
                Command::Stroke { path, style, .. } => {
                    let outline = kurbo::stroke(
                        path.iter(),
                        style,
                        &StrokeOpts::default(),
                        PATH_TOLERANCE,
                    );
                    out.extend(outline.iter());
                }
            }
        }
        out
    }

    /// Bounding box of all geometry, including stroke width.
    pub fn bounds(&self) -> Option<Rect> {
        self.commands
            .iter()
            .map(|command| match command {
                Command::Fill { path, .. } => path.bounding_box(),
                Command::Stroke { path, style, .. } => {
                    path.bounding_box().inflate(style.width / 2.0, style.width / 2.0)
                }
            })
            .reduce(|a, b| a.union(b))
    }
}
