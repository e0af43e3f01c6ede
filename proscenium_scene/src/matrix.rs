// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 2D affine matrix with display-property side channels.
//!
//! [`Matrix2D`] stores the six affine coefficients in the canvas convention
//!
//! ```text
//! | a  c  tx |
//! | b  d  ty |
//! | 0  0  1  |
//! ```
//!
//! and additionally carries the compositing state that accumulates down a
//! display list: opacity, an optional [`Shadow`], an optional blend mode and
//! visibility. Walking a parent chain with [`Matrix2D::prepend_transform`] and
//! [`Matrix2D::prepend_properties`] yields a node's world matrix together with
//! its effective appearance in a single pass.
//!
//! `append` right-multiplies (`self = self * m`) and `prepend` left-multiplies
//! (`self = m * self`).

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Affine, Point};
use peniko::{BlendMode, Color};

/// Multiply degrees by this to get radians.
pub const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;

/// Drop shadow applied when compositing a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    /// Shadow color.
    pub color: Color,
    /// Horizontal offset in the node's parent space.
    pub offset_x: f64,
    /// Vertical offset in the node's parent space.
    pub offset_y: f64,
    /// Blur radius.
    pub blur: f64,
}

impl Shadow {
    /// Creates a shadow.
    pub const fn new(color: Color, offset_x: f64, offset_y: f64, blur: f64) -> Self {
        Self {
            color,
            offset_x,
            offset_y,
            blur,
        }
    }
}

/// Local transform components of a node, as consumed by
/// [`Matrix2D::append_transform`] and [`Matrix2D::prepend_transform`].
///
/// Angles are in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformParts {
    /// Horizontal translation.
    pub x: f64,
    /// Vertical translation.
    pub y: f64,
    /// Horizontal scale.
    pub scale_x: f64,
    /// Vertical scale.
    pub scale_y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Horizontal skew in degrees.
    pub skew_x: f64,
    /// Vertical skew in degrees.
    pub skew_y: f64,
    /// Registration point x, in local space.
    pub reg_x: f64,
    /// Registration point y, in local space.
    pub reg_y: f64,
}

impl Default for TransformParts {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            reg_x: 0.0,
            reg_y: 0.0,
        }
    }
}

/// Affine matrix plus accumulated display properties.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix2D {
    /// Scale / rotate x component.
    pub a: f64,
    /// Skew / rotate y component.
    pub b: f64,
    /// Skew / rotate x component.
    pub c: f64,
    /// Scale / rotate y component.
    pub d: f64,
    /// Horizontal translation.
    pub tx: f64,
    /// Vertical translation.
    pub ty: f64,
    /// Accumulated opacity in `0.0..=1.0`.
    pub opacity: f64,
    /// Effective shadow, if any.
    pub shadow: Option<Shadow>,
    /// Effective blend mode, if any.
    pub blend_mode: Option<BlendMode>,
    /// Accumulated visibility.
    pub visible: bool,
}

impl Default for Matrix2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix2D {
    /// The identity matrix with neutral properties.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
        opacity: 1.0,
        shadow: None,
        blend_mode: None,
        visible: true,
    };

    /// Creates a matrix with neutral properties.
    pub const fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self {
            a,
            b,
            c,
            d,
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// Creates a matrix from a kurbo affine, with neutral properties.
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, tx, ty] = affine.as_coeffs();
        Self::new(a, b, c, d, tx, ty)
    }

    /// The affine part as a kurbo [`Affine`].
    pub fn to_affine(&self) -> Affine {
        Affine::new([self.a, self.b, self.c, self.d, self.tx, self.ty])
    }

    /// Resets the affine part and the properties to identity.
    pub fn identity(&mut self) -> &mut Self {
        *self = Self::IDENTITY;
        self
    }

    /// Sets the six affine coefficients, leaving properties untouched.
    pub fn set_values(&mut self, a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> &mut Self {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self.tx = tx;
        self.ty = ty;
        self
    }

    /// `self = self * m`.
    pub fn append(&mut self, a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> &mut Self {
        let (a1, b1, c1, d1) = (self.a, self.b, self.c, self.d);
        if a != 1.0 || b != 0.0 || c != 0.0 || d != 1.0 {
            self.a = a1 * a + c1 * b;
            self.b = b1 * a + d1 * b;
            self.c = a1 * c + c1 * d;
            self.d = b1 * c + d1 * d;
        }
        self.tx = a1 * tx + c1 * ty + self.tx;
        self.ty = b1 * tx + d1 * ty + self.ty;
        self
    }

    /// `self = m * self`.
    pub fn prepend(&mut self, a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> &mut Self {
        let a1 = self.a;
        let c1 = self.c;
        let tx1 = self.tx;

        self.a = a * a1 + c * self.b;
        self.b = b * a1 + d * self.b;
        self.c = a * c1 + c * self.d;
        self.d = b * c1 + d * self.d;
        self.tx = a * tx1 + c * self.ty + tx;
        self.ty = b * tx1 + d * self.ty + ty;
        self
    }

    /// Appends the affine part of `m`, leaving properties untouched.
    pub fn append_matrix(&mut self, m: &Self) -> &mut Self {
        self.append(m.a, m.b, m.c, m.d, m.tx, m.ty)
    }

    /// Prepends the affine part of `m`, leaving properties untouched.
    pub fn prepend_matrix(&mut self, m: &Self) -> &mut Self {
        self.prepend(m.a, m.b, m.c, m.d, m.tx, m.ty)
    }

    /// Appends translate, then rotate/scale (optionally skew), then the
    /// registration offset.
    pub fn append_transform(&mut self, t: &TransformParts) -> &mut Self {
        let (cos, sin) = rotation_cos_sin(t.rotation);

        if t.skew_x != 0.0 || t.skew_y != 0.0 {
            let skew_x = t.skew_x * DEG_TO_RAD;
            let skew_y = t.skew_y * DEG_TO_RAD;
            self.append(
                skew_y.cos(),
                skew_y.sin(),
                -skew_x.sin(),
                skew_x.cos(),
                t.x,
                t.y,
            );
            self.append(
                cos * t.scale_x,
                sin * t.scale_x,
                -sin * t.scale_y,
                cos * t.scale_y,
                0.0,
                0.0,
            );
        } else {
            self.append(
                cos * t.scale_x,
                sin * t.scale_x,
                -sin * t.scale_y,
                cos * t.scale_y,
                t.x,
                t.y,
            );
        }

        if t.reg_x != 0.0 || t.reg_y != 0.0 {
            self.tx -= t.reg_x * self.a + t.reg_y * self.c;
            self.ty -= t.reg_x * self.b + t.reg_y * self.d;
        }
        self
    }

    /// Prepends the local transform described by `t`.
    ///
    /// This is the building block for concatenation up a parent chain: the
    /// result equals `local(t) * self`.
    pub fn prepend_transform(&mut self, t: &TransformParts) -> &mut Self {
        let (cos, sin) = rotation_cos_sin(t.rotation);

        if t.reg_x != 0.0 || t.reg_y != 0.0 {
            self.tx -= t.reg_x;
            self.ty -= t.reg_y;
        }

        if t.skew_x != 0.0 || t.skew_y != 0.0 {
            let skew_x = t.skew_x * DEG_TO_RAD;
            let skew_y = t.skew_y * DEG_TO_RAD;
            self.prepend(
                cos * t.scale_x,
                sin * t.scale_x,
                -sin * t.scale_y,
                cos * t.scale_y,
                0.0,
                0.0,
            );
            self.prepend(
                skew_y.cos(),
                skew_y.sin(),
                -skew_x.sin(),
                skew_x.cos(),
                t.x,
                t.y,
            );
        } else {
            self.prepend(
                cos * t.scale_x,
                sin * t.scale_x,
                -sin * t.scale_y,
                cos * t.scale_y,
                t.x,
                t.y,
            );
        }
        self
    }

    /// Combines display properties as if `self` were the ancestor.
    ///
    /// Opacity multiplies, visibility is and-ed, and a `Some` shadow or blend
    /// mode in the arguments replaces the current one.
    pub fn append_properties(
        &mut self,
        opacity: f64,
        shadow: Option<Shadow>,
        blend_mode: Option<BlendMode>,
        visible: bool,
    ) -> &mut Self {
        self.opacity *= opacity;
        if shadow.is_some() {
            self.shadow = shadow;
        }
        if blend_mode.is_some() {
            self.blend_mode = blend_mode;
        }
        self.visible = self.visible && visible;
        self
    }

    /// Combines display properties as if the arguments belonged to an ancestor.
    ///
    /// Opacity multiplies, visibility is and-ed, and an existing shadow or
    /// blend mode is kept, so the descendant nearest the start of the walk
    /// wins.
    pub fn prepend_properties(
        &mut self,
        opacity: f64,
        shadow: Option<Shadow>,
        blend_mode: Option<BlendMode>,
        visible: bool,
    ) -> &mut Self {
        self.opacity *= opacity;
        self.shadow = self.shadow.or(shadow);
        self.blend_mode = self.blend_mode.or(blend_mode);
        self.visible = self.visible && visible;
        self
    }

    /// Rotates by `degrees`.
    pub fn rotate(&mut self, degrees: f64) -> &mut Self {
        let angle = degrees * DEG_TO_RAD;
        let (sin, cos) = (angle.sin(), angle.cos());
        let a1 = self.a;
        let b1 = self.b;

        self.a = a1 * cos + self.c * sin;
        self.b = b1 * cos + self.d * sin;
        self.c = -a1 * sin + self.c * cos;
        self.d = -b1 * sin + self.d * cos;
        self
    }

    /// Applies a skew, in degrees.
    pub fn skew(&mut self, skew_x: f64, skew_y: f64) -> &mut Self {
        let skew_x = skew_x * DEG_TO_RAD;
        let skew_y = skew_y * DEG_TO_RAD;
        self.append(
            skew_y.cos(),
            skew_y.sin(),
            -skew_x.sin(),
            skew_x.cos(),
            0.0,
            0.0,
        )
    }

    /// Scales the basis vectors.
    pub fn scale(&mut self, x: f64, y: f64) -> &mut Self {
        self.a *= x;
        self.b *= x;
        self.c *= y;
        self.d *= y;
        self
    }

    /// Translates in the matrix's local space.
    pub fn translate(&mut self, x: f64, y: f64) -> &mut Self {
        self.tx += self.a * x + self.c * y;
        self.ty += self.b * x + self.d * y;
        self
    }

    /// Inverts the affine part in place.
    ///
    /// A singular matrix produces non-finite coefficients; check
    /// [`Matrix2D::determinant`] first when that matters.
    pub fn invert(&mut self) -> &mut Self {
        let (a1, b1, c1, d1, tx1) = (self.a, self.b, self.c, self.d, self.tx);
        let n = a1 * d1 - b1 * c1;

        self.a = d1 / n;
        self.b = -b1 / n;
        self.c = -c1 / n;
        self.d = a1 / n;
        self.tx = (c1 * self.ty - d1 * tx1) / n;
        self.ty = -(a1 * self.ty - b1 * tx1) / n;
        self
    }

    /// `a * d - b * c`.
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Whether the affine part is exactly the identity.
    pub fn is_identity(&self) -> bool {
        self.tx == 0.0
            && self.ty == 0.0
            && self.a == 1.0
            && self.b == 0.0
            && self.c == 0.0
            && self.d == 1.0
    }

    /// Whether the affine parts are exactly equal. Properties are ignored.
    pub fn equals(&self, other: &Self) -> bool {
        self.tx == other.tx
            && self.ty == other.ty
            && self.a == other.a
            && self.b == other.b
            && self.c == other.c
            && self.d == other.d
    }

    /// Maps `p` through the affine part.
    pub fn transform_point(&self, p: Point) -> Point {
        Point::new(
            p.x * self.a + p.y * self.c + self.tx,
            p.x * self.b + p.y * self.d + self.ty,
        )
    }

    /// Decomposes the affine part into transform parts.
    ///
    /// Registration is always reported as zero. When the two skew angles agree
    /// the result is expressed as a rotation with zero skew.
    pub fn decompose(&self) -> TransformParts {
        let mut out = TransformParts {
            x: self.tx,
            y: self.ty,
            scale_x: (self.a * self.a + self.b * self.b).sqrt(),
            scale_y: (self.c * self.c + self.d * self.d).sqrt(),
            ..TransformParts::default()
        };

        let skew_x = (-self.c).atan2(self.d);
        let skew_y = self.b.atan2(self.a);

        if (skew_x - skew_y).abs() < 0.00001 {
            out.rotation = skew_y / DEG_TO_RAD;
            if self.a < 0.0 && self.d >= 0.0 {
                out.rotation += if out.rotation <= 0.0 { 180.0 } else { -180.0 };
            }
        } else {
            out.skew_x = skew_x / DEG_TO_RAD;
            out.skew_y = skew_y / DEG_TO_RAD;
        }
        out
    }
}

fn rotation_cos_sin(degrees: f64) -> (f64, f64) {
    if degrees % 360.0 != 0.0 {
        let angle = degrees * DEG_TO_RAD;
        (angle.cos(), angle.sin())
    } else {
        (1.0, 0.0)
    }
}
