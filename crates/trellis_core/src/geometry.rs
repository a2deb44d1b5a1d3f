//! Geometry primitives shared by the view tree, layouts and surfaces
//!
//! All coordinates are `f64`. A view's bounds are expressed in its parent's
//! coordinate space; clip rects are expressed in the view's own space.

use std::ops::{Add, Sub};

/// Tolerance for containment checks on derived edges
const EPSILON: f64 = 1e-9;

// ─────────────────────────────────────────────────────────────────────────────
// Core Geometry Types
// ─────────────────────────────────────────────────────────────────────────────

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Square size
    pub const fn square(side: f64) -> Self {
        Self::new(side, side)
    }

    /// A size is empty when either dimension is not positive
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Convert to a Rect at the origin (0, 0)
    pub const fn to_rect(self) -> Rect {
        Rect {
            origin: Point::ZERO,
            size: self,
        }
    }
}

impl From<Size> for Rect {
    fn from(size: Size) -> Self {
        size.to_rect()
    }
}

/// 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    /// The canonical empty rect, returned by intersections without overlap
    pub const EMPTY: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn x(&self) -> f64 {
        self.origin.x
    }

    pub fn y(&self) -> f64 {
        self.origin.y
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    pub fn right(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn position(&self) -> Point {
        self.origin
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.origin.x
            && point.x <= self.right()
            && point.y >= self.origin.y
            && point.y <= self.bottom()
    }

    /// True when `other` lies entirely inside this rect. Empty rects are
    /// contained by everything.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        if other.is_empty() {
            return true;
        }

        other.origin.x >= self.origin.x - EPSILON
            && other.origin.y >= self.origin.y - EPSILON
            && other.right() <= self.right() + EPSILON
            && other.bottom() <= self.bottom() + EPSILON
    }

    /// Offset the rect by a delta
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Rect {
            origin: Point::new(self.origin.x + dx, self.origin.y + dy),
            size: self.size,
        }
    }

    /// Same size, new origin
    pub fn with_origin(&self, origin: Point) -> Self {
        Rect {
            origin,
            size: self.size,
        }
    }

    /// Same origin, new size
    pub fn with_size(&self, size: Size) -> Self {
        Rect {
            origin: self.origin,
            size,
        }
    }

    /// Shrink the rect by the given insets
    pub fn inset(&self, insets: Insets) -> Self {
        Rect::new(
            self.origin.x + insets.left,
            self.origin.y + insets.top,
            (self.size.width - insets.left - insets.right).max(0.0),
            (self.size.height - insets.top - insets.bottom).max(0.0),
        )
    }

    /// Check if this rect overlaps another with positive area
    pub fn intersects(&self, other: &Rect) -> bool {
        self.origin.x < other.right()
            && self.right() > other.origin.x
            && self.origin.y < other.bottom()
            && self.bottom() > other.origin.y
    }

    /// Intersection of two rects, or [`Rect::EMPTY`] when they don't overlap
    pub fn intersect(&self, other: &Rect) -> Self {
        if self.is_empty() || other.is_empty() || !self.intersects(other) {
            return Rect::EMPTY;
        }

        let x = self.origin.x.max(other.origin.x);
        let y = self.origin.y.max(other.origin.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        Rect::new(x, y, right - x, bottom - y)
    }

    /// Smallest rect containing both
    pub fn union(&self, other: &Rect) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let min_x = self.origin.x.min(other.origin.x);
        let min_y = self.origin.y.min(other.origin.y);
        let max_x = self.right().max(other.right());
        let max_y = self.bottom().max(other.bottom());

        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Space reserved along each edge of a container
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Insets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Insets {
    pub const NONE: Insets = Insets::uniform(0.0);

    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    pub const fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transforms
// ─────────────────────────────────────────────────────────────────────────────

/// 2D affine transformation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    /// Matrix elements [a, b, c, d, tx, ty]
    /// | a  c  tx |
    /// | b  d  ty |
    /// | 0  0   1 |
    pub elements: [f64; 6],
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        elements: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    pub fn translation(x: f64, y: f64) -> Self {
        Self {
            elements: [1.0, 0.0, 0.0, 1.0, x, y],
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            elements: [sx, 0.0, 0.0, sy, 0.0, 0.0],
        }
    }

    pub fn rotation(angle: f64) -> Self {
        let c = angle.cos();
        let s = angle.sin();
        Self {
            elements: [c, s, -s, c, 0.0, 0.0],
        }
    }

    /// Horizontal flip around `x = width / 2`, used for right-to-left mirroring
    pub fn mirror(width: f64) -> Self {
        Self {
            elements: [-1.0, 0.0, 0.0, 1.0, width, 0.0],
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn transform_point(&self, point: Point) -> Point {
        let [a, b, c, d, tx, ty] = self.elements;
        Point::new(
            a * point.x + c * point.y + tx,
            b * point.x + d * point.y + ty,
        )
    }

    /// Concatenate this transform with another (self * other)
    /// The resulting transform first applies `other`, then `self`.
    pub fn then(&self, other: &AffineTransform) -> AffineTransform {
        let [a1, b1, c1, d1, tx1, ty1] = self.elements;
        let [a2, b2, c2, d2, tx2, ty2] = other.elements;

        AffineTransform {
            elements: [
                a1 * a2 + c1 * b2,
                b1 * a2 + d1 * b2,
                a1 * c2 + c1 * d2,
                b1 * c2 + d1 * d2,
                a1 * tx2 + c1 * ty2 + tx1,
                b1 * tx2 + d1 * ty2 + ty1,
            ],
        }
    }
}

/// Perspective camera used when a view renders 3D-transformed children
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Vanishing point, in the view's coordinate space
    pub position: Point,
    /// Distance from the viewer to the z = 0 plane
    pub distance: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            distance: 1000.0,
        }
    }
}

impl Camera {
    pub const fn new(position: Point, distance: f64) -> Self {
        Self { position, distance }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Color and Direction
// ─────────────────────────────────────────────────────────────────────────────

/// RGBA color
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Horizontal flow of a view's content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentDirection {
    #[default]
    LeftRight,
    RightLeft,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_intersect_overlap() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 25.0, 100.0, 100.0);

        assert_eq!(a.intersect(&b), Rect::new(50.0, 25.0, 50.0, 75.0));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);

        assert_eq!(a.intersect(&b), Rect::EMPTY);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_intersect_with_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersect(&Rect::EMPTY), Rect::EMPTY);
    }

    #[test]
    fn test_inset() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0).inset(Insets::uniform(10.0));
        assert_eq!(r, Rect::new(10.0, 10.0, 80.0, 80.0));
    }

    #[test]
    fn test_mirror_transform() {
        let m = AffineTransform::mirror(100.0);
        assert_eq!(m.transform_point(Point::new(10.0, 5.0)), Point::new(90.0, 5.0));
        assert!(m.then(&m).is_identity());
    }

    fn rect_strategy() -> impl Strategy<Value = Rect> {
        (-100.0..100.0f64, -100.0..100.0f64, 0.0..200.0f64, 0.0..200.0f64)
            .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
    }

    proptest! {
        #[test]
        fn test_intersection_is_contained_in_both(a in rect_strategy(), b in rect_strategy()) {
            let i = a.intersect(&b);
            prop_assert!(a.contains_rect(&i));
            prop_assert!(b.contains_rect(&i));
            prop_assert_eq!(i, b.intersect(&a));
        }
    }
}
