//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::transform::TranslateMut;

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Rect {
    /// The lower-left corner.
    p0: Point,
    /// The upper-right corner.
    p1: Point,
}

impl Rect {
    /// Creates a rectangle with points `(left, bot), (right, top)`.
    ///
    /// # Panics
    ///
    /// Panics if `left > right` or `bot > top`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(10., 20., 30., 40.);
    /// assert_eq!(rect.width(), 20.);
    /// ```
    #[inline]
    pub fn from_sides(left: f64, bot: f64, right: f64, top: f64) -> Self {
        assert!(
            left <= right,
            "Rect::from_sides requires that left ({}) <= right ({})",
            left,
            right
        );
        assert!(
            bot <= top,
            "Rect::from_sides requires that bot ({}) <= top ({})",
            bot,
            top
        );
        Self::new(Point::new(left, bot), Point::new(right, top))
    }

    /// Creates a rectangle from its sides, returning `None` if the sides are inverted.
    pub fn from_sides_option(left: f64, bot: f64, right: f64, top: f64) -> Option<Self> {
        if left > right || bot > top {
            None
        } else {
            Some(Self::new(Point::new(left, bot), Point::new(right, top)))
        }
    }

    /// Creates a zero-area rectangle containing the given point.
    pub fn from_point(p: Point) -> Self {
        Self { p0: p, p1: p }
    }

    /// Creates a rectangle from any two opposite corners.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::new(Point::new(5., -1.), Point::new(-2., 3.));
    /// assert_eq!(rect, Rect::from_sides(-2., -1., 5., 3.));
    /// ```
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            p0: Point::new(a.x.min(b.x), a.y.min(b.y)),
            p1: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// The left edge.
    #[inline]
    pub fn left(&self) -> f64 {
        self.p0.x
    }

    /// The bottom edge.
    #[inline]
    pub fn bot(&self) -> f64 {
        self.p0.y
    }

    /// The right edge.
    #[inline]
    pub fn right(&self) -> f64 {
        self.p1.x
    }

    /// The top edge.
    #[inline]
    pub fn top(&self) -> f64 {
        self.p1.y
    }

    /// The lower-left corner.
    #[inline]
    pub fn lower_left(&self) -> Point {
        self.p0
    }

    /// The upper-right corner.
    #[inline]
    pub fn upper_right(&self) -> Point {
        self.p1
    }

    /// The horizontal extent.
    pub fn width(&self) -> f64 {
        self.p1.x - self.p0.x
    }

    /// The vertical extent.
    pub fn height(&self) -> f64 {
        self.p1.y - self.p0.y
    }

    /// The area of the rectangle.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// The center point of the rectangle.
    pub fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2., (self.p0.y + self.p1.y) / 2.)
    }

    /// The smallest rectangle containing both `self` and `other`.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0., 0., 1., 1.);
    /// let b = Rect::from_sides(2., -1., 3., 0.5);
    /// assert_eq!(a.union(b), Rect::from_sides(0., -1., 3., 1.));
    /// ```
    pub fn union(self, other: Self) -> Self {
        Self {
            p0: Point::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            p1: Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        }
    }

    /// The union of all rectangles in `rects`, or `None` if the iterator is empty.
    pub fn union_all_option(rects: impl IntoIterator<Item = Rect>) -> Option<Self> {
        rects.into_iter().reduce(Rect::union)
    }

    /// The four corners in counter-clockwise order, starting at the lower left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.p0,
            Point::new(self.p1.x, self.p0.y),
            self.p1,
            Point::new(self.p0.x, self.p1.y),
        ]
    }

    /// Converts the rectangle to a counter-clockwise [`Polygon`].
    ///
    /// Rectangles are not closed under arbitrary rotation, so transformations
    /// are applied to the polygon form.
    pub fn to_polygon(&self) -> Polygon {
        Polygon::from_verts(self.corners().to_vec())
    }
}

impl Bbox for Rect {
    fn bbox(&self) -> Option<Rect> {
        Some(*self)
    }
}

impl TranslateMut for Rect {
    fn translate_mut(&mut self, p: Point) {
        self.p0.translate_mut(p);
        self.p1.translate_mut(p);
    }
}

impl From<Rect> for Polygon {
    fn from(value: Rect) -> Self {
        value.to_polygon()
    }
}
