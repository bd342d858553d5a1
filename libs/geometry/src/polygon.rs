//! Polygons with floating-point vertex coordinates.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// A simple polygon, given by its vertices in order.
///
/// The closing edge from the last vertex back to the first is implicit.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    /// Vector of points that make up the polygon.
    points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon with given vertices.
    pub fn from_verts(vec: Vec<Point>) -> Self {
        Self { points: vec }
    }

    /// Creates a single polygon covering `exterior` minus `holes`.
    ///
    /// Each hole is joined to the outline through a zero-width cut ("keyhole"),
    /// so the result is one vertex list with no interior boundaries. The cut
    /// runs to the nearest outline vertex that can be reached without
    /// crossing an edge, so concave outlines are handled.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let outer = Rect::from_sides(0., 0., 10., 10.).to_polygon();
    /// let hole = Rect::from_sides(4., 4., 6., 6.).to_polygon();
    /// let donut = Polygon::with_holes(outer, vec![hole]);
    /// assert_eq!(donut.area(), 96.);
    /// ```
    pub fn with_holes(exterior: Polygon, holes: Vec<Polygon>) -> Self {
        let mut points = exterior.oriented(true).points;
        for hole in holes {
            let hole = hole.oriented(false).points;
            if hole.is_empty() {
                continue;
            }
            // Bridge from the hole's rightmost vertex to the closest outline
            // vertex it can see; the bridge must not cut any existing edge.
            let (j, hp) = hole
                .iter()
                .copied()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.x.total_cmp(&b.x))
                .unwrap_or((0, hole[0]));
            let mut candidates: Vec<usize> = (0..points.len()).collect();
            candidates.sort_by(|&a, &b| dist2(points[a], hp).total_cmp(&dist2(points[b], hp)));
            let visible = |i: &usize| {
                !cuts_ring(hp, points[*i], &points) && !cuts_ring(hp, points[*i], &hole)
            };
            let Some(i) = candidates
                .iter()
                .copied()
                .find(visible)
                .or_else(|| candidates.first().copied())
            else {
                points = hole;
                continue;
            };
            let anchor = points[i];
            let mut spliced = Vec::with_capacity(points.len() + hole.len() + 2);
            spliced.extend_from_slice(&points[..=i]);
            spliced.extend(hole[j..].iter().chain(hole[..j].iter()).copied());
            spliced.push(hp);
            spliced.push(anchor);
            spliced.extend_from_slice(&points[i + 1..]);
            points = spliced;
        }
        Self { points }
    }

    /// Returns the vertices of the polygon.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the polygon, returning its vertices.
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the polygon has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the bottom y-coordinate in the polygon.
    pub fn bot(&self) -> Option<f64> {
        self.points.iter().map(|p| p.y).reduce(f64::min)
    }

    /// Returns the top y-coordinate in the polygon.
    pub fn top(&self) -> Option<f64> {
        self.points.iter().map(|p| p.y).reduce(f64::max)
    }

    /// Returns the leftmost x-coordinate in the polygon.
    pub fn left(&self) -> Option<f64> {
        self.points.iter().map(|p| p.x).reduce(f64::min)
    }

    /// Returns the rightmost x-coordinate in the polygon.
    pub fn right(&self) -> Option<f64> {
        self.points.iter().map(|p| p.x).reduce(f64::max)
    }

    /// The signed area of the polygon: positive when counter-clockwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let tri = Polygon::from_verts(vec![
    ///     Point::new(0., 0.),
    ///     Point::new(4., 0.),
    ///     Point::new(0., 3.),
    /// ]);
    /// assert_eq!(tri.signed_area(), 6.);
    /// ```
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice / 2.
    }

    /// The enclosed area of the polygon.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Returns a copy with every vertex snapped to `grid`.
    pub fn snap_to_grid(&self, grid: f64) -> Self {
        Self {
            points: self.points.iter().map(|p| p.snap_to_grid(grid)).collect(),
        }
    }

    /// Returns the vertices with their coordinates quantized to multiples of `precision`.
    pub fn grid_indices(&self, precision: f64) -> Vec<(i64, i64)> {
        self.points
            .iter()
            .map(|p| p.to_grid_indices(precision))
            .collect()
    }

    fn oriented(mut self, ccw: bool) -> Self {
        if (self.signed_area() > 0.) != ccw {
            self.points.reverse();
        }
        self
    }
}

fn dist2(a: Point, b: Point) -> f64 {
    let d = a - b;
    d.x * d.x + d.y * d.y
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Returns `true` if segments `ab` and `cd` cross at a point interior to both.
fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let opposite = |u: f64, v: f64| (u > 0. && v < 0.) || (u < 0. && v > 0.);
    opposite(cross(c, d, a), cross(c, d, b)) && opposite(cross(a, b, c), cross(a, b, d))
}

/// Returns `true` if segment `ab` crosses any edge of the closed ring `ring`.
fn cuts_ring(a: Point, b: Point, ring: &[Point]) -> bool {
    let n = ring.len();
    (0..n).any(|k| segments_cross(a, b, ring[k], ring[(k + 1) % n]))
}

impl Bbox for Polygon {
    fn bbox(&self) -> Option<Rect> {
        Rect::from_sides_option(self.left()?, self.bot()?, self.right()?, self.top()?)
    }
}

impl TranslateMut for Polygon {
    fn translate_mut(&mut self, p: Point) {
        self.points.translate_mut(p);
    }
}

impl TransformMut for Polygon {
    fn transform_mut(&mut self, trans: Transformation) {
        self.points.transform_mut(trans);
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(value: Vec<Point>) -> Self {
        Self::from_verts(value)
    }
}
