//! Geometry accepted by [`Canvas::add_polygon`](crate::canvas::Canvas::add_polygon).

use geometry::prelude::*;

use crate::error::{Error, Result};

/// A polygon-like input, resolved once into plain polygons.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryInput {
    /// A single outline.
    Points(Vec<Point>),
    /// An outline with interior rings removed.
    WithHoles {
        /// The outer boundary.
        exterior: Vec<Point>,
        /// Interior rings to subtract.
        holes: Vec<Vec<Point>>,
    },
    /// Several independent inputs.
    Multi(Vec<GeometryInput>),
}

impl GeometryInput {
    /// Resolves this input into simple polygons.
    ///
    /// Polygons with zero area are dropped. Fails on non-finite coordinates.
    pub fn into_polygons(self) -> Result<Vec<Polygon>> {
        let mut out = Vec::new();
        self.resolve_into(&mut out)?;
        Ok(out)
    }

    fn resolve_into(self, out: &mut Vec<Polygon>) -> Result<()> {
        let polygon = match self {
            Self::Points(points) => {
                check_finite(&points)?;
                Polygon::from_verts(points)
            }
            Self::WithHoles { exterior, holes } => {
                check_finite(&exterior)?;
                for hole in holes.iter() {
                    check_finite(hole)?;
                }
                Polygon::with_holes(
                    Polygon::from_verts(exterior),
                    holes.into_iter().map(Polygon::from_verts).collect(),
                )
            }
            Self::Multi(inputs) => {
                for input in inputs {
                    input.resolve_into(out)?;
                }
                return Ok(());
            }
        };
        if polygon.area() > 0. {
            out.push(polygon);
        }
        Ok(())
    }
}

fn check_finite(points: &[Point]) -> Result<()> {
    if points.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
        Ok(())
    } else {
        Err(Error::InvalidGeometry("non-finite coordinate".into()))
    }
}

impl From<Vec<Point>> for GeometryInput {
    fn from(value: Vec<Point>) -> Self {
        Self::Points(value)
    }
}

impl From<Vec<(f64, f64)>> for GeometryInput {
    fn from(value: Vec<(f64, f64)>) -> Self {
        Self::Points(value.into_iter().map(Point::from).collect())
    }
}

impl From<Polygon> for GeometryInput {
    fn from(value: Polygon) -> Self {
        Self::Points(value.into_points())
    }
}

impl From<Rect> for GeometryInput {
    fn from(value: Rect) -> Self {
        Self::Points(value.corners().to_vec())
    }
}
