//! Placed, transformed instances of other canvases.

use std::sync::Arc;

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::error::{Error, Result};
use crate::port::Port;

/// Placement parameters of a [`Reference`].
///
/// Applied as: reflect about the x-axis, rotate, magnify, then translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Where the target's origin lands in the owning canvas.
    pub origin: Point,
    /// Counter-clockwise rotation in degrees.
    pub rotation: f64,
    /// Uniform scale factor.
    pub magnification: f64,
    /// Reflect about the x-axis before rotating.
    pub x_reflection: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            origin: Point::zero(),
            rotation: 0.,
            magnification: 1.,
            x_reflection: false,
        }
    }
}

impl Placement {
    /// A placement translating the target's origin to `(x, y)`.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            ..Default::default()
        }
    }

    /// Sets the rotation, in degrees.
    pub fn rotated(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the magnification.
    pub fn magnified(mut self, magnification: f64) -> Self {
        self.magnification = magnification;
        self
    }

    /// Reflects about the x-axis before rotating.
    pub fn reflected(mut self) -> Self {
        self.x_reflection = true;
        self
    }

    /// The equivalent [`Transformation`].
    pub fn transformation(&self) -> Transformation {
        Transformation::from_opts(
            self.origin,
            self.rotation,
            self.magnification,
            self.x_reflection,
        )
    }
}

impl From<Transformation> for Placement {
    fn from(value: Transformation) -> Self {
        Self {
            origin: value.offset_point(),
            rotation: value.angle(),
            magnification: value.magnification(),
            x_reflection: value.x_reflection(),
        }
    }
}

/// Grid instancing parameters of an array [`Reference`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrayParams {
    /// Number of rows.
    pub rows: u32,
    /// Number of columns.
    pub columns: u32,
    /// Column and row pitch, in the owning canvas's coordinates.
    pub spacing: Point,
}

/// An instantiation of a [`Canvas`] at a placement.
///
/// A reference shares its target and never mutates it.
#[derive(Debug, Clone)]
pub struct Reference {
    target: Arc<Canvas>,
    alias: ArcStr,
    transformation: Transformation,
    array: Option<ArrayParams>,
}

impl Reference {
    /// Creates an unplaced reference to `target`.
    ///
    /// The alias is assigned when the reference is added to a canvas.
    pub fn new(target: Arc<Canvas>) -> Self {
        Self {
            target,
            alias: ArcStr::new(),
            transformation: Transformation::identity(),
            array: None,
        }
    }

    /// Sets the placement.
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.transformation = placement.transformation();
        self
    }

    /// Requests an explicit alias.
    pub fn with_alias(mut self, alias: impl Into<ArcStr>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Makes this an array reference.
    pub fn with_array(mut self, array: ArrayParams) -> Self {
        self.array = Some(array);
        self
    }

    /// The referenced canvas.
    #[inline]
    pub fn target(&self) -> &Arc<Canvas> {
        &self.target
    }

    /// The alias of this reference within its owning canvas.
    #[inline]
    pub fn alias(&self) -> &ArcStr {
        &self.alias
    }

    /// The placement of this reference.
    pub fn placement(&self) -> Placement {
        self.transformation.into()
    }

    /// The placement transformation of the base array cell.
    #[inline]
    pub fn transformation(&self) -> Transformation {
        self.transformation
    }

    /// The array parameters, if this is an array reference.
    #[inline]
    pub fn array(&self) -> Option<ArrayParams> {
        self.array
    }

    /// The transformation of every instance this reference places.
    ///
    /// Array cells are offset by `(col * spacing.x, row * spacing.y)` in the
    /// owning canvas's frame, row-major. A plain reference yields one entry.
    pub fn cell_transformations(&self) -> Vec<Transformation> {
        match self.array {
            None => vec![self.transformation],
            Some(array) => {
                let mut out = Vec::with_capacity((array.rows * array.columns) as usize);
                for row in 0..array.rows {
                    for col in 0..array.columns {
                        let offset = Point::new(
                            col as f64 * array.spacing.x,
                            row as f64 * array.spacing.y,
                        );
                        out.push(
                            self.transformation
                                .with_offset(self.transformation.offset_point() + offset),
                        );
                    }
                }
                out
            }
        }
    }

    /// Returns `true` if every placed instance is on `grid_size` at a right angle.
    ///
    /// Array pitches must also land on the grid.
    pub fn is_valid(&self, grid_size: f64) -> bool {
        self.transformation.is_manhattan()
            && self.transformation.offset_point().is_on_grid(grid_size)
            && self
                .array
                .map(|a| a.spacing.is_on_grid(grid_size))
                .unwrap_or(true)
    }

    /// The target's ports, projected into the owning canvas's frame.
    ///
    /// For arrays, the ports of the base cell are returned.
    pub fn ports(&self) -> Vec<Port> {
        self.target
            .ports()
            .map(|port| port.clone().transform(self.transformation))
            .collect()
    }

    /// Returns the named port of the target, projected into the owning canvas's frame.
    pub fn port(&self, name: &str) -> Result<Port> {
        self.target
            .port(name)
            .map(|port| port.clone().transform(self.transformation))
            .map_err(|_| Error::PortNotFound {
                canvas: self.alias.clone(),
                port: name.into(),
            })
    }

    pub(crate) fn set_alias(&mut self, alias: ArcStr) {
        self.alias = alias;
    }

    pub(crate) fn set_target(&mut self, target: Arc<Canvas>) {
        self.target = target;
    }

    pub(crate) fn set_transformation(&mut self, transformation: Transformation) {
        self.transformation = transformation;
    }
}

impl Bbox for Reference {
    fn bbox(&self) -> Option<Rect> {
        let polygons: Vec<Polygon> = self
            .cell_transformations()
            .into_iter()
            .flat_map(|trans| {
                self.target
                    .bbox()
                    .map(|rect| rect.to_polygon().transform(trans))
            })
            .collect();
        polygons.bbox()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::canvas::Canvas;

    fn leaf() -> Arc<Canvas> {
        let mut c = Canvas::new("leaf");
        c.add_port(Port::new("o1", (10., 0.), 0., 0.5, (1, 0)).unwrap())
            .unwrap();
        c.add_polygon(Rect::from_sides(0., 0., 10., 2.), (1, 0)).unwrap();
        c.lock();
        Arc::new(c)
    }

    #[test]
    fn port_projects_through_rotation() {
        let r = Reference::new(leaf()).with_placement(Placement::default().rotated(90.));
        let port = r.port("o1").unwrap();
        assert_relative_eq!(port.center(), Point::new(0., 10.));
        assert_eq!(port.orientation(), 90.);
    }

    #[test]
    fn reflect_then_rotate_is_load_bearing() {
        let r = Reference::new(leaf())
            .with_placement(Placement::at(1., 1.).rotated(90.).reflected());
        let port = Port::new("p", (2., 3.), 45., 1., (1, 0))
            .unwrap()
            .transform(r.transformation());
        // (2, 3) -> (2, -3) -> (3, 2) -> (4, 3)
        assert_relative_eq!(port.center(), Point::new(4., 3.));
        assert_eq!(port.orientation(), 45.);
    }

    #[test]
    fn array_cells_offset_in_parent_frame() {
        let r = Reference::new(leaf())
            .with_placement(Placement::at(5., 0.).rotated(90.))
            .with_array(ArrayParams {
                rows: 2,
                columns: 3,
                spacing: Point::new(20., 7.),
            });
        let cells = r.cell_transformations();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0].offset_point(), Point::new(5., 0.));
        assert_eq!(cells[2].offset_point(), Point::new(45., 0.));
        assert_eq!(cells[5].offset_point(), Point::new(45., 7.));
        assert!(cells.iter().all(|t| t.angle() == 90.));
        assert_eq!(r.bbox(), Some(Rect::from_sides(3., 0., 45., 17.)));
    }

    #[test]
    fn validity_requires_grid_and_right_angles() {
        let target = leaf();
        let valid = Reference::new(target.clone())
            .with_placement(Placement::at(0.001, 2.5).rotated(270.));
        assert!(valid.is_valid(0.001));
        let off_grid = Reference::new(target.clone()).with_placement(Placement::at(0.0005, 0.));
        assert!(!off_grid.is_valid(0.001));
        let angled = Reference::new(target).with_placement(Placement::default().rotated(45.));
        assert!(!angled.is_valid(0.001));
    }
}
