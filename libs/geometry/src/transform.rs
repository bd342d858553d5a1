//! Transformation types and traits.

use approx::{AbsDiffEq, RelativeEq};
use impl_trait_for_tuples::impl_for_tuples;
use serde::{Deserialize, Serialize};

use super::orientation::Orientation;
use crate::point::Point;

/// A placement transformation: reflection, rotation, magnification, then translation.
///
/// Applying a transformation to a point `p` computes
/// `offset + mag * R(angle) * F(reflect_vert) * p`, where `F` reflects about the
/// x-axis. The reflect-then-rotate-then-translate order matches how instances are
/// placed in GDS-style hierarchies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// Reflection and rotation.
    pub(crate) orientation: Orientation,
    /// Uniform scale factor.
    pub(crate) mag: f64,
    /// The x-y translation applied after the rotation.
    pub(crate) b: Point,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub fn identity() -> Self {
        Self {
            orientation: Orientation::identity(),
            mag: 1.,
            b: Point::zero(),
        }
    }

    /// Returns a translation by `(x,y)`.
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            b: Point::new(x, y),
            ..Self::identity()
        }
    }

    /// Returns a counter-clockwise rotation by `angle` degrees about the origin.
    pub fn rotate(angle: f64) -> Self {
        Self {
            orientation: Orientation::from_reflect_and_angle(false, angle),
            ..Self::identity()
        }
    }

    /// Returns a reflection about the x-axis.
    pub fn reflect_vert() -> Self {
        Self {
            orientation: Orientation::from_reflect_and_angle(true, 0.),
            ..Self::identity()
        }
    }

    /// Returns a uniform magnification about the origin.
    pub fn magnify(mag: f64) -> Self {
        Self {
            mag,
            ..Self::identity()
        }
    }

    /// Creates a transform from an offset and [`Orientation`].
    pub fn from_offset_and_orientation(offset: Point, orientation: impl Into<Orientation>) -> Self {
        Self {
            orientation: orientation.into(),
            mag: 1.,
            b: offset,
        }
    }

    /// Creates a transform from the placement parameters of an instance.
    ///
    /// `rotation` is in degrees. `x_reflection` reflects about the x-axis before rotating.
    pub fn from_opts(origin: Point, rotation: f64, magnification: f64, x_reflection: bool) -> Self {
        Self {
            orientation: Orientation::from_reflect_and_angle(x_reflection, rotation),
            mag: magnification,
            b: origin,
        }
    }

    /// Create a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// "Parents" and "children" refer to typical layout-instance hierarchies,
    /// in which each layer of instance has a nested set of transformations relative to its top-level parent.
    ///
    /// Note this operation *is not* commutative.
    /// For example the set of transformations:
    /// * (a) Reflect vertically, then
    /// * (b) Translate by (1,1)
    /// * (c) Place a point at (local coordinate) (1,1)
    ///
    /// Lands said point at (2,-2) in top-level space,
    /// whereas reversing the order of (a) and (b) lands it at (2,0).
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        // The child's origin is carried through the parent's linear part.
        let b = parent.apply(child.b);
        Self {
            orientation: child.orientation.apply(parent.orientation),
            mag: parent.mag * child.mag,
            b,
        }
    }

    /// Applies this transformation to a point.
    pub fn apply(&self, p: Point) -> Point {
        self.apply_linear(p) + self.b
    }

    /// Applies only the reflection, rotation, and magnification to a vector.
    pub fn apply_linear(&self, p: Point) -> Point {
        let y = if self.orientation.reflect_vert { -p.y } else { p.y };
        let (sin, cos) = crate::sin_cos_deg(self.orientation.angle);
        Point::new(
            self.mag * (p.x * cos - y * sin),
            self.mag * (p.x * sin + y * cos),
        )
    }

    /// The point representing the translation of this transformation.
    pub fn offset_point(&self) -> Point {
        self.b
    }

    /// Returns an [`Orientation`] corresponding to this transformation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// The magnification of this transformation.
    pub fn magnification(&self) -> f64 {
        self.mag
    }

    /// The rotation angle of this transformation, in degrees within `[0, 360)`.
    pub fn angle(&self) -> f64 {
        self.orientation.angle
    }

    /// Whether this transformation reflects about the x-axis before rotating.
    pub fn x_reflection(&self) -> bool {
        self.orientation.reflect_vert
    }

    /// Returns `true` if the rotation is a multiple of 90 degrees.
    pub fn is_manhattan(&self) -> bool {
        self.orientation.is_manhattan()
    }

    /// Returns the same transformation with its translation replaced.
    pub fn with_offset(mut self, offset: Point) -> Self {
        self.b = offset;
        self
    }

    /// Returns the inverse [`Transformation`] of `self`.
    ///
    /// # Panics
    ///
    /// Panics if the magnification is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use geometry::prelude::*;
    /// use approx::assert_relative_eq;
    ///
    /// let trans = Transformation::cascade(
    ///     Transformation::rotate(90.),
    ///     Transformation::translate(5., 10.),
    /// );
    /// let inv = trans.inv();
    ///
    /// assert_relative_eq!(Transformation::cascade(inv, trans), Transformation::identity());
    /// ```
    pub fn inv(&self) -> Transformation {
        assert!(self.mag != 0., "cannot invert a zero magnification");
        let orientation = if self.orientation.reflect_vert {
            // A reflection followed by a rotation is its own inverse.
            self.orientation
        } else {
            Orientation::from_reflect_and_angle(false, -self.orientation.angle)
        };
        let linear = Self {
            orientation,
            mag: 1. / self.mag,
            b: Point::zero(),
        };
        let b = -linear.apply(self.b);
        Self { b, ..linear }
    }
}

impl AbsDiffEq for Transformation {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.orientation.reflect_vert == other.orientation.reflect_vert
            && angle_abs_diff_eq(self.orientation.angle, other.orientation.angle, epsilon)
            && self.mag.abs_diff_eq(&other.mag, epsilon)
            && self.b.abs_diff_eq(&other.b, epsilon)
    }
}

impl RelativeEq for Transformation {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        self.orientation.reflect_vert == other.orientation.reflect_vert
            && angle_abs_diff_eq(self.orientation.angle, other.orientation.angle, epsilon)
            && self.mag.relative_eq(&other.mag, epsilon, max_relative)
            && self.b.relative_eq(&other.b, epsilon, max_relative)
    }
}

fn angle_abs_diff_eq(a: f64, b: f64, epsilon: f64) -> bool {
    let diff = crate::wrap_angle(a - b);
    diff.abs_diff_eq(&0., epsilon) || diff.abs_diff_eq(&360., epsilon)
}

/// A trait for specifying how an object is changed by a [`Transformation`].
#[impl_for_tuples(32)]
pub trait TransformMut {
    /// Applies matrix-vector [`Transformation`] `trans`.
    fn transform_mut(&mut self, trans: Transformation);
}

impl<T: TransformMut> TransformMut for Vec<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        for i in self.iter_mut() {
            i.transform_mut(trans);
        }
    }
}

impl<T: TransformMut> TransformMut for Option<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        if let Some(inner) = self.as_mut() {
            inner.transform_mut(trans);
        }
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
///
/// Takes in an owned copy of the shape and returns the transformed version.
pub trait Transform: TransformMut + Sized {
    /// Applies matrix-vector [`Transformation`] `trans`.
    ///
    /// Creates a new shape at a location equal to the transformation of the original.
    #[inline]
    fn transform(mut self, trans: Transformation) -> Self {
        self.transform_mut(trans);
        self
    }
}

impl<T: TransformMut + Sized> Transform for T {}

/// A trait for specifying how a shape is translated by a [`Point`].
#[impl_for_tuples(32)]
pub trait TranslateMut {
    /// Translates the shape by a [`Point`] through mutation.
    fn translate_mut(&mut self, p: Point);
}

impl<T: TranslateMut> TranslateMut for Vec<T> {
    fn translate_mut(&mut self, p: Point) {
        for i in self.iter_mut() {
            i.translate_mut(p);
        }
    }
}

impl<T: TranslateMut> TranslateMut for Option<T> {
    fn translate_mut(&mut self, p: Point) {
        if let Some(inner) = self.as_mut() {
            inner.translate_mut(p);
        }
    }
}

/// A trait for specifying how a shape is translated by a [`Point`].
///
/// Takes in an owned copy of the shape and returns the translated version.
pub trait Translate: TranslateMut + Sized {
    /// Translates the shape by a [`Point`] through mutation.
    ///
    /// Creates a new shape at a location equal to the translation of the original.
    fn translate(mut self, p: Point) -> Self {
        self.translate_mut(p);
        self
    }
}

impl<T: TranslateMut + Sized> Translate for T {}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::orientation::NamedOrientation;

    #[test]
    fn cascade_identity_preserves_transformation() {
        for orientation in NamedOrientation::all_rectangular() {
            let tf = Transformation::from_offset_and_orientation(Point::new(520., 130.), orientation);
            let casc = Transformation::cascade(tf, Transformation::identity());
            assert_eq!(
                tf, casc,
                "Cascading with identity produced incorrect transformation for orientation {:?}",
                orientation
            );
        }
    }

    #[test]
    fn point_transformations_work() {
        let pt = Point::new(2., 1.);

        let pt_reflect_vert = pt.transform(Transformation::from_offset_and_orientation(
            Point::zero(),
            NamedOrientation::ReflectVert,
        ));
        assert_eq!(pt_reflect_vert, Point::new(2., -1.));

        let pt_reflect_horiz = pt.transform(Transformation::from_offset_and_orientation(
            Point::zero(),
            NamedOrientation::ReflectHoriz,
        ));
        assert_eq!(pt_reflect_horiz, Point::new(-2., 1.));

        let pt_r90 = pt.transform(Transformation::from_offset_and_orientation(
            Point::new(23., 11.),
            NamedOrientation::R90,
        ));
        assert_eq!(pt_r90, Point::new(22., 13.));

        let pt_r180 = pt.transform(Transformation::from_offset_and_orientation(
            Point::new(-50., 10.),
            NamedOrientation::R180,
        ));
        assert_eq!(pt_r180, Point::new(-52., 9.));

        let pt_r270 = pt.transform(Transformation::from_offset_and_orientation(
            Point::new(80., 90.),
            NamedOrientation::R270,
        ));
        assert_eq!(pt_r270, Point::new(81., 88.));

        let pt_flip_yx = pt.transform(Transformation::from_offset_and_orientation(
            Point::new(-65., -101.),
            NamedOrientation::FlipYx,
        ));
        assert_eq!(pt_flip_yx, Point::new(-64., -99.));

        let pt_flip_minus_yx = pt.transform(Transformation::from_offset_and_orientation(
            Point::new(1., -5.),
            NamedOrientation::FlipMinusYx,
        ));
        assert_eq!(pt_flip_minus_yx, Point::new(0., -7.));
    }

    #[test]
    fn reflection_is_applied_before_rotation() {
        let pt = Point::new(1., 1.);
        let reflect_then_rotate = Transformation::from_opts(Point::zero(), 90., 1., true);
        assert_eq!(pt.transform(reflect_then_rotate), Point::new(1., 1.));
        let rotate_then_reflect =
            Transformation::cascade(Transformation::reflect_vert(), Transformation::rotate(90.));
        assert_eq!(pt.transform(rotate_then_reflect), Point::new(-1., -1.));
    }

    #[test]
    fn cascade_matches_sequential_application() {
        let parent = Transformation::from_opts(Point::new(3., -2.), 30., 2., true);
        let child = Transformation::from_opts(Point::new(-1., 4.), 115., 0.5, false);
        let pt = Point::new(0.7, -1.3);
        let sequential = pt.transform(child).transform(parent);
        let cascaded = pt.transform(Transformation::cascade(parent, child));
        assert_relative_eq!(sequential, cascaded, epsilon = 1e-12);
    }

    #[test]
    fn inverse_undoes_reflected_magnified_placement() {
        let tf = Transformation::from_opts(Point::new(10., 5.), 45., 3., true);
        let pt = Point::new(-2., 7.);
        assert_relative_eq!(pt.transform(tf).transform(tf.inv()), pt, epsilon = 1e-12);
        assert_relative_eq!(
            Transformation::cascade(tf, tf.inv()),
            Transformation::identity(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn translate_works_for_tuples() {
        let mut tuple = (Point::new(0., 0.), Point::new(50., -50.));
        tuple.translate_mut(Point::new(5., 10.));
        assert_eq!(tuple, (Point::new(5., 10.), Point::new(55., -40.)));
    }
}
