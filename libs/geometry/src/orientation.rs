//! Utilities and types for orienting layout objects.

use serde::{Deserialize, Serialize};

use crate::transform::Transformation;

/// A named orientation.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NamedOrientation {
    /// No rotations or reflections.
    #[default]
    R0,
    /// Reflect vertically (ie. about the x-axis).
    ReflectVert,
    /// Reflect horizontally (ie. about the y-axis).
    ReflectHoriz,
    /// Rotate 90 degrees counter-clockwise.
    R90,
    /// Rotate 180 degrees counter-clockwise.
    R180,
    /// Rotate 270 degrees counter-clockwise.
    R270,
    /// Flip across the line y = x.
    FlipYx,
    /// Flip across the line y = -x.
    FlipMinusYx,
}

/// An orientation of a geometric object.
///
/// Captures reflection and rotation, but not position or scaling.
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Orientation {
    /// Reflect vertically.
    ///
    /// Applied before rotation.
    pub(crate) reflect_vert: bool,
    /// Counter-clockwise angle in degrees, in `[0, 360)`.
    ///
    /// Applied after reflecting vertically.
    pub(crate) angle: f64,
}

impl NamedOrientation {
    /// Returns a slice of all 8 possible named rectangular orientations.
    ///
    /// Users should not rely upon the order of the orientations returned.
    pub fn all_rectangular() -> [Self; 8] {
        [
            Self::R0,
            Self::ReflectVert,
            Self::ReflectHoriz,
            Self::R90,
            Self::R180,
            Self::R270,
            Self::FlipYx,
            Self::FlipMinusYx,
        ]
    }

    /// Converts this named orientation into a regular [`Orientation`].
    #[inline]
    pub fn into_orientation(self) -> Orientation {
        Orientation::from(self)
    }
}

impl From<NamedOrientation> for Orientation {
    fn from(value: NamedOrientation) -> Self {
        use NamedOrientation::*;
        let (reflect_vert, angle) = match value {
            R0 => (false, 0.),
            R90 => (false, 90.),
            R180 => (false, 180.),
            R270 => (false, 270.),
            ReflectVert => (true, 0.),
            FlipYx => (true, 90.),
            ReflectHoriz => (true, 180.),
            FlipMinusYx => (true, 270.),
        };
        Self {
            reflect_vert,
            angle,
        }
    }
}

impl Orientation {
    /// Creates a new orientation with the given reflection and angle settings.
    ///
    /// The angle is wrapped to `[0, 360)`.
    #[inline]
    pub fn from_reflect_and_angle(reflect_vert: bool, angle: f64) -> Self {
        Self {
            reflect_vert,
            angle: crate::wrap_angle(angle),
        }
    }

    /// Returns the identity orientation with `reflect_vert = false` and `angle = 0.`.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Applies the reflection and rotation specified in
    /// [`Orientation`] `o` to this orientation.
    ///
    /// `self` is the inner (child) orientation and `o` the outer (parent) one.
    pub fn apply(mut self, o: impl Into<Orientation>) -> Self {
        let o = o.into();
        match (self.reflect_vert, o.reflect_vert) {
            (false, false) | (true, false) => {
                self.angle += o.angle;
            }
            (false, true) => {
                self.reflect_vert = true;
                self.angle = o.angle - self.angle;
            }
            (true, true) => {
                self.reflect_vert = false;
                self.angle = o.angle - self.angle;
            }
        }

        self.wrap_angle()
    }

    /// Reflects the orientation vertically.
    #[inline]
    pub fn reflected_vert(self) -> Self {
        self.apply(NamedOrientation::ReflectVert)
    }

    /// Rotates the orientation counter-clockwise by `angle` degrees.
    #[inline]
    pub fn rotated(self, angle: f64) -> Self {
        self.apply(Orientation::from_reflect_and_angle(false, angle))
    }

    /// Returns whether the orientation is reflected vertically.
    #[inline]
    pub fn reflect_vert(&self) -> bool {
        self.reflect_vert
    }

    /// Returns the angle associated with this orientation.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Returns `true` if the rotation is a multiple of 90 degrees.
    #[inline]
    pub fn is_manhattan(&self) -> bool {
        crate::is_manhattan_angle(self.angle)
    }

    /// Maps a direction, given as an angle in degrees, through this orientation.
    ///
    /// A reflection negates the direction before the rotation is added.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let o = Orientation::from_reflect_and_angle(true, 90.);
    /// assert_eq!(o.map_direction(30.), 60.);
    /// ```
    pub fn map_direction(&self, direction: f64) -> f64 {
        let direction = if self.reflect_vert {
            -direction
        } else {
            direction
        };
        crate::wrap_angle(direction + self.angle)
    }

    #[inline]
    fn wrap_angle(mut self) -> Self {
        self.angle = crate::wrap_angle(self.angle);
        self
    }

    /// Returns the orientation represented by the given transformation.
    ///
    /// Captures the rotation and reflection encoded by the [`Transformation`],
    /// discarding the transformation's translation and magnification.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let tf = Transformation::identity();
    /// assert_eq!(Orientation::from_transformation(tf), NamedOrientation::R0.into());
    /// ```
    #[inline]
    pub fn from_transformation(value: Transformation) -> Self {
        value.orientation()
    }
}
