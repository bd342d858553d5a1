//! 2-D geometric operations relevant to hierarchical chip layout.
//!
//! Coordinates are `f64` (microns by convention). Placement transforms
//! support arbitrary rotation angles and magnification; Manhattan angles
//! are computed exactly so that right-angle placements stay exact.
//!
//! # Examples
//!
//! Create a [polygon](crate::polygon::Polygon) and place it:
//!
//! ```
//! # use geometry::prelude::*;
//! let poly = Polygon::from_verts(vec![
//!     Point::new(0., 0.),
//!     Point::new(10., 0.),
//!     Point::new(10., 5.),
//! ]);
//! let placed = poly.transform(Transformation::rotate(90.));
//! assert_eq!(placed.points()[1], Point::new(0., 10.));
//! ```
#![warn(missing_docs)]

extern crate self as geometry;

pub mod bbox;
pub mod orientation;
pub mod point;
pub mod polygon;
pub mod prelude;
pub mod rect;
pub mod snap;
pub mod transform;

/// Wraps the given angle to the interval `[0, 360)` degrees.
///
/// # Examples
///
/// ```
/// use geometry::wrap_angle;
///
/// assert_eq!(wrap_angle(10.), 10.);
/// assert_eq!(wrap_angle(-10.), 350.);
/// assert_eq!(wrap_angle(-740.), 340.);
/// assert_eq!(wrap_angle(-359.), 1.);
/// assert_eq!(wrap_angle(-1.), 359.);
/// assert_eq!(wrap_angle(725.), 5.);
/// assert_eq!(wrap_angle(360.), 0.);
/// assert_eq!(wrap_angle(-360.), 0.);
/// ```
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = ((angle % 360.) + 360.) % 360.;
    // Rounding can land exactly on 360.
    if wrapped >= 360. {
        0.
    } else {
        wrapped
    }
}

/// Returns `(sin, cos)` of an angle given in degrees.
///
/// Multiples of 90 degrees produce exact results.
///
/// ```
/// use geometry::sin_cos_deg;
///
/// assert_eq!(sin_cos_deg(90.), (1., 0.));
/// assert_eq!(sin_cos_deg(-90.), (-1., 0.));
/// assert_eq!(sin_cos_deg(540.), (0., -1.));
/// ```
pub fn sin_cos_deg(angle: f64) -> (f64, f64) {
    let angle = wrap_angle(angle);
    match manhattan_quadrant(angle) {
        Some(0) => (0., 1.),
        Some(1) => (1., 0.),
        Some(2) => (0., -1.),
        Some(3) => (-1., 0.),
        _ => angle.to_radians().sin_cos(),
    }
}

/// Returns `true` if `angle` (in degrees) is an integer multiple of 90 degrees.
///
/// ```
/// use geometry::is_manhattan_angle;
///
/// assert!(is_manhattan_angle(-270.));
/// assert!(!is_manhattan_angle(45.));
/// ```
pub fn is_manhattan_angle(angle: f64) -> bool {
    manhattan_quadrant(wrap_angle(angle)).is_some()
}

/// Tolerance used when deciding whether an angle is Manhattan.
pub(crate) const ANGLE_EPSILON: f64 = 1e-9;

fn manhattan_quadrant(wrapped: f64) -> Option<u8> {
    let q = (wrapped / 90.).round();
    if (wrapped - q * 90.).abs() < ANGLE_EPSILON {
        Some((q as i64).rem_euclid(4) as u8)
    } else {
        None
    }
}
