//! Snapping utilities (eg. snap to a grid).

/// Relative tolerance, in grid units, for deciding that a coordinate is on grid.
pub const GRID_TOLERANCE: f64 = 1e-6;

/// Snaps `pos` to the nearest multiple of `grid`.
///
/// ```
/// use geometry::snap::snap_to_grid;
///
/// assert_eq!(snap_to_grid(12., 5.), 10.);
/// assert_eq!(snap_to_grid(-13., 5.), -15.);
/// ```
pub fn snap_to_grid(pos: f64, grid: f64) -> f64 {
    assert!(grid > 0.);
    (pos / grid).round() * grid
}

/// Returns `true` if `pos` is a multiple of `grid`, up to [`GRID_TOLERANCE`] grid units.
///
/// ```
/// use geometry::snap::is_on_grid;
///
/// assert!(is_on_grid(0.003, 0.001));
/// assert!(!is_on_grid(0.0005, 0.001));
/// ```
pub fn is_on_grid(pos: f64, grid: f64) -> bool {
    assert!(grid > 0.);
    let units = pos / grid;
    (units - units.round()).abs() < GRID_TOLERANCE
}
