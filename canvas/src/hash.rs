//! Order-independent geometry digests.

use sha2::{Digest, Sha256};

use crate::canvas::Canvas;

/// The default hashing precision, in layout units.
pub const DEFAULT_HASH_PRECISION: f64 = 1e-4;

/// Computes a digest of every polygon in the hierarchy under `canvas`.
///
/// Coordinates are rounded to multiples of `precision` before hashing.
/// Layers are visited in ascending order and the polygon digests of each
/// layer are sorted, so the result does not depend on insertion order.
///
/// # Panics
///
/// Panics if `precision` is not positive.
pub fn hash_geometry(canvas: &Canvas, precision: f64) -> String {
    assert!(precision > 0., "hash precision must be positive");

    let mut layers: Vec<_> = canvas
        .get_polygons(None)
        .into_iter()
        .filter(|(_, polygons)| !polygons.is_empty())
        .collect();
    layers.sort_by_key(|(layer, _)| *layer);

    let mut hasher = Sha256::new();
    for (layer, polygons) in layers {
        hasher.update(i64::from(layer.layer).to_le_bytes());
        hasher.update(i64::from(layer.datatype).to_le_bytes());

        let mut digests: Vec<[u8; 32]> = polygons
            .iter()
            .map(|polygon| {
                let mut h = Sha256::new();
                for (x, y) in polygon.grid_indices(precision) {
                    h.update(x.to_le_bytes());
                    h.update(y.to_le_bytes());
                }
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&h.finalize());
                digest
            })
            .collect();
        digests.sort_unstable();
        for digest in digests {
            hasher.update(digest);
        }
    }
    hex::encode(hasher.finalize())
}

impl Canvas {
    /// Computes an order-independent digest of this canvas's geometry.
    ///
    /// See [`hash_geometry`].
    pub fn hash_geometry(&self, precision: f64) -> String {
        hash_geometry(self, precision)
    }
}
