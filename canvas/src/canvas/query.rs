//! Read-only views of a canvas and its hierarchy.

use std::collections::BTreeSet;
use std::sync::Arc;

use geometry::bbox::union_option;
use geometry::prelude::*;
use indexmap::IndexMap;

use super::{Canvas, Label};
use crate::collect;
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::port::Port;

impl Canvas {
    /// Returns the port with the given name.
    pub fn port(&self, name: &str) -> Result<&Port> {
        self.ports.get(name).ok_or_else(|| Error::PortNotFound {
            canvas: self.name(),
            port: name.into(),
        })
    }

    /// The ports owned directly by this canvas, in insertion order.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    /// Returns copies of this canvas's ports and, down to `depth` levels of
    /// references (`None` for unbounded), the ports of nested canvases in this
    /// canvas's frame.
    ///
    /// Copies keep the name and uid of the port they were projected from.
    pub fn get_ports(&self, depth: Option<usize>) -> Vec<Port> {
        let mut out: Vec<Port> = self.ports.values().cloned().collect();
        if depth == Some(0) {
            return out;
        }
        let next = depth.map(|d| d - 1);
        for reference in self.references.iter() {
            let nested = reference.target().get_ports(next);
            for trans in reference.cell_transformations() {
                out.extend(nested.iter().cloned().map(|p| p.transform(trans)));
            }
        }
        out
    }

    /// Returns every polygon down to `depth` levels of references (`None` for
    /// unbounded), composed into this canvas's frame, grouped by layer.
    pub fn get_polygons(&self, depth: Option<usize>) -> IndexMap<Layer, Vec<Polygon>> {
        let mut out = IndexMap::new();
        self.collect_polygons(Transformation::identity(), depth, &mut out);
        out
    }

    fn collect_polygons(
        &self,
        trans: Transformation,
        depth: Option<usize>,
        out: &mut IndexMap<Layer, Vec<Polygon>>,
    ) {
        for (layer, polygons) in self.polygons.iter() {
            out.entry(*layer)
                .or_default()
                .extend(polygons.iter().cloned().map(|p| p.transform(trans)));
        }
        if depth == Some(0) {
            return;
        }
        let next = depth.map(|d| d - 1);
        for reference in self.references.iter() {
            for cell in reference.cell_transformations() {
                reference.target().collect_polygons(
                    Transformation::cascade(trans, cell),
                    next,
                    out,
                );
            }
        }
    }

    /// Returns every label down to `depth` levels of references, in this canvas's frame.
    pub fn get_labels(&self, depth: Option<usize>) -> Vec<Label> {
        let mut out = Vec::new();
        self.collect_labels(Transformation::identity(), depth, &mut out);
        out
    }

    fn collect_labels(&self, trans: Transformation, depth: Option<usize>, out: &mut Vec<Label>) {
        out.extend(self.labels.iter().cloned().map(|l| l.transform(trans)));
        if depth == Some(0) {
            return;
        }
        let next = depth.map(|d| d - 1);
        for reference in self.references.iter() {
            for cell in reference.cell_transformations() {
                reference.target().collect_labels(
                    Transformation::cascade(trans, cell),
                    next,
                    out,
                );
            }
        }
    }

    /// Every layer carrying at least one polygon anywhere in the hierarchy.
    pub fn layers(&self) -> BTreeSet<Layer> {
        let mut layers = BTreeSet::new();
        self.collect_layers(&mut layers);
        layers
    }

    fn collect_layers(&self, layers: &mut BTreeSet<Layer>) {
        layers.extend(
            self.polygons
                .iter()
                .filter(|(_, polygons)| !polygons.is_empty())
                .map(|(layer, _)| *layer),
        );
        for reference in self.references.iter() {
            reference.target().collect_layers(layers);
        }
    }

    /// The total polygon area, on one layer or on all of them.
    ///
    /// Overlapping polygons are counted once each.
    pub fn area(&self, layer: Option<Layer>) -> f64 {
        self.get_polygons(None)
            .iter()
            .filter(|(l, _)| layer.map(|target| **l == target).unwrap_or(true))
            .flat_map(|(_, polygons)| polygons.iter())
            .map(Polygon::area)
            .sum()
    }

    /// The canvases referenced by this one.
    ///
    /// With `recursive`, every canvas reachable through references, with each
    /// dependency listed before the canvases that use it. Shared canvases are
    /// listed once.
    pub fn get_dependencies(&self, recursive: bool) -> Vec<Arc<Canvas>> {
        if recursive {
            collect::dependencies(self)
        } else {
            let mut seen = BTreeSet::new();
            self.references
                .iter()
                .filter(|r| seen.insert(r.target().uid()))
                .map(|r| r.target().clone())
                .collect()
        }
    }

    /// Returns `true` if no reference anywhere in the hierarchy is off
    /// `grid_size` or placed at a non-right angle.
    pub fn has_valid_transformations(&self, grid_size: f64) -> bool {
        self.references.iter().all(|r| {
            r.is_valid(grid_size) && r.target().has_valid_transformations(grid_size)
        })
    }
}

impl Bbox for Canvas {
    fn bbox(&self) -> Option<Rect> {
        let own = self
            .polygons
            .values()
            .fold(None, |bbox, polygons| union_option(bbox, polygons.bbox()));
        self.references
            .iter()
            .fold(own, |bbox, reference| union_option(bbox, reference.bbox()))
    }
}
