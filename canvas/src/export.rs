//! Conversion of a canvas hierarchy into a writer-ready library.
//!
//! The binary codec is not part of this crate. [`Exporter::export`] produces an
//! [`ExportLibrary`] that a [`LayoutWriter`] can walk: one [`ExportCell`] per
//! distinct canvas, each with its own geometry and a list of instances naming
//! their target cell.

use std::sync::Arc;

use arcstr::ArcStr;
use config::{Config, WriteConfig};
use geometry::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::canvas::{Canvas, Label};
use crate::collect::{check_uncached, collect_closure, resolve_duplicates};
use crate::diagnostics::{Issue, IssueSet};
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::normalize::{report_invalid_references, CopyNaming, Normalizer};
use crate::reference::ArrayParams;

/// A serializer for exported libraries, such as a GDS or OASIS writer.
pub trait LayoutWriter {
    /// The error produced by the writer.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes a complete library.
    fn write_library(&mut self, library: &ExportLibrary) -> std::result::Result<(), Self::Error>;
}

/// A flat list of cells ready to be serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLibrary {
    /// The library name.
    pub name: ArcStr,
    /// The size of a database unit, in meters.
    pub unit: Decimal,
    /// The precision of coordinates, in meters.
    pub precision: Decimal,
    /// The top cell first, then every dependency sorted by name.
    pub cells: Vec<ExportCell>,
}

/// One cell of an [`ExportLibrary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCell {
    /// The cell name.
    pub name: ArcStr,
    /// Polygons owned by the cell, by ascending layer.
    pub polygons: Vec<(Layer, Vec<Polygon>)>,
    /// Labels owned by the cell.
    pub labels: Vec<Label>,
    /// Placements of other cells, in reference order.
    pub instances: Vec<ExportInstance>,
}

/// A placement of one exported cell inside another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInstance {
    /// The name of the placed cell.
    pub target: ArcStr,
    /// The placement transformation.
    pub transformation: Transformation,
    /// Array parameters, if the instance is an array.
    pub array: Option<ArrayParams>,
}

/// The output of [`Exporter::export`].
#[derive(Debug)]
pub struct Export {
    /// The top canvas after normalization and duplicate resolution.
    pub top: Arc<Canvas>,
    /// The library to hand to a writer.
    pub library: ExportLibrary,
    /// Every non-fatal issue found along the way.
    pub issues: IssueSet<Issue>,
}

/// Prepares canvas hierarchies for serialization.
#[derive(Debug, Clone)]
pub struct Exporter {
    grid_size: f64,
    opts: WriteConfig,
}

impl Exporter {
    /// Creates an exporter with the grid and write settings of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            grid_size: config.grid_size,
            opts: config.write.clone(),
        }
    }

    /// Checks, normalizes, and deduplicates the hierarchy under `top`, then
    /// lowers it into an [`ExportLibrary`].
    ///
    /// Every policy is applied to the whole closure before anything is
    /// converted, so a failed export produces no partial library.
    pub fn export(&self, top: &Arc<Canvas>) -> Result<Export> {
        let _span = tracing::span!(tracing::Level::INFO, "export", top = %top.name()).entered();
        let mut issues = IssueSet::new();

        let uncached = check_uncached(top, self.opts.on_uncached_component);
        if uncached.has_error() {
            uncached.emit();
        }
        uncached.check()?;
        issues.merge(uncached);

        let top = if self.opts.flatten_offgrid_references {
            let normalized = Normalizer::new(self.grid_size)
                .with_naming(CopyNaming::Keep)
                .normalize(top)?;
            issues.merge(normalized.issues);
            normalized.top
        } else {
            issues.merge(report_invalid_references(top, self.grid_size));
            top.clone()
        };

        let deduplicated = resolve_duplicates(&top, self.opts.on_duplicate_cell)?;
        issues.merge(deduplicated.issues);
        let top = deduplicated.top;

        let mut closure = collect_closure(&top);
        // The closure is in post-order, so the top canvas is last.
        closure.pop();
        closure.sort_by_key(|canvas| canvas.name());

        let mut cells = Vec::with_capacity(closure.len() + 1);
        for canvas in std::iter::once(&top).chain(closure.iter()) {
            cells.push(self.export_cell(canvas, &mut issues));
        }
        issues.emit();
        tracing::info!(
            cells = cells.len(),
            warnings = issues.num_warnings(),
            "exported library"
        );

        Ok(Export {
            top,
            library: ExportLibrary {
                name: ArcStr::from(self.opts.lib_name.as_str()),
                unit: self.opts.unit,
                precision: self.opts.precision,
                cells,
            },
            issues,
        })
    }

    /// Exports `top` and hands the result to `writer`.
    pub fn write<W: LayoutWriter>(&self, top: &Arc<Canvas>, writer: &mut W) -> Result<Export> {
        let export = self.export(top)?;
        writer
            .write_library(&export.library)
            .map_err(|err| Error::Write(Box::new(err)))?;
        Ok(export)
    }

    fn export_cell(&self, canvas: &Canvas, issues: &mut IssueSet<Issue>) -> ExportCell {
        let name = canvas.name();
        tracing::trace!(cell = %name, "exporting cell");
        if canvas.is_unnamed() {
            issues.add(Issue::UnnamedCell { name: name.clone() });
        }

        let mut polygons: Vec<(Layer, Vec<Polygon>)> = canvas
            .polygons()
            .iter()
            .filter(|(_, polygons)| !polygons.is_empty())
            .map(|(layer, polygons)| (*layer, polygons.clone()))
            .collect();
        polygons.sort_by_key(|(layer, _)| *layer);
        for polygon in polygons.iter().flat_map(|(_, polygons)| polygons.iter()) {
            if polygon.len() > self.opts.max_points {
                issues.add(Issue::TooManyPoints {
                    canvas: name.clone(),
                    points: polygon.len(),
                    max_points: self.opts.max_points,
                });
            }
        }

        let instances = canvas
            .references()
            .iter()
            .map(|reference| ExportInstance {
                target: reference.target().name(),
                transformation: reference.transformation(),
                array: reference.array(),
            })
            .collect();

        ExportCell {
            name,
            polygons,
            labels: canvas.labels().to_vec(),
            instances,
        }
    }
}

impl ExportLibrary {
    /// Returns the cell with the given name.
    pub fn cell(&self, name: &str) -> Option<&ExportCell> {
        self.cells.iter().find(|cell| cell.name == name)
    }

    /// The names of every cell, in library order.
    pub fn cell_names(&self) -> impl Iterator<Item = &ArcStr> {
        self.cells.iter().map(|cell| &cell.name)
    }
}
