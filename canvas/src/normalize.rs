//! Removal of off-grid and non-Manhattan references before export.
//!
//! The pass walks the reference graph bottom-up. A canvas is copied only if
//! it holds an invalid reference or something beneath it was copied; every
//! other canvas is shared with the input graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arcstr::ArcStr;

use crate::canvas::{Canvas, Uid};
use crate::diagnostics::{Issue, IssueSet};
use crate::error::Result;

/// The suffix given to copies made outside of export.
pub const OFFGRID_SUFFIX: &str = "_offgrid";

/// How copies made by the [`Normalizer`] are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CopyNaming {
    /// Copies keep the name of the canvas they replace.
    ///
    /// Used at export time, where the copy stands in for the original.
    #[default]
    Keep,
    /// Copies are named `{name}_offgrid`.
    Suffix,
}

/// Flattens invalid references throughout a canvas hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    grid_size: f64,
    naming: CopyNaming,
}

/// The result of normalizing a hierarchy.
#[derive(Debug)]
pub struct Normalized {
    /// The top canvas; the input itself if nothing changed.
    pub top: Arc<Canvas>,
    /// The names of the canvases that were copied, bottom-up.
    pub copied: Vec<ArcStr>,
    /// One issue per flattened reference.
    pub issues: IssueSet<Issue>,
}

#[derive(Default)]
struct State {
    /// Copies made so far, by the uid of the canvas they replace.
    updated: HashMap<Uid, Arc<Canvas>>,
    visited: HashSet<Uid>,
    copied: Vec<ArcStr>,
    issues: IssueSet<Issue>,
}

impl Normalizer {
    /// Creates a normalizer validating against `grid_size`.
    pub fn new(grid_size: f64) -> Self {
        Self {
            grid_size,
            naming: CopyNaming::default(),
        }
    }

    /// Sets how copies are named.
    pub fn with_naming(mut self, naming: CopyNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Normalizes the hierarchy under `top`.
    ///
    /// Every canvas reachable from the returned top has only on-grid,
    /// right-angle references.
    pub fn normalize(&self, top: &Arc<Canvas>) -> Result<Normalized> {
        let _span = tracing::span!(tracing::Level::INFO, "normalize", top = %top.name()).entered();
        let mut state = State::default();
        let top = self.visit(top, &mut state)?;
        tracing::debug!(copied = state.copied.len(), "normalized hierarchy");
        Ok(Normalized {
            top,
            copied: state.copied,
            issues: state.issues,
        })
    }

    fn visit(&self, canvas: &Arc<Canvas>, state: &mut State) -> Result<Arc<Canvas>> {
        if state.visited.contains(&canvas.uid()) {
            return Ok(state
                .updated
                .get(&canvas.uid())
                .cloned()
                .unwrap_or_else(|| canvas.clone()));
        }

        let mut flatten = Vec::new();
        let mut subcell_modified = false;
        for reference in canvas.references() {
            if !reference.is_valid(self.grid_size) {
                flatten.push(reference.alias().clone());
            } else {
                let target = self.visit(reference.target(), state)?;
                if !Arc::ptr_eq(&target, reference.target()) {
                    subcell_modified = true;
                }
            }
        }

        let result = if flatten.is_empty() && !subcell_modified {
            canvas.clone()
        } else {
            let name = match self.naming {
                CopyNaming::Keep => canvas.name(),
                CopyNaming::Suffix => arcstr::format!("{}{OFFGRID_SUFFIX}", canvas.name()),
            };
            let mut copy = canvas.copy_named(name);
            for alias in flatten.iter() {
                copy.flatten_reference(alias)?;
                state.issues.add(Issue::InvalidTransform {
                    canvas: canvas.name(),
                    alias: alias.clone(),
                    flattened: true,
                });
            }
            copy.repoint_references(|target| state.updated.get(&target.uid()).cloned());
            copy.lock();
            state.copied.push(copy.name());
            Arc::new(copy)
        };

        if !Arc::ptr_eq(&result, canvas) {
            state.updated.insert(canvas.uid(), result.clone());
        }
        state.visited.insert(canvas.uid());
        Ok(result)
    }
}

/// Reports invalid references without changing anything.
pub fn report_invalid_references(top: &Arc<Canvas>, grid_size: f64) -> IssueSet<Issue> {
    let mut issues = IssueSet::new();
    for canvas in crate::collect::collect_closure(top) {
        for reference in canvas.references() {
            if !reference.is_valid(grid_size) {
                issues.add(Issue::InvalidTransform {
                    canvas: canvas.name(),
                    alias: reference.alias().clone(),
                    flattened: false,
                });
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use geometry::prelude::*;

    use super::*;
    use crate::reference::Placement;

    const GRID: f64 = 0.001;

    fn locked(mut canvas: Canvas) -> Arc<Canvas> {
        canvas.lock();
        Arc::new(canvas)
    }

    fn with_ref(name: &str, target: &Arc<Canvas>, placement: Placement) -> Arc<Canvas> {
        let mut c = Canvas::new(name);
        c.add_ref(target, placement).unwrap();
        locked(c)
    }

    struct Graph {
        base: Arc<Canvas>,
        mid_good: Arc<Canvas>,
        top: Arc<Canvas>,
    }

    /// `top -> {mid_bad -> bad -(30 deg)-> base, mid_good -> good -> base}`
    fn graph() -> Graph {
        let mut base = Canvas::new("base");
        base.add_polygon(Rect::from_sides(0., 0., 2., 1.), (1, 0))
            .unwrap();
        let base = locked(base);
        let bad = with_ref("bad", &base, Placement::at(1., 0.).rotated(30.));
        let good = with_ref("good", &base, Placement::at(1., 0.));
        let mid_bad = with_ref("mid_bad", &bad, Placement::at(0., 10.));
        let mid_good = with_ref("mid_good", &good, Placement::at(0., -10.));
        let mut top = Canvas::new("top");
        top.add_ref(&mid_bad, Placement::default()).unwrap();
        top.add_ref(&mid_good, Placement::default()).unwrap();
        Graph {
            base,
            mid_good,
            top: locked(top),
        }
    }

    #[test_log::test]
    fn copies_only_ancestors_of_invalid_references() {
        let graph = graph();
        assert!(!graph.top.has_valid_transformations(GRID));

        let normalized = Normalizer::new(GRID)
            .with_naming(CopyNaming::Suffix)
            .normalize(&graph.top)
            .unwrap();
        let top = &normalized.top;
        assert!(!Arc::ptr_eq(top, &graph.top));
        assert!(top.has_valid_transformations(GRID));
        assert_eq!(
            normalized.copied,
            vec!["bad_offgrid", "mid_bad_offgrid", "top_offgrid"]
        );

        let mid_bad = top.references()[0].target();
        assert_eq!(mid_bad.name(), "mid_bad_offgrid");
        assert!(mid_bad.is_locked());
        let bad = mid_bad.references()[0].target();
        assert!(bad.references().is_empty());
        assert_eq!(
            bad.info()[crate::canvas::FLATTENED_REFERENCES_KEY],
            serde_json::json!(["base_1"])
        );

        // Unaffected subgraphs are shared, not copied.
        assert!(Arc::ptr_eq(top.references()[1].target(), &graph.mid_good));
        let good = graph.mid_good.references()[0].target();
        assert!(Arc::ptr_eq(good.references()[0].target(), &graph.base));

        assert_eq!(normalized.issues.len(), 1);
        assert_eq!(normalized.issues.num_warnings(), 0);
        assert_eq!(
            top.hash_geometry(GRID),
            graph.top.hash_geometry(GRID)
        );
        // The input graph is untouched.
        assert!(!graph.top.has_valid_transformations(GRID));
    }

    #[test]
    fn export_copies_keep_their_names() {
        let graph = graph();
        let normalized = Normalizer::new(GRID).normalize(&graph.top).unwrap();
        assert_eq!(normalized.copied, vec!["bad", "mid_bad", "top"]);
        assert_eq!(normalized.top.name(), "top");
    }

    #[test]
    fn valid_hierarchies_are_returned_unchanged() {
        let mut base = Canvas::new("base");
        base.add_polygon(Rect::from_sides(0., 0., 1., 1.), (1, 0))
            .unwrap();
        let base = locked(base);
        let top = with_ref("top", &base, Placement::at(0.005, 2.).rotated(270.));

        let normalized = Normalizer::new(GRID).normalize(&top).unwrap();
        assert!(Arc::ptr_eq(&normalized.top, &top));
        assert!(normalized.copied.is_empty());
        assert!(normalized.issues.is_empty());
    }

    #[test]
    fn off_grid_translations_are_invalid() {
        let mut base = Canvas::new("base");
        base.add_polygon(Rect::from_sides(0., 0., 1., 1.), (1, 0))
            .unwrap();
        let base = locked(base);
        let top = with_ref("top", &base, Placement::at(0.0005, 0.));

        let issues = report_invalid_references(&top, GRID);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues.num_warnings(), 1);

        let normalized = Normalizer::new(GRID).normalize(&top).unwrap();
        assert!(normalized.top.references().is_empty());
        assert_eq!(normalized.top.polygons()[&crate::layer::Layer::new(1, 0)].len(), 1);
    }
}
