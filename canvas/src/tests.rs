use std::sync::Arc;

use approx::assert_abs_diff_eq;
use config::{Config, DuplicateCellPolicy, UncachedPolicy, WriteConfig};
use geometry::prelude::*;
use rust_decimal_macros::dec;

use crate::diagnostics::{Issue, Severity};
use crate::export::{ExportLibrary, Exporter, LayoutWriter};
use crate::{BuildCache, Canvas, Error, Placement, Port};

fn config(write: WriteConfig) -> Config {
    Config {
        write,
        ..Default::default()
    }
}

fn rect_cell(cache: &BuildCache, name: &str, width: f64) -> Arc<Canvas> {
    cache
        .get_or_build(name, || {
            let mut c = Canvas::new(name);
            c.add_polygon(Rect::from_sides(0., 0., width, 1.), (1, 0))?;
            c.add_port(Port::new("o1", (width, 0.5), 0., 0.5, (1, 0))?)?;
            Ok(c)
        })
        .unwrap()
}

#[test_log::test]
fn export_lists_top_first_then_dependencies_by_name() {
    let cache = BuildCache::new(Config::default());
    let zeta = rect_cell(&cache, "zeta", 1.);
    let alpha = rect_cell(&cache, "alpha", 2.);
    let mut mid = Canvas::new("mid");
    mid.add_ref(&zeta, Placement::at(0., 5.)).unwrap();
    let mid = cache.publish(mid);
    let mut top = Canvas::new("top");
    top.add_ref(&alpha, Placement::default()).unwrap();
    top.add_ref(&mid, Placement::at(10., 0.).rotated(90.))
        .unwrap();
    top.add_array(&zeta, 2, 2, (5., 5.)).unwrap();
    let top = cache.publish(top);

    let export = Exporter::new(&cache.config()).export(&top).unwrap();
    assert!(export.issues.is_empty());
    assert!(Arc::ptr_eq(&export.top, &top));

    let library = &export.library;
    assert_eq!(library.name, "library");
    assert_eq!(library.unit, dec!(0.000001));
    assert_eq!(library.precision, dec!(0.000000001));
    let names: Vec<_> = library.cell_names().cloned().collect();
    assert_eq!(names, vec!["top", "alpha", "mid", "zeta"]);

    let top_cell = library.cell("top").unwrap();
    let targets: Vec<_> = top_cell.instances.iter().map(|i| i.target.clone()).collect();
    assert_eq!(targets, vec!["alpha", "mid", "zeta"]);
    assert_eq!(top_cell.instances[1].transformation.angle(), 90.);
    assert_eq!(top_cell.instances[2].array.map(|a| a.rows), Some(2));
    assert!(top_cell.polygons.is_empty());
    assert_eq!(library.cell("zeta").unwrap().polygons.len(), 1);
}

#[test_log::test]
fn uncached_components_follow_policy() {
    let cache = BuildCache::new(Config::default());
    let leaf = rect_cell(&cache, "leaf", 1.);
    let mut draft = Canvas::new("draft");
    draft.add_ref(&leaf, Placement::default()).unwrap();
    let draft = Arc::new(draft);

    let strict = Exporter::new(&config(WriteConfig {
        on_uncached_component: UncachedPolicy::Error,
        ..Default::default()
    }));
    assert!(matches!(
        strict.export(&draft),
        Err(Error::UncachedComponent(names)) if names == vec!["draft"]
    ));

    let lenient = Exporter::new(&Config::default());
    let export = lenient.export(&draft).unwrap();
    assert_eq!(export.issues.num_warnings(), 1);
    assert!(export.issues.iter().any(|issue| matches!(
        issue,
        Issue::UncachedComponent { canvas, severity: Severity::Warning } if canvas == "draft"
    )));

    let quiet = Exporter::new(&config(WriteConfig {
        on_uncached_component: UncachedPolicy::Ignore,
        ..Default::default()
    }));
    assert!(quiet.export(&draft).unwrap().issues.is_empty());
}

/// Two distinct canvases named `X`, built by different caches.
fn colliding_top() -> (Arc<Canvas>, Arc<Canvas>, Arc<Canvas>) {
    let first = rect_cell(&BuildCache::new(Config::default()), "X", 1.);
    let second = rect_cell(&BuildCache::new(Config::default()), "X", 3.);
    assert!(!Arc::ptr_eq(&first, &second));

    let cache = BuildCache::new(Config::default());
    let mut wrapper = Canvas::new("wrapper");
    wrapper.add_ref(&second, Placement::default()).unwrap();
    let wrapper = cache.publish(wrapper);
    let mut top = Canvas::new("top");
    top.add_ref(&first, Placement::default()).unwrap();
    top.add_ref(&wrapper, Placement::at(0., 10.)).unwrap();
    (cache.publish(top), first, wrapper)
}

#[test_log::test]
fn duplicate_names_fail_under_error_policy() {
    let (top, _, _) = colliding_top();
    let exporter = Exporter::new(&config(WriteConfig {
        on_duplicate_cell: DuplicateCellPolicy::Error,
        ..Default::default()
    }));
    assert!(matches!(
        exporter.export(&top),
        Err(Error::NameCollision(names)) if names == vec!["X"]
    ));
}

#[test_log::test]
fn duplicate_names_are_merged_under_overwrite_policy() {
    let (top, first, wrapper) = colliding_top();
    let exporter = Exporter::new(&config(WriteConfig {
        on_duplicate_cell: DuplicateCellPolicy::Overwrite,
        ..Default::default()
    }));
    let export = exporter.export(&top).unwrap();
    assert!(export.issues.is_empty());

    let names: Vec<_> = export.library.cell_names().cloned().collect();
    assert_eq!(names, vec!["top", "X", "wrapper"]);
    let top = &export.top;
    assert!(Arc::ptr_eq(top.references()[0].target(), &first));
    let new_wrapper = top.references()[1].target();
    assert!(!Arc::ptr_eq(new_wrapper, &wrapper));
    assert!(Arc::ptr_eq(new_wrapper.references()[0].target(), &first));
    // The original wrapper still points at its own `X`.
    assert!(!Arc::ptr_eq(wrapper.references()[0].target(), &first));
}

#[test_log::test]
fn duplicate_names_are_reported_under_warn_policy() {
    let (top, _, _) = colliding_top();
    let export = Exporter::new(&Config::default()).export(&top).unwrap();
    assert_eq!(export.library.cells.len(), 3);
    assert!(export.issues.iter().any(|issue| matches!(
        issue,
        Issue::DuplicateCell { name, count: 2, .. } if name == "X"
    )));
}

#[test_log::test]
fn off_grid_references_are_flattened_on_export() {
    let cache = BuildCache::new(Config::default());
    let leaf = rect_cell(&cache, "leaf", 2.);
    let mut top = Canvas::new("top");
    top.add_ref(&leaf, Placement::at(0., 0.).rotated(45.))
        .unwrap();
    top.add_ref(&leaf, Placement::at(0., 5.)).unwrap();
    let top = cache.publish(top);

    let export = Exporter::new(&cache.config()).export(&top).unwrap();
    assert!(!Arc::ptr_eq(&export.top, &top));
    assert_eq!(export.top.name(), "top");
    assert!(export.top.has_valid_transformations(cache.config().grid_size));
    assert_eq!(export.issues.len(), 1);
    assert_eq!(export.issues.num_warnings(), 0);

    let cell = export.library.cell("top").unwrap();
    assert_eq!(cell.instances.len(), 1);
    assert_eq!(cell.polygons.len(), 1);
    assert_eq!(
        export.top.hash_geometry(1e-3),
        top.hash_geometry(1e-3)
    );
    assert_abs_diff_eq!(export.top.area(None), top.area(None), epsilon = 1e-9);

    let keep = Exporter::new(&config(WriteConfig {
        flatten_offgrid_references: false,
        ..Default::default()
    }));
    let export = keep.export(&top).unwrap();
    assert!(Arc::ptr_eq(&export.top, &top));
    assert_eq!(export.issues.num_warnings(), 1);
    assert_eq!(export.library.cell("top").unwrap().instances.len(), 2);
}

#[test_log::test]
fn unnamed_and_oversized_cells_are_reported() {
    let cache = BuildCache::new(Config::default());
    let mut blob = Canvas::unnamed();
    blob.add_polygon(Rect::from_sides(0., 0., 1., 1.), (1, 0))
        .unwrap();
    let blob = cache.publish(blob);

    let export = Exporter::new(&config(WriteConfig {
        max_points: 3,
        ..Default::default()
    }))
    .export(&blob)
    .unwrap();
    assert_eq!(export.issues.num_warnings(), 2);
    assert!(export
        .issues
        .iter()
        .any(|issue| matches!(issue, Issue::UnnamedCell { .. })));
    assert!(export.issues.iter().any(|issue| matches!(
        issue,
        Issue::TooManyPoints {
            points: 4,
            max_points: 3,
            ..
        }
    )));
}

#[derive(Default)]
struct Recorder {
    libraries: Vec<ExportLibrary>,
}

impl LayoutWriter for Recorder {
    type Error = std::io::Error;

    fn write_library(&mut self, library: &ExportLibrary) -> Result<(), Self::Error> {
        self.libraries.push(library.clone());
        Ok(())
    }
}

struct Broken;

impl LayoutWriter for Broken {
    type Error = std::io::Error;

    fn write_library(&mut self, _library: &ExportLibrary) -> Result<(), Self::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }
}

#[test_log::test]
fn writers_receive_the_exported_library() {
    let cache = BuildCache::new(Config::default());
    let leaf = rect_cell(&cache, "leaf", 1.);
    let exporter = Exporter::new(&cache.config());

    let mut recorder = Recorder::default();
    let export = exporter.write(&leaf, &mut recorder).unwrap();
    assert_eq!(recorder.libraries, vec![export.library]);

    let err = exporter.write(&leaf, &mut Broken).unwrap_err();
    assert!(matches!(err, Error::Write(_)));
    assert!(err.to_string().contains("disk full"));
}

#[test_log::test]
fn cached_builds_share_one_canvas() {
    let cache = BuildCache::new(Config::default());
    let a = rect_cell(&cache, "leaf", 1.);
    let b = rect_cell(&cache, "leaf", 5.);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 1);

    let mut top = Canvas::new("top");
    top.add_ref(&a, Placement::default()).unwrap();
    top.add_ref(&b, Placement::at(0., 2.)).unwrap();
    let top = cache.publish(top);
    let export = Exporter::new(&cache.config()).export(&top).unwrap();
    assert_eq!(export.library.cells.len(), 2);
}

#[test]
fn metadata_follows_the_child_link() {
    let cache = BuildCache::new(Config::default());
    let leaf = rect_cell(&cache, "leaf", 1.);
    let rotated = cache.publish(leaf.rotate(90.).unwrap());
    let metadata = rotated.metadata();
    assert_eq!(metadata.name, "leaf_rotate90");
    assert_eq!(metadata.child.map(|child| child.name), Some("leaf".into()));
    let json = serde_json::to_value(rotated.metadata()).unwrap();
    assert_eq!(json["settings"]["angle"], serde_json::json!(90.0));
}
