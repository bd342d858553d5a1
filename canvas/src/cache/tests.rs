use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use config::{Config, OnMutation};
use geometry::prelude::*;

use super::*;
use crate::error::Error;

fn cache() -> BuildCache {
    BuildCache::new(Config::default())
}

#[test_log::test]
fn repeated_names_are_suffixed_in_publication_order() {
    let cache = cache();
    let names: Vec<ArcStr> = (0..3)
        .map(|_| cache.publish(Canvas::new("X")).name())
        .collect();
    assert_eq!(names, vec!["X", "X$1", "X$2"]);
    assert_eq!(cache.len(), 3);
    assert!(cache.lookup("X$1").is_some());
    assert!(cache.lookup("X$3").is_none());
}

#[test_log::test]
fn literal_suffixed_names_do_not_collide() {
    let cache = cache();
    cache.publish(Canvas::new("X"));
    cache.publish(Canvas::new("X$1"));
    let third = cache.publish(Canvas::new("X"));
    assert_eq!(third.name(), "X$2");
    assert_eq!(cache.len(), 3);
}

#[test_log::test]
fn published_canvases_are_locked() {
    let cache = cache();
    let published = cache.publish(Canvas::new("cell"));
    assert!(published.is_locked());
    assert!(cache.contains(&published));

    cache.reset();
    assert!(cache.is_empty());
    let mut canvas = Arc::try_unwrap(published).expect("cache released its handle");
    let err = canvas
        .add_polygon(Rect::from_sides(0., 0., 1., 1.), (1, 0))
        .unwrap_err();
    assert!(matches!(err, Error::Mutability { .. }));
}

#[test_log::test]
fn warn_policy_allows_mutation_after_publication() {
    let cache = BuildCache::new(Config {
        on_mutation: OnMutation::Warn,
        ..Default::default()
    });
    let published = cache.publish(Canvas::new("cell"));
    cache.reset();
    let mut canvas = Arc::try_unwrap(published).expect("cache released its handle");
    assert!(canvas.is_locked());
    assert_eq!(
        canvas
            .add_polygon(Rect::from_sides(0., 0., 1., 1.), (1, 0))
            .unwrap(),
        1
    );
}

#[test_log::test]
fn rename_moves_the_registered_entry() {
    let cache = cache();
    let a = cache.publish(Canvas::new("a"));
    let taken = cache.publish(Canvas::new("b"));

    let name = cache.rename(&a, "b");
    assert_eq!(name, "b$1");
    assert_eq!(a.name(), "b$1");
    assert!(cache.lookup("a").is_none());
    assert!(Arc::ptr_eq(&cache.lookup("b$1").unwrap(), &a));
    assert!(Arc::ptr_eq(&cache.lookup("b").unwrap(), &taken));
}

#[test_log::test]
fn renaming_to_the_current_name_keeps_it() {
    let cache = cache();
    let x = cache.publish(Canvas::new("X"));
    assert_eq!(cache.rename(&x, "X"), "X");
    assert_eq!(x.name(), "X");
    assert!(Arc::ptr_eq(&cache.lookup("X").unwrap(), &x));
    assert_eq!(cache.len(), 1);
}

#[test_log::test]
fn reset_restarts_name_counters() {
    let cache = cache();
    cache.publish(Canvas::new("X"));
    cache.reset();
    assert_eq!(cache.publish(Canvas::new("X")).name(), "X");
}

#[test_log::test]
fn long_names_are_shortened_deterministically() {
    let cache = BuildCache::new(Config {
        max_name_length: 16,
        ..Default::default()
    });
    let long = "a_very_long_generated_canvas_name";
    let published = cache.publish(Canvas::new(long));
    let name = published.name();
    assert_eq!(name.len(), 16);
    assert!(name.starts_with("a_very_"));
    assert_eq!(name, shorten_name(long, 16));
    assert_eq!(shorten_name("short", 16), "short");
}

#[test_log::test]
fn suffixed_long_names_stay_within_the_limit() {
    let cache = BuildCache::new(Config {
        max_name_length: 16,
        ..Default::default()
    });
    let long = "a_very_long_generated_canvas_name";
    let first = cache.publish(Canvas::new(long)).name();
    let second = cache.publish(Canvas::new(long)).name();
    assert_ne!(first, second);
    assert_eq!(first, shorten_name(long, 16));
    assert_eq!(second, shorten_name(&format!("{long}$1"), 16));
    assert!(second.len() <= 16);
    assert_eq!(cache.len(), 2);
}

#[test_log::test]
fn get_or_build_is_single_flight() {
    let cache = cache();
    let builds = AtomicUsize::new(0);
    let barrier = Barrier::new(4);

    let (cache, builds, barrier) = (&cache, &builds, &barrier);
    let results: Vec<Arc<Canvas>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_build("straight(length=10)", || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(Canvas::new("straight"))
                        })
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|c| Arc::ptr_eq(c, &results[0])));
    assert_eq!(cache.len(), 1);
}

#[test_log::test]
fn failed_builds_are_retried() {
    let cache = cache();
    let err = cache.get_or_build("broken", || {
        Err(Error::InvalidGeometry("no outline".into()))
    });
    assert!(err.is_err());
    let built = cache
        .get_or_build("broken", || Ok(Canvas::new("fixed")))
        .unwrap();
    assert_eq!(built.name(), "fixed");
}

#[test_log::test]
fn init_replaces_configuration() {
    let cache = cache();
    cache.publish(Canvas::new("X"));
    cache.init(Config {
        grid_size: 0.005,
        ..Default::default()
    });
    assert!(cache.is_empty());
    assert_eq!(cache.config().grid_size, 0.005);
}
