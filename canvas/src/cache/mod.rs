//! The process-wide registry of published canvases.
//!
//! Publishing a canvas locks it and registers it under a name no other live
//! canvas holds. A name used before gets a `$n` suffix, where `n` counts the
//! earlier uses, so uniqueness follows from publication order alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use arcstr::ArcStr;
use config::Config;
use once_cell::sync::{Lazy, OnceCell};
use sha2::{Digest, Sha256};

use crate::canvas::Canvas;
use crate::diagnostics::{Issue, IssueSet, Severity};
use crate::error::Result;

#[cfg(test)]
mod tests;

static GLOBAL: Lazy<BuildCache> = Lazy::new(|| {
    let config = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(Config::load)
        .unwrap_or_else(|err| {
            tracing::warn!("using default canvas configuration: {err:#}");
            Config::default()
        });
    BuildCache::new(config)
});

#[derive(Debug, Default)]
struct Registry {
    /// How many times each requested name has been published.
    counters: HashMap<ArcStr, usize>,
    cells: HashMap<ArcStr, Arc<Canvas>>,
}

/// A registry enforcing one live canvas per name.
#[derive(Debug)]
pub struct BuildCache {
    config: RwLock<Config>,
    registry: Mutex<Registry>,
    /// In-flight and completed builds by key.
    builds: Mutex<HashMap<ArcStr, Arc<OnceCell<Arc<Canvas>>>>>,
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl BuildCache {
    /// Creates an empty cache.
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
            registry: Mutex::new(Registry::default()),
            builds: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache.
    ///
    /// Configured from the `canvas.toml` files visible from the current directory.
    pub fn global() -> &'static BuildCache {
        &GLOBAL
    }

    /// Clears every registered canvas, name counter, and memoized build.
    pub fn reset(&self) {
        *self.registry() = Registry::default();
        self.builds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!("reset build cache");
    }

    /// Resets the cache and replaces its configuration.
    pub fn init(&self, config: Config) {
        self.reset();
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// The active configuration.
    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks `canvas` and registers it under a unique name.
    ///
    /// Names longer than the configured maximum, including any `$n` suffix,
    /// are shortened. The canvas records the configured mutation severity.
    pub fn publish(&self, mut canvas: Canvas) -> Arc<Canvas> {
        let config = self.config();
        let mut registry = self.registry();
        let name = registry.claim(canvas.name(), config.max_name_length);
        canvas.set_name_unchecked(name.clone());
        canvas.lock_with(Severity::from(config.on_mutation));
        let canvas = Arc::new(canvas);
        registry.cells.insert(name.clone(), canvas.clone());
        tracing::debug!(%name, uid = %canvas.uid(), "published canvas");
        canvas
    }

    /// Returns the canvas registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Arc<Canvas>> {
        self.registry().cells.get(name).cloned()
    }

    /// Returns `true` if `canvas` is the object registered under its name.
    pub fn contains(&self, canvas: &Arc<Canvas>) -> bool {
        self.registry()
            .cells
            .get(&canvas.name())
            .map(|registered| Arc::ptr_eq(registered, canvas))
            .unwrap_or(false)
    }

    /// The number of registered canvases.
    pub fn len(&self) -> usize {
        self.registry().cells.len()
    }

    /// Returns `true` if no canvases are registered.
    pub fn is_empty(&self) -> bool {
        self.registry().cells.is_empty()
    }

    /// Renames a published canvas, returning the name it was registered under.
    ///
    /// The canvas's current entry is dropped if it is this object, and the new
    /// name is disambiguated like any published name. Renaming a canvas to its
    /// current name does nothing.
    pub fn rename(&self, canvas: &Arc<Canvas>, name: impl Into<ArcStr>) -> ArcStr {
        let requested = name.into();
        let old = canvas.name();
        if requested == old {
            return old;
        }
        let config = self.config();
        let mut registry = self.registry();
        if registry
            .cells
            .get(&old)
            .map(|registered| Arc::ptr_eq(registered, canvas))
            .unwrap_or(false)
        {
            registry.cells.remove(&old);
        }
        let name = registry.claim(requested, config.max_name_length);
        canvas.set_name_unchecked(name.clone());
        registry.cells.insert(name.clone(), canvas.clone());
        tracing::debug!(%old, new = %name, "renamed canvas");
        name
    }

    /// Returns the canvas built for `key`, building and publishing it on first use.
    ///
    /// At most one build per key runs at a time; concurrent callers with the
    /// same key block until it finishes and share its result. A failed build is
    /// not memoized.
    pub fn get_or_build(
        &self,
        key: impl Into<ArcStr>,
        build: impl FnOnce() -> Result<Canvas>,
    ) -> Result<Arc<Canvas>> {
        let key = key.into();
        let cell = self
            .builds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        cell.get_or_try_init(|| {
            let _span = tracing::span!(tracing::Level::DEBUG, "build", %key).entered();
            build().map(|canvas| self.publish(canvas))
        })
        .cloned()
    }
}

impl Registry {
    /// Reserves a unique name derived from `requested`.
    ///
    /// Each candidate, suffix included, is shortened to `max_len` before it
    /// is checked against the registered names.
    fn claim(&mut self, requested: ArcStr, max_len: usize) -> ArcStr {
        let used = self.counters.entry(requested.clone()).or_insert(0);
        let mut candidate = if *used > 0 {
            arcstr::format!("{requested}${used}")
        } else {
            requested.clone()
        };
        *used += 1;
        let mut name = shorten_name(&candidate, max_len);
        // A literal `X$1` may have been published before the second `X`.
        while self.cells.contains_key(&name) {
            let used = self.counters.entry(requested.clone()).or_insert(0);
            candidate = arcstr::format!("{requested}${used}");
            *used += 1;
            name = shorten_name(&candidate, max_len);
        }
        if name != candidate {
            report_shortened(candidate, name.clone());
        }
        name
    }
}

/// Shortens names longer than `max_len` to a prefix plus a hash of the full name.
///
/// The result is exactly `max_len` characters: the first `max_len - 9`
/// characters, `_`, and 8 hex digits of a SHA-256 of the full name.
pub fn shorten_name(name: &str, max_len: usize) -> ArcStr {
    if name.chars().count() <= max_len {
        return name.into();
    }
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let prefix: String = name.chars().take(max_len.saturating_sub(9)).collect();
    arcstr::format!("{prefix}_{}", &digest[..8])
}

fn report_shortened(original: ArcStr, shortened: ArcStr) {
    let mut issues = IssueSet::new();
    issues.add(Issue::NameShortened {
        original,
        shortened,
    });
    issues.emit();
}
