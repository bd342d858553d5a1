//! Various utilities for working with files and paths.
//
// ## LICENSING
//
// Based on Cargo's utility functions with substantial modifications.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns an iterator that walks up the directory hierarchy towards the root.
///
/// Each item is a [`Path`]. It will start with the given path, finishing at
/// the root. If the `stop_root_at` parameter is given, it will stop at the
/// given path (which will be the last item).
pub(crate) fn ancestors<'a>(path: &'a Path, stop_root_at: Option<&Path>) -> PathAncestors<'a> {
    PathAncestors::new(path, stop_root_at)
}

/// An iterator over parent paths from the current directory to a certain stopping directory.
pub(crate) struct PathAncestors<'a> {
    current: Option<&'a Path>,
    stop_at: Option<PathBuf>,
}

impl<'a> PathAncestors<'a> {
    fn new(path: &'a Path, stop_root_at: Option<&Path>) -> PathAncestors<'a> {
        let stop_at = stop_root_at.map(|p| p.to_path_buf());
        PathAncestors {
            current: Some(path),
            stop_at,
        }
    }
}

impl<'a> Iterator for PathAncestors<'a> {
    type Item = &'a Path;

    fn next(&mut self) -> Option<&'a Path> {
        if let Some(path) = self.current {
            self.current = path.parent();

            if let Some(ref stop_at) = self.stop_at {
                if path == stop_at {
                    self.current = None;
                }
            }

            Some(path)
        } else {
            None
        }
    }
}

/// Returns every `file_name` found walking up from `start`, nearest first.
pub(crate) fn find_in_ancestors(
    start: &Path,
    stop_root_at: Option<&Path>,
    file_name: &str,
) -> Vec<PathBuf> {
    ancestors(start, stop_root_at)
        .map(|dir| dir.join(file_name))
        .filter(|candidate| candidate.is_file())
        .collect()
}

/// Equivalent to [`std::fs::read_to_string`] with better error messages.
pub(crate) fn read_to_string(p: impl AsRef<Path>) -> Result<String> {
    let p = p.as_ref();
    fs::read_to_string(p).with_context(|| format!("failed to read `{}`", p.display()))
}
