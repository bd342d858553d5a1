//! Dependency closures and duplicate-name resolution.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arcstr::ArcStr;
use config::{DuplicateCellPolicy, UncachedPolicy};
use indexmap::IndexMap;

use crate::canvas::{Canvas, Uid};
use crate::diagnostics::{Issue, IssueSet, Severity};
use crate::error::{Error, Result};

/// Returns `top` and every canvas reachable from it, each exactly once.
///
/// Canvases are listed in post-order: every canvas appears after all of its
/// dependencies, and `top` is last.
pub fn collect_closure(top: &Arc<Canvas>) -> Vec<Arc<Canvas>> {
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    visit(top, &mut visited, &mut out);
    out
}

/// The strict dependencies of `canvas`, in post-order.
pub(crate) fn dependencies(canvas: &Canvas) -> Vec<Arc<Canvas>> {
    let mut visited = HashSet::from([canvas.uid()]);
    let mut out = Vec::new();
    for reference in canvas.references() {
        visit(reference.target(), &mut visited, &mut out);
    }
    out
}

fn visit(canvas: &Arc<Canvas>, visited: &mut HashSet<Uid>, out: &mut Vec<Arc<Canvas>>) {
    if !visited.insert(canvas.uid()) {
        return;
    }
    for reference in canvas.references() {
        visit(reference.target(), visited, out);
    }
    out.push(canvas.clone());
}

/// Reports canvases reachable from `top` that were never published.
///
/// Under [`UncachedPolicy::Error`] the returned set contains error-level issues;
/// see [`IssueSet::check`].
pub fn check_uncached(top: &Arc<Canvas>, policy: UncachedPolicy) -> IssueSet<Issue> {
    let mut issues = IssueSet::new();
    let severity = match policy {
        UncachedPolicy::Ignore => return issues,
        UncachedPolicy::Warn => Severity::Warning,
        UncachedPolicy::Error => Severity::Error,
    };
    for canvas in collect_closure(top) {
        if !canvas.is_locked() {
            issues.add(Issue::UncachedComponent {
                canvas: canvas.name(),
                severity,
            });
        }
    }
    issues
}

/// The result of resolving duplicate names.
#[derive(Debug)]
pub struct Deduplicated {
    /// The (possibly rewritten) top canvas.
    pub top: Arc<Canvas>,
    /// Collisions found along the way.
    pub issues: IssueSet<Issue>,
}

/// Collapses distinct canvases that share a name in the closure of `top`.
///
/// The first canvas of each name in post-order is kept; references to the
/// others are repointed to it, and every canvas above a repointed reference is
/// copied. Canvases with nothing to repoint beneath them are shared as is.
///
/// Fails with [`Error::NameCollision`] under [`DuplicateCellPolicy::Error`], or
/// when a dependency shares the top canvas's name, which no policy can repair.
pub fn resolve_duplicates(top: &Arc<Canvas>, policy: DuplicateCellPolicy) -> Result<Deduplicated> {
    let mut issues = IssueSet::new();
    if policy == DuplicateCellPolicy::Ignore {
        return Ok(Deduplicated {
            top: top.clone(),
            issues,
        });
    }

    let closure = collect_closure(top);
    let mut groups: IndexMap<ArcStr, Vec<Arc<Canvas>>> = IndexMap::new();
    for canvas in closure.iter() {
        groups.entry(canvas.name()).or_default().push(canvas.clone());
    }
    let duplicated: Vec<(&ArcStr, &Vec<Arc<Canvas>>)> =
        groups.iter().filter(|(_, group)| group.len() > 1).collect();
    if duplicated.is_empty() {
        return Ok(Deduplicated {
            top: top.clone(),
            issues,
        });
    }

    let mut names: Vec<ArcStr> = duplicated.iter().map(|(name, _)| (*name).clone()).collect();
    names.sort();
    if policy == DuplicateCellPolicy::Error {
        return Err(Error::NameCollision(names));
    }
    let top_name = top.name();
    if names.contains(&top_name) {
        return Err(Error::NameCollision(vec![top_name]));
    }

    let mut representative: HashMap<Uid, Arc<Canvas>> = HashMap::new();
    for (name, group) in duplicated.iter() {
        if policy == DuplicateCellPolicy::Warn {
            issues.add(Issue::DuplicateCell {
                name: (*name).clone(),
                count: group.len(),
                severity: Severity::Warning,
            });
        }
        for canvas in group.iter().skip(1) {
            representative.insert(canvas.uid(), group[0].clone());
        }
    }

    let mut rewritten = HashMap::new();
    let top = rewrite(top, &representative, &mut rewritten);
    Ok(Deduplicated { top, issues })
}

/// Repoints references to discarded duplicates, copying ancestors of any change.
fn rewrite(
    canvas: &Arc<Canvas>,
    representative: &HashMap<Uid, Arc<Canvas>>,
    rewritten: &mut HashMap<Uid, Arc<Canvas>>,
) -> Arc<Canvas> {
    if let Some(done) = rewritten.get(&canvas.uid()) {
        return done.clone();
    }
    let mut targets = HashMap::new();
    for reference in canvas.references() {
        let target = reference.target();
        let kept = representative.get(&target.uid()).unwrap_or(target);
        let resolved = rewrite(kept, representative, rewritten);
        if !Arc::ptr_eq(&resolved, target) {
            targets.insert(target.uid(), resolved);
        }
    }
    let result = if targets.is_empty() {
        canvas.clone()
    } else {
        let mut copy = canvas.copy();
        copy.repoint_references(|target| targets.get(&target.uid()).cloned());
        copy.lock();
        Arc::new(copy)
    };
    rewritten.insert(canvas.uid(), result.clone());
    result
}
