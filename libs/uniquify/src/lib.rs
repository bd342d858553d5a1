//! A library for assigning unique aliases.
//!
//! A [`Namespace`] hands out aliases of the form `{prefix}_{n}`, keeping one
//! counter per prefix. Aliases may also be claimed explicitly; automatically
//! generated aliases skip over anything already claimed.

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// A set of unique aliases with per-prefix counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Namespace {
    taken: HashSet<ArcStr>,
    counters: HashMap<ArcStr, usize>,
}

/// The error returned when claiming an alias that is already in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTaken(pub ArcStr);

impl std::fmt::Display for AliasTaken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "alias `{}` is already in use", self.0)
    }
}

impl std::error::Error for AliasTaken {}

impl Namespace {
    /// Creates a new, empty namespace.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns `true` if `alias` is currently in use.
    pub fn contains(&self, alias: &str) -> bool {
        self.taken.contains(alias)
    }

    /// The number of aliases currently in use.
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    /// Returns `true` if no aliases are in use.
    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }

    /// Allocates a new, unique alias based on `prefix`.
    ///
    /// The prefix counter is incremented before each candidate is formed,
    /// so the first alias for a prefix ends in `_1`. Counters never move
    /// backwards, even when aliases are released.
    ///
    /// # Examples
    ///
    /// ```
    /// # use uniquify::Namespace;
    /// let mut ns = Namespace::new();
    /// ns.claim("straight_2").unwrap();
    /// assert_eq!(ns.assign("straight"), "straight_1");
    /// assert_eq!(ns.assign("straight"), "straight_3");
    /// ```
    pub fn assign(&mut self, prefix: &str) -> ArcStr {
        let counter = self.counters.entry(ArcStr::from(prefix)).or_insert(0);
        let alias = loop {
            *counter += 1;
            let candidate = arcstr::format!("{}_{}", prefix, counter);
            if !self.taken.contains(&candidate) {
                break candidate;
            }
        };
        self.taken.insert(alias.clone());
        alias
    }

    /// Claims an explicit alias.
    ///
    /// Fails if the alias is already in use.
    pub fn claim(&mut self, alias: impl Into<ArcStr>) -> Result<ArcStr, AliasTaken> {
        let alias = alias.into();
        if !self.taken.insert(alias.clone()) {
            return Err(AliasTaken(alias));
        }
        Ok(alias)
    }

    /// Releases an alias so it may be claimed again.
    ///
    /// Returns `true` if the alias was in use.
    pub fn release(&mut self, alias: &str) -> bool {
        self.taken.remove(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_prefix() {
        let mut ns = Namespace::new();
        assert_eq!(ns.assign("bend"), "bend_1");
        assert_eq!(ns.assign("straight"), "straight_1");
        assert_eq!(ns.assign("bend"), "bend_2");
        assert_eq!(ns.len(), 3);
    }

    #[test]
    fn claim_rejects_duplicates() {
        let mut ns = Namespace::new();
        let auto = ns.assign("mmi");
        assert_eq!(ns.claim(auto.clone()), Err(AliasTaken(auto)));
        assert!(ns.claim("top").is_ok());
        assert!(ns.claim("top").is_err());
    }

    #[test]
    fn released_aliases_can_be_reclaimed_but_not_regenerated() {
        let mut ns = Namespace::new();
        let first = ns.assign("via");
        assert!(ns.release(&first));
        assert!(!ns.release(&first));
        assert_eq!(ns.assign("via"), "via_2");
        assert!(ns.claim(first).is_ok());
    }
}
