//! Utilities for collecting diagnostics.

use std::fmt::{Debug, Display};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A diagnostic issue that should be reported to users.
pub trait Diagnostic: Debug + Display {
    /// Returns an optional help message that should indicate
    /// what users need to do to resolve an issue.
    fn help(&self) -> Option<Box<dyn Display>> {
        None
    }

    /// Returns the severity of this issue.
    ///
    /// The default implementation returns [`Severity::default`].
    fn severity(&self) -> Severity {
        Default::default()
    }
}

/// An enumeration of possible severity levels.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// An error. Often, but not always, fatal.
    Error,
}

impl Severity {
    /// Returns log level corresponding to this severity.
    #[inline]
    pub const fn as_tracing_level(&self) -> tracing::Level {
        match *self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Returns `true` if the severity is [`Severity::Error`].
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(*self, Self::Error)
    }
}

impl From<config::OnMutation> for Severity {
    fn from(value: config::OnMutation) -> Self {
        match value {
            config::OnMutation::Error => Self::Error,
            config::OnMutation::Warn => Self::Warning,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An issue found while building, normalizing, or exporting canvases.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// A reference is off-grid or not at a right angle.
    InvalidTransform {
        /// The canvas owning the reference.
        canvas: ArcStr,
        /// The reference alias.
        alias: ArcStr,
        /// Whether the reference was flattened in response.
        flattened: bool,
    },
    /// A canvas reachable from an export root was never published.
    UncachedComponent {
        /// The canvas name.
        canvas: ArcStr,
        /// The configured severity.
        severity: Severity,
    },
    /// Distinct canvases share a name and were merged.
    DuplicateCell {
        /// The shared name.
        name: ArcStr,
        /// The number of distinct canvases found.
        count: usize,
        /// The configured severity.
        severity: Severity,
    },
    /// A canvas still carries a placeholder name.
    UnnamedCell {
        /// The placeholder name.
        name: ArcStr,
    },
    /// A name exceeded the maximum length and was shortened.
    NameShortened {
        /// The requested name.
        original: ArcStr,
        /// The name actually used.
        shortened: ArcStr,
    },
    /// A polygon has more points than the writer accepts.
    TooManyPoints {
        /// The canvas owning the polygon.
        canvas: ArcStr,
        /// The number of points in the polygon.
        points: usize,
        /// The configured limit.
        max_points: usize,
    },
}

impl Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransform {
                canvas,
                alias,
                flattened,
            } => {
                write!(
                    f,
                    "reference `{alias}` in `{canvas}` is off-grid or not at a right angle"
                )?;
                if *flattened {
                    write!(f, "; flattened")?;
                }
                Ok(())
            }
            Self::UncachedComponent { canvas, .. } => {
                write!(f, "canvas `{canvas}` was never published through the build cache")
            }
            Self::DuplicateCell { name, count, .. } => {
                write!(f, "{count} distinct canvases are named `{name}`; keeping one")
            }
            Self::UnnamedCell { name } => write!(f, "canvas `{name}` was never given a name"),
            Self::NameShortened {
                original,
                shortened,
            } => write!(f, "name `{original}` is too long; using `{shortened}`"),
            Self::TooManyPoints {
                canvas,
                points,
                max_points,
            } => write!(
                f,
                "polygon in `{canvas}` has {points} points (limit {max_points})"
            ),
        }
    }
}

impl Diagnostic for Issue {
    fn help(&self) -> Option<Box<dyn Display>> {
        match self {
            Self::UncachedComponent { .. } => Some(Box::new(
                "publish generated canvases with `BuildCache::publish` or `get_or_build`",
            )),
            Self::DuplicateCell { .. } => Some(Box::new(
                "give distinct canvases distinct names or publish them through one build cache",
            )),
            Self::InvalidTransform {
                flattened: false, ..
            } => Some(Box::new("enable `write.flatten_offgrid_references`")),
            _ => None,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::InvalidTransform { flattened, .. } => {
                if *flattened {
                    Severity::Info
                } else {
                    Severity::Warning
                }
            }
            Self::UncachedComponent { severity, .. } | Self::DuplicateCell { severity, .. } => {
                *severity
            }
            Self::UnnamedCell { .. } | Self::NameShortened { .. } | Self::TooManyPoints { .. } => {
                Severity::Warning
            }
        }
    }
}

/// A collection of issues.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    num_errors: usize,
    num_warnings: usize,
}

impl<T> IssueSet<T> {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            num_errors: 0,
            num_warnings: 0,
        }
    }

    /// Returns an iterator over all issues in the set.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    /// The number of issues in this issue set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if this issue set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Adds the given issue to the issue set.
    #[inline]
    pub fn add(&mut self, issue: T) {
        match issue.severity() {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        };
        self.issues.push(issue);
    }

    /// Moves every issue in `other` into this set.
    pub fn merge(&mut self, other: IssueSet<T>) {
        for issue in other {
            self.add(issue);
        }
    }

    /// Returns `true` if this issue set contains an error.
    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }

    /// The number of errors in this issue set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    /// Returns `true` if this issue set contains a warning.
    pub fn has_warning(&self) -> bool {
        self.num_warnings > 0
    }

    /// The number of warnings in this issue set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// Logs every issue at the level matching its severity.
    pub fn emit(&self) {
        for issue in self.issues.iter() {
            let help = issue.help().map(|h| h.to_string());
            match issue.severity() {
                Severity::Info => tracing::info!(help = help.as_deref(), "{issue}"),
                Severity::Warning => tracing::warn!(help = help.as_deref(), "{issue}"),
                Severity::Error => tracing::error!(help = help.as_deref(), "{issue}"),
            }
        }
    }
}

impl IssueSet<Issue> {
    /// Fails with the first error-level issue, if any.
    ///
    /// Uncached components are reported together; every other error-level
    /// issue becomes the corresponding [`Error`] variant.
    pub fn check(&self) -> Result<()> {
        if !self.has_error() {
            return Ok(());
        }
        let uncached: Vec<ArcStr> = self
            .iter()
            .filter(|issue| issue.severity().is_error())
            .filter_map(|issue| match issue {
                Issue::UncachedComponent { canvas, .. } => Some(canvas.clone()),
                _ => None,
            })
            .collect();
        if !uncached.is_empty() {
            return Err(Error::UncachedComponent(uncached));
        }
        let names = self
            .iter()
            .filter(|issue| issue.severity().is_error())
            .filter_map(|issue| match issue {
                Issue::DuplicateCell { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        Err(Error::NameCollision(names))
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = <std::vec::Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Display> Display for IssueSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uncached(name: &str, severity: Severity) -> Issue {
        Issue::UncachedComponent {
            canvas: name.into(),
            severity,
        }
    }

    #[test]
    fn issue_set_counters() {
        let mut issues: IssueSet<Issue> = IssueSet::new();
        issues.add(Issue::InvalidTransform {
            canvas: "top".into(),
            alias: "bend_1".into(),
            flattened: true,
        });
        assert_eq!(issues.num_errors(), 0);
        assert_eq!(issues.num_warnings(), 0);
        issues.add(uncached("a", Severity::Warning));
        assert_eq!(issues.num_warnings(), 1);
        assert!(!issues.has_error());
        issues.add(uncached("b", Severity::Error));
        assert_eq!(issues.num_errors(), 1);
        assert!(issues.has_error());
        assert!(issues.has_warning());
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn check_reports_only_error_level_names() {
        let mut issues = IssueSet::new();
        issues.add(uncached("warned", Severity::Warning));
        assert!(issues.check().is_ok());
        issues.add(uncached("b", Severity::Error));
        issues.add(uncached("c", Severity::Error));
        match issues.check() {
            Err(Error::UncachedComponent(names)) => assert_eq!(names, vec!["b", "c"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn severity_follows_mutation_policy() {
        assert_eq!(Severity::from(config::OnMutation::Error), Severity::Error);
        assert_eq!(Severity::from(config::OnMutation::Warn), Severity::Warning);
        assert_eq!(Severity::default(), Severity::Warning);
        assert_eq!(Severity::Warning.as_tracing_level(), tracing::Level::WARN);
    }
}
