//! Utilities for loading and merging canvas engine configuration.
//!
//! Configuration is read from `canvas.toml` files found by walking up from a
//! starting directory. The nearest file takes precedence for every key it sets;
//! files further up fill in the rest. Environment variables prefixed with
//! `CANVAS_` override both.
#![warn(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub(crate) mod paths;
mod toml;


/// The name of configuration files discovered by [`Config::load`].
pub const CONFIG_FILE_NAME: &str = "canvas.toml";

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Manufacturing grid, in microns, that placed references must land on.
    pub grid_size: f64,
    /// Canvas names longer than this are shortened when published.
    pub max_name_length: usize,
    /// What happens when a locked canvas is modified.
    pub on_mutation: OnMutation,
    /// Settings used when exporting a canvas hierarchy.
    pub write: WriteConfig,
}

/// Settings used when exporting a canvas hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteConfig {
    /// The library name handed to the layout writer.
    pub lib_name: String,
    /// The database user unit, in meters.
    pub unit: Decimal,
    /// The database precision, in meters.
    pub precision: Decimal,
    /// Maximum number of points per exported polygon.
    pub max_points: usize,
    /// How distinct cells sharing a name are resolved.
    pub on_duplicate_cell: DuplicateCellPolicy,
    /// How cells that were never published are reported.
    pub on_uncached_component: UncachedPolicy,
    /// Whether off-grid or non-Manhattan references are flattened before export.
    pub flatten_offgrid_references: bool,
}

/// Behavior when a locked canvas is modified.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnMutation {
    /// Reject the modification.
    #[default]
    Error,
    /// Log a warning and apply the modification.
    Warn,
}

/// Resolution of distinct cells that share a name in one export.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateCellPolicy {
    /// Keep one representative and report the collision.
    #[default]
    Warn,
    /// Fail the export.
    Error,
    /// Keep one representative silently.
    Overwrite,
    /// Do not check for duplicates.
    Ignore,
}

/// Reporting of cells reachable from an export root that were never published.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncachedPolicy {
    /// Report each uncached cell as a warning.
    #[default]
    Warn,
    /// Fail the export.
    Error,
    /// Do not check.
    Ignore,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_size: 0.001,
            max_name_length: 99,
            on_mutation: OnMutation::default(),
            write: WriteConfig::default(),
        }
    }
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            lib_name: "library".to_string(),
            unit: dec!(0.000001),
            precision: dec!(0.000000001),
            max_points: 4000,
            on_duplicate_cell: DuplicateCellPolicy::default(),
            on_uncached_component: UncachedPolicy::default(),
            flatten_offgrid_references: true,
        }
    }
}

/// Environment variables and the configuration keys they override.
const ENV_KEYS: &[(&str, &[&str], EnvKind)] = &[
    ("CANVAS_GRID_SIZE", &["grid_size"], EnvKind::Float),
    ("CANVAS_MAX_NAME_LENGTH", &["max_name_length"], EnvKind::Integer),
    ("CANVAS_ON_MUTATION", &["on_mutation"], EnvKind::String),
    (
        "CANVAS_ON_DUPLICATE_CELL",
        &["write", "on_duplicate_cell"],
        EnvKind::String,
    ),
    (
        "CANVAS_ON_UNCACHED_COMPONENT",
        &["write", "on_uncached_component"],
        EnvKind::String,
    ),
];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Float,
    Integer,
    String,
}

impl Config {
    /// Loads configuration visible from `cwd`, applying process environment overrides.
    pub fn load(cwd: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_env(cwd, None, std::env::vars().collect())
    }

    /// Loads configuration visible from `cwd` with an explicit environment.
    ///
    /// The directory walk stops after `stop_root_at`, if given.
    pub fn load_with_env(
        cwd: impl AsRef<Path>,
        stop_root_at: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        let mut table = ::toml::Table::new();
        for file in Self::discover(cwd.as_ref(), stop_root_at) {
            let contents = paths::read_to_string(&file)?;
            let doc = toml::parse_document(&contents, &file)?;
            toml::merge_missing(&mut table, doc);
        }
        apply_env(&mut table, &env)?;
        Self::from_table(table)
    }

    /// Parses configuration from a TOML string.
    ///
    /// Keys that are not present take their default values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let table = toml::parse_document(s, Path::new("<string>"))?;
        Self::from_table(table)
    }

    /// Returns the configuration files visible from `cwd`, nearest first.
    pub fn discover(cwd: &Path, stop_root_at: Option<&Path>) -> Vec<PathBuf> {
        paths::find_in_ancestors(cwd, stop_root_at, CONFIG_FILE_NAME)
    }

    fn from_table(table: ::toml::Table) -> Result<Self> {
        let config: Self = ::toml::Value::Table(table)
            .try_into()
            .context("invalid canvas configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.grid_size.is_nan() || self.grid_size <= 0. {
            return Err(anyhow!(
                "grid_size must be positive, got {}",
                self.grid_size
            ));
        }
        if self.max_name_length < 9 {
            return Err(anyhow!(
                "max_name_length must leave room for a hash suffix, got {}",
                self.max_name_length
            ));
        }
        if self.write.precision <= Decimal::ZERO || self.write.unit <= Decimal::ZERO {
            return Err(anyhow!("write.unit and write.precision must be positive"));
        }
        Ok(())
    }
}

fn apply_env(table: &mut ::toml::Table, env: &HashMap<String, String>) -> Result<()> {
    for (var, key, kind) in ENV_KEYS {
        let Some(raw) = env.get(*var) else {
            continue;
        };
        let value = match kind {
            EnvKind::Float => ::toml::Value::Float(
                raw.trim()
                    .parse()
                    .with_context(|| format!("`{var}` is not a number: `{raw}`"))?,
            ),
            EnvKind::Integer => ::toml::Value::Integer(
                raw.trim()
                    .parse()
                    .with_context(|| format!("`{var}` is not an integer: `{raw}`"))?,
            ),
            EnvKind::String => ::toml::Value::String(raw.trim().to_lowercase()),
        };
        let (last, parents) = key
            .split_last()
            .ok_or_else(|| anyhow!("empty key for `{var}`"))?;
        let mut current = &mut *table;
        for parent in parents {
            let entry = current
                .entry(parent.to_string())
                .or_insert_with(|| ::toml::Value::Table(::toml::Table::new()));
            current = match entry {
                ::toml::Value::Table(t) => t,
                _ => return Err(anyhow!("`{parent}` must be a table")),
            };
        }
        current.insert(last.to_string(), value);
    }
    Ok(())
}

impl fmt::Display for OnMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warn => "warn",
        })
    }
}

impl fmt::Display for DuplicateCellPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Overwrite => "overwrite",
            Self::Ignore => "ignore",
        })
    }
}

impl fmt::Display for UncachedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Ignore => "ignore",
        })
    }
}
