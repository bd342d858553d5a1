use std::path::Path;

use anyhow::{Context, Result};

pub(crate) fn parse_document(toml: &str, file: &Path) -> Result<toml::Table> {
    toml.parse()
        .map_err(anyhow::Error::from)
        .with_context(|| format!("could not parse `{}` as TOML", file.display()))
}

/// Merges `lower` into `upper`, keeping values already present in `upper`.
///
/// Nested tables are merged key by key.
pub(crate) fn merge_missing(upper: &mut toml::Table, lower: toml::Table) {
    for (key, value) in lower {
        match (upper.get_mut(&key), value) {
            (Some(toml::Value::Table(u)), toml::Value::Table(l)) => merge_missing(u, l),
            (Some(_), _) => {}
            (None, value) => {
                upper.insert(key, value);
            }
        }
    }
}
