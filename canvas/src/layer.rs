//! Layers and symbolic layer resolution.

use std::fmt::Display;

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A concrete `(layer, datatype)` pair.
#[derive(
    Debug, Default, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct Layer {
    /// The layer number.
    pub layer: i32,
    /// The datatype number.
    pub datatype: i32,
}

impl Layer {
    /// Creates a new layer.
    pub const fn new(layer: i32, datatype: i32) -> Self {
        Self { layer, datatype }
    }
}

impl From<(i32, i32)> for Layer {
    fn from((layer, datatype): (i32, i32)) -> Self {
        Self { layer, datatype }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.layer, self.datatype)
    }
}

/// A symbolic layer specification.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum LayerSpec {
    /// A layer name defined by a process.
    Name(ArcStr),
    /// A bare layer number with datatype 0.
    Index(i32),
    /// An explicit `(layer, datatype)` pair.
    Tuple(i32, i32),
}

impl Display for LayerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Index(layer) => write!(f, "{layer}"),
            Self::Tuple(layer, datatype) => write!(f, "({layer}, {datatype})"),
        }
    }
}

impl From<&str> for LayerSpec {
    fn from(value: &str) -> Self {
        Self::Name(value.into())
    }
}

impl From<i32> for LayerSpec {
    fn from(value: i32) -> Self {
        Self::Index(value)
    }
}

impl From<(i32, i32)> for LayerSpec {
    fn from((layer, datatype): (i32, i32)) -> Self {
        Self::Tuple(layer, datatype)
    }
}

impl From<Layer> for LayerSpec {
    fn from(value: Layer) -> Self {
        Self::Tuple(value.layer, value.datatype)
    }
}

/// Maps a symbolic layer specification to a concrete layer.
pub trait ResolveLayer {
    /// Resolves `spec`, failing with [`Error::LayerNotFound`] if it is unknown.
    fn resolve_layer(&self, spec: &LayerSpec) -> Result<Layer>;
}

/// A table of named layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerMap {
    layers: IndexMap<ArcStr, Layer>,
}

impl LayerMap {
    /// Creates an empty layer map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or redefines) a named layer.
    pub fn insert(&mut self, name: impl Into<ArcStr>, layer: impl Into<Layer>) -> &mut Self {
        self.layers.insert(name.into(), layer.into());
        self
    }

    /// Returns the layer with the given name.
    pub fn get(&self, name: &str) -> Option<Layer> {
        self.layers.get(name).copied()
    }

    /// Returns the name of the first definition of `layer`.
    pub fn name_of(&self, layer: Layer) -> Option<&ArcStr> {
        self.layers
            .iter()
            .find_map(|(name, l)| (*l == layer).then_some(name))
    }
}

impl ResolveLayer for LayerMap {
    fn resolve_layer(&self, spec: &LayerSpec) -> Result<Layer> {
        match spec {
            LayerSpec::Name(name) => self
                .get(name)
                .ok_or_else(|| Error::LayerNotFound(spec.clone())),
            LayerSpec::Index(layer) => Ok(Layer::new(*layer, 0)),
            LayerSpec::Tuple(layer, datatype) => Ok(Layer::new(*layer, *datatype)),
        }
    }
}

impl<K: Into<ArcStr>, L: Into<Layer>> FromIterator<(K, L)> for LayerMap {
    fn from_iter<T: IntoIterator<Item = (K, L)>>(iter: T) -> Self {
        Self {
            layers: iter
                .into_iter()
                .map(|(k, l)| (k.into(), l.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_map_resolves_every_spec_kind() {
        let map: LayerMap = [("WG", (1, 0)), ("M1", (41, 0))].into_iter().collect();
        assert_eq!(map.resolve_layer(&"WG".into()).unwrap(), Layer::new(1, 0));
        assert_eq!(map.resolve_layer(&7.into()).unwrap(), Layer::new(7, 0));
        assert_eq!(map.resolve_layer(&(3, 2).into()).unwrap(), Layer::new(3, 2));
        assert!(matches!(
            map.resolve_layer(&"SLAB".into()),
            Err(Error::LayerNotFound(LayerSpec::Name(name))) if name == "SLAB"
        ));
        assert_eq!(map.name_of(Layer::new(41, 0)).map(|n| n.as_str()), Some("M1"));
    }

    #[test]
    fn layers_sort_by_layer_then_datatype() {
        let mut layers = vec![Layer::new(2, 0), Layer::new(1, 5), Layer::new(1, 0)];
        layers.sort();
        assert_eq!(
            layers,
            vec![Layer::new(1, 0), Layer::new(1, 5), Layer::new(2, 0)]
        );
    }
}
