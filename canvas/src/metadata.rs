//! Serializable canvas metadata.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::canvas::{Canvas, MetadataMap};
use crate::port::Port;

/// A snapshot of a canvas's metadata, suitable for YAML or JSON writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasMetadata {
    /// The canvas name.
    pub name: ArcStr,
    /// The originating generator, if recorded.
    pub function_name: Option<ArcStr>,
    /// The originating generator's module, if recorded.
    pub module: Option<ArcStr>,
    /// Construction parameters.
    pub settings: MetadataMap,
    /// Free-form metadata.
    pub info: MetadataMap,
    /// The canvas's own ports.
    pub ports: Vec<Port>,
    /// The metadata of the primary sub-canvas, if any.
    pub child: Option<Box<CanvasMetadata>>,
}

impl Canvas {
    /// Returns a serializable snapshot of this canvas's metadata.
    pub fn metadata(&self) -> CanvasMetadata {
        CanvasMetadata {
            name: self.name(),
            function_name: self.function_name().cloned(),
            module: self.module().cloned(),
            settings: self.settings().clone(),
            info: self.info().clone(),
            ports: self.ports().cloned().collect(),
            child: self.child().map(|child| Box::new(child.metadata())),
        }
    }
}
