//! A hierarchical layout-composition engine.
//!
//! Layouts are built from [`Canvas`]es holding polygons, labels, ports, and
//! [`Reference`]s to other canvases. Canvases are published through a
//! [`BuildCache`], which gives each a unique name and locks it, and are
//! prepared for serialization by an [`Exporter`].
#![warn(missing_docs)]

pub mod cache;
pub mod canvas;
pub mod collect;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod hash;
pub mod input;
pub mod layer;
pub mod metadata;
pub mod normalize;
pub mod port;
pub mod reference;
pub mod route;

#[cfg(test)]
mod tests;

pub use cache::BuildCache;
pub use canvas::{Canvas, Item, Label, MetadataMap, Uid};
pub use error::{Error, Result};
pub use export::{Export, ExportLibrary, Exporter, LayoutWriter};
pub use layer::{Layer, LayerMap, LayerSpec, ResolveLayer};
pub use normalize::Normalizer;
pub use port::{Port, PortOverrides, PortType};
pub use reference::{ArrayParams, Placement, Reference};

#[doc(inline)]
pub use config;
#[doc(inline)]
pub use geometry;
