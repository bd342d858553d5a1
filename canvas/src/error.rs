//! Canvas result and error types.

use arcstr::ArcStr;

use crate::layer::LayerSpec;

/// The [`Error`] result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A canvas error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A locked canvas was modified while modifications were configured as errors.
    #[error("cannot {action} canvas `{canvas}`: it is locked (copy it to get a mutable canvas)")]
    Mutability {
        /// The name of the locked canvas.
        canvas: ArcStr,
        /// The attempted modification.
        action: &'static str,
    },
    /// Distinct canvases sharing a name were found in one export.
    #[error("distinct canvases share names: {}", .0.join(", "))]
    NameCollision(Vec<ArcStr>),
    /// No port exists with the given name.
    #[error("port `{port}` not found in `{canvas}`")]
    PortNotFound {
        /// The canvas that was searched.
        canvas: ArcStr,
        /// The requested port name.
        port: ArcStr,
    },
    /// A port with the given name already exists.
    #[error("port `{port}` already exists in `{canvas}`")]
    PortExists {
        /// The canvas that owns the existing port.
        canvas: ArcStr,
        /// The duplicated port name.
        port: ArcStr,
    },
    /// No reference exists with the given alias.
    #[error("reference `{alias}` not found in `{canvas}`")]
    ReferenceNotFound {
        /// The canvas that was searched.
        canvas: ArcStr,
        /// The requested alias.
        alias: ArcStr,
    },
    /// A reference with the given alias already exists.
    #[error("alias `{alias}` is already used in `{canvas}`")]
    AliasExists {
        /// The canvas whose namespace holds the alias.
        canvas: ArcStr,
        /// The duplicated alias.
        alias: ArcStr,
    },
    /// Canvases reachable from an export root were never published.
    #[error("canvases were never published through the build cache: {}", .0.join(", "))]
    UncachedComponent(Vec<ArcStr>),
    /// A symbolic layer could not be resolved.
    #[error("layer not found: {0}")]
    LayerNotFound(LayerSpec),
    /// A port was constructed with invalid parameters.
    #[error("invalid port: {0}")]
    InvalidPort(ArcStr),
    /// Geometry input could not be interpreted.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(ArcStr),
    /// Configuration could not be loaded.
    #[error("configuration error: {0:#}")]
    Config(#[from] anyhow::Error),
    /// A layout writer failed.
    #[error("error writing layout: {0}")]
    Write(#[source] Box<dyn std::error::Error + Send + Sync>),
}
