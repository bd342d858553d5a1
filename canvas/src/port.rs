//! Named, oriented connection anchors.

use std::sync::atomic::{AtomicU64, Ordering};

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layer::Layer;

static NEXT_PORT_UID: AtomicU64 = AtomicU64::new(0);

/// The kind of signal a port carries.
#[derive(Debug, Default, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// An optical waveguide port.
    #[default]
    Optical,
    /// An electrical port.
    Electrical,
    /// A placement-only anchor.
    Placement,
    /// A process-specific port type.
    Other(ArcStr),
}

/// A named connection anchor on a canvas.
///
/// Ports copied across a reference boundary keep their name and uid;
/// only their coordinates change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    name: ArcStr,
    uid: u64,
    center: Point,
    orientation: f64,
    width: f64,
    layer: Layer,
    port_type: PortType,
    cross_section: Option<ArcStr>,
    shear_angle: Option<f64>,
}

/// Field overrides applied when copying a [`Port`].
#[derive(Debug, Clone, Default)]
pub struct PortOverrides {
    /// A replacement name.
    pub name: Option<ArcStr>,
    /// A replacement center.
    pub center: Option<Point>,
    /// A replacement orientation, in degrees.
    pub orientation: Option<f64>,
    /// A replacement width.
    pub width: Option<f64>,
    /// A replacement layer.
    pub layer: Option<Layer>,
    /// A replacement port type.
    pub port_type: Option<PortType>,
}

impl Port {
    /// Creates a new port.
    ///
    /// The orientation is normalized to `[0, 360)`. Fails if the width is not
    /// positive or any coordinate is not finite.
    pub fn new(
        name: impl Into<ArcStr>,
        center: impl Into<Point>,
        orientation: f64,
        width: f64,
        layer: impl Into<Layer>,
    ) -> Result<Self> {
        let port = Self {
            name: name.into(),
            uid: NEXT_PORT_UID.fetch_add(1, Ordering::Relaxed),
            center: center.into(),
            orientation: geometry::wrap_angle(orientation),
            width,
            layer: layer.into(),
            port_type: PortType::default(),
            cross_section: None,
            shear_angle: None,
        };
        port.validate()?;
        Ok(port)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidPort("port names cannot be empty".into()));
        }
        if !(self.width.is_finite() && self.width > 0.) {
            return Err(Error::InvalidPort(arcstr::format!(
                "port `{}` has non-positive width {}",
                self.name,
                self.width
            )));
        }
        if !(self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.orientation.is_finite())
        {
            return Err(Error::InvalidPort(arcstr::format!(
                "port `{}` has a non-finite position or orientation",
                self.name
            )));
        }
        Ok(())
    }

    /// Sets the port type.
    pub fn with_port_type(mut self, port_type: PortType) -> Self {
        self.port_type = port_type;
        self
    }

    /// Sets the cross-section handle.
    pub fn with_cross_section(mut self, cross_section: impl Into<ArcStr>) -> Self {
        self.cross_section = Some(cross_section.into());
        self
    }

    /// Sets the shear angle, in degrees.
    pub fn with_shear_angle(mut self, shear_angle: f64) -> Self {
        self.shear_angle = Some(shear_angle);
        self
    }

    /// Returns a copy of this port with the given fields replaced.
    ///
    /// The copy keeps this port's uid.
    pub fn with_overrides(&self, overrides: PortOverrides) -> Result<Self> {
        let port = Self {
            name: overrides.name.unwrap_or_else(|| self.name.clone()),
            uid: self.uid,
            center: overrides.center.unwrap_or(self.center),
            orientation: geometry::wrap_angle(overrides.orientation.unwrap_or(self.orientation)),
            width: overrides.width.unwrap_or(self.width),
            layer: overrides.layer.unwrap_or(self.layer),
            port_type: overrides
                .port_type
                .unwrap_or_else(|| self.port_type.clone()),
            cross_section: self.cross_section.clone(),
            shear_angle: self.shear_angle,
        };
        port.validate()?;
        Ok(port)
    }

    /// Returns a copy of this port under a new name.
    pub fn renamed(&self, name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// The port name.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The logical identity shared by every projected copy of this port.
    #[inline]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// The port center.
    #[inline]
    pub fn center(&self) -> Point {
        self.center
    }

    /// The direction the port faces, in degrees within `[0, 360)`.
    #[inline]
    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    /// The port width.
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The port layer.
    #[inline]
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// The port type.
    #[inline]
    pub fn port_type(&self) -> &PortType {
        &self.port_type
    }

    /// The cross-section handle, if any.
    pub fn cross_section(&self) -> Option<&ArcStr> {
        self.cross_section.as_ref()
    }

    /// The shear angle, if any.
    pub fn shear_angle(&self) -> Option<f64> {
        self.shear_angle
    }

    pub(crate) fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }
}

impl TranslateMut for Port {
    fn translate_mut(&mut self, p: Point) {
        self.center.translate_mut(p);
    }
}

impl TransformMut for Port {
    fn transform_mut(&mut self, trans: Transformation) {
        self.center = trans.apply(self.center);
        self.orientation = trans.orientation().map_direction(self.orientation);
        self.width *= trans.magnification().abs();
    }
}
