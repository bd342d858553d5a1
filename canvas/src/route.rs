//! The boundary with routing collaborators.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::error::Result;
use crate::reference::Reference;

/// The output of a router: placed straights, bends, and tapers.
#[derive(Debug, Clone)]
pub struct Route {
    /// The placed route segments.
    pub references: Vec<Reference>,
    /// The aggregate path length.
    pub length: f64,
}

/// Route metadata recorded on the receiving canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    /// The cross-section the route was drawn with.
    pub cross_section: ArcStr,
    /// The drawn length.
    pub length: f64,
    /// The effective length, if it differs from the drawn length.
    pub length_eff: Option<f64>,
    /// Whether the route includes tapers.
    pub taper: bool,
}

impl Canvas {
    /// Records route length information as `route_info_*` info entries.
    ///
    /// `route_info_length` and `route_info_weight` hold the effective length,
    /// which defaults to `length`.
    pub fn add_route_info(&mut self, route: &RouteInfo) -> Result<()> {
        let xs = &route.cross_section;
        let length_eff = route.length_eff.unwrap_or(route.length);
        if route.taper {
            self.set_info(arcstr::format!("route_info_{xs}_taper_length"), route.length)?;
        }
        self.set_info("route_info_type", xs.as_str())?;
        self.set_info("route_info_length", length_eff)?;
        self.set_info("route_info_weight", length_eff)?;
        self.set_info(arcstr::format!("route_info_{xs}_length"), length_eff)?;
        Ok(())
    }

    /// Inserts every reference of `route` and records its length.
    ///
    /// Returns the aliases assigned to the route's references.
    pub fn add_route(&mut self, route: Route, cross_section: impl Into<ArcStr>) -> Result<Vec<ArcStr>> {
        let mut aliases = Vec::with_capacity(route.references.len());
        for reference in route.references {
            aliases.push(self.add(reference)?.alias().clone());
        }
        self.add_route_info(&RouteInfo {
            cross_section: cross_section.into(),
            length: route.length,
            length_eff: None,
            taper: false,
        })?;
        Ok(aliases)
    }
}
