//! Operations that derive new canvases, or fold references into geometry.

use std::collections::HashMap;
use std::sync::Arc;

use arcstr::ArcStr;
use geometry::prelude::*;

use super::Canvas;
use crate::error::Result;
use crate::layer::Layer;
use crate::reference::{Placement, Reference};

/// The info key listing the aliases of references baked into a canvas.
pub const FLATTENED_REFERENCES_KEY: &str = "flattened_references";

impl Canvas {
    /// Returns an unlocked copy with the same name.
    ///
    /// References are copied shallowly: they share their targets with the
    /// originals. Everything else is copied deeply.
    pub fn copy(&self) -> Canvas {
        self.copy_named(self.name())
    }

    /// Returns an unlocked copy under a new name.
    pub fn copy_named(&self, name: impl Into<ArcStr>) -> Canvas {
        let mut copy = Canvas::new(name);
        copy.function_name = self.function_name.clone();
        copy.module = self.module.clone();
        copy.polygons = self.polygons.clone();
        copy.labels = self.labels.clone();
        copy.ports = self.ports.clone();
        copy.references = self.references.clone();
        copy.aliases = self.aliases.clone();
        copy.settings = self.settings.clone();
        copy.info = self.info.clone();
        copy.child = self.child.clone();
        copy
    }

    /// Returns an unlocked copy with no references.
    ///
    /// Every nested polygon and label is placed directly in the copy at its
    /// fully composed transformation. Ports are kept as they are.
    pub fn flatten(&self) -> Canvas {
        let mut flat = self.copy();
        flat.references.clear();
        flat.aliases = Default::default();
        flat.polygons = self
            .get_polygons(None)
            .into_iter()
            .filter(|(_, polygons)| !polygons.is_empty())
            .collect();
        flat.labels = self.get_labels(None);
        flat
    }

    /// Replaces a reference with its fully flattened geometry.
    ///
    /// The alias is released and recorded under the
    /// [`FLATTENED_REFERENCES_KEY`] info entry.
    pub fn flatten_reference(&mut self, alias: &str) -> Result<()> {
        self.check_mutable("flatten a reference in")?;
        let reference = self.bake_reference(alias)?;
        let entry = self
            .info
            .entry(ArcStr::from(FLATTENED_REFERENCES_KEY))
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let serde_json::Value::Array(aliases) = entry {
            aliases.push(serde_json::Value::from(reference.alias().as_str()));
        }
        Ok(())
    }

    /// Folds a reference's geometry into this canvas and removes the reference.
    pub fn absorb(&mut self, alias: &str) -> Result<()> {
        self.check_mutable("absorb a reference into")?;
        self.bake_reference(alias)?;
        Ok(())
    }

    fn bake_reference(&mut self, alias: &str) -> Result<Reference> {
        let reference = self.remove_reference(alias)?;
        let polygons = reference.target().get_polygons(None);
        let labels = reference.target().get_labels(None);
        for cell in reference.cell_transformations() {
            for (layer, layer_polygons) in polygons.iter() {
                self.polygons
                    .entry(*layer)
                    .or_default()
                    .extend(layer_polygons.iter().cloned().map(|p| p.transform(cell)));
            }
            self.labels
                .extend(labels.iter().cloned().map(|l| l.transform(cell)));
        }
        self.polygons.retain(|_, polygons| !polygons.is_empty());
        tracing::debug!(canvas = %self.name(), alias, "baked reference into geometry");
        Ok(reference)
    }

    /// Records `child` as the primary sub-canvas and inherits any info keys
    /// this canvas does not define.
    pub fn copy_child_info(&mut self, child: &Arc<Canvas>) -> Result<()> {
        self.check_mutable("copy child info into")?;
        for (key, value) in child.info.iter() {
            if !self.info.contains_key(key) {
                self.info.insert(key.clone(), value.clone());
            }
        }
        self.child = Some(child.clone());
        Ok(())
    }

    /// Places `target`, re-exports its ports, and inherits its info.
    pub fn add_ref_container(
        &mut self,
        target: &Arc<Canvas>,
        placement: Placement,
    ) -> Result<&Reference> {
        let (alias, ports) = {
            let reference = self.add_ref(target, placement)?;
            (reference.alias().clone(), reference.ports())
        };
        self.add_ports(ports, "", "")?;
        self.copy_child_info(target)?;
        self.reference(&alias)
    }

    /// Returns a new canvas holding a rotated reference to this one.
    pub fn rotate(self: &Arc<Self>, angle: f64) -> Result<Canvas> {
        let mut rotated =
            Canvas::new(arcstr::format!("{}_rotate{}", self.name(), angle)).with_function_name("rotate");
        rotated.add_ref_container(self, Placement::default().rotated(angle))?;
        rotated.set_setting("angle", angle)?;
        Ok(rotated)
    }

    /// Returns a new canvas holding a reference to this one mirrored across the y-axis.
    pub fn mirror(self: &Arc<Self>) -> Result<Canvas> {
        let mut mirrored =
            Canvas::new(arcstr::format!("{}_mirror", self.name())).with_function_name("mirror");
        mirrored.add_ref_container(self, Placement::default().reflected().rotated(180.))?;
        Ok(mirrored)
    }

    /// Returns a flattened copy with layers renamed according to `map`.
    ///
    /// Ports and labels move with their layers; unmapped layers are kept.
    pub fn remap_layers(&self, map: &HashMap<Layer, Layer>) -> Canvas {
        let remap = |layer: Layer| map.get(&layer).copied().unwrap_or(layer);
        let mut remapped = self.flatten();
        let polygons = std::mem::take(&mut remapped.polygons);
        for (layer, polygons) in polygons {
            remapped
                .polygons
                .entry(remap(layer))
                .or_default()
                .extend(polygons);
        }
        for label in remapped.labels.iter_mut() {
            label.layer = remap(label.layer);
        }
        for port in remapped.ports.values_mut() {
            port.set_layer(remap(port.layer()));
        }
        remapped
    }

    /// Returns a flattened copy keeping only the polygons and labels on `layers`.
    pub fn extract(&self, layers: &[Layer]) -> Canvas {
        let mut extracted = self.flatten();
        extracted
            .polygons
            .retain(|layer, _| layers.contains(layer));
        extracted.labels.retain(|label| layers.contains(&label.layer));
        extracted
    }
}
