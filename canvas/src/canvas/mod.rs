//! The composite layout entity.
//!
//! A [`Canvas`] owns polygons, labels, ports, and [`Reference`]s to other
//! canvases. It is freely mutable until it is locked, which normally happens
//! when it is published through a [`BuildCache`](crate::cache::BuildCache).
//! After that, every "modification" produces a new canvas.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uniquify::Namespace;

use crate::diagnostics::Severity;
use crate::error::{Error, Result};
use crate::input::GeometryInput;
use crate::layer::Layer;
use crate::port::{Port, PortOverrides};
use crate::reference::{ArrayParams, Placement, Reference};

mod derive;
mod query;

pub use derive::FLATTENED_REFERENCES_KEY;

/// A free-form metadata map.
pub type MetadataMap = IndexMap<ArcStr, serde_json::Value>;

/// The prefix of placeholder canvas names.
pub const UNNAMED_PREFIX: &str = "Unnamed";

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

/// A process-unique canvas identifier.
#[derive(
    Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct Uid(u64);

impl Uid {
    fn next() -> Self {
        Self(NEXT_UID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// The label text.
    pub text: ArcStr,
    /// The anchor position.
    pub position: Point,
    /// The label layer.
    pub layer: Layer,
}

impl TransformMut for Label {
    fn transform_mut(&mut self, trans: Transformation) {
        self.position = trans.apply(self.position);
    }
}

impl TranslateMut for Label {
    fn translate_mut(&mut self, p: Point) {
        self.position.translate_mut(p);
    }
}

/// An item that can be removed from a canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A port, by name.
    Port(ArcStr),
    /// A reference, by alias.
    Reference(ArcStr),
    /// Every polygon and label on a layer.
    Layer(Layer),
}

/// A composite layout cell.
#[derive(Debug)]
pub struct Canvas {
    uid: Uid,
    /// Guarded so the build cache can rename a published canvas.
    name: RwLock<ArcStr>,
    /// The severity of mutations, once locked.
    locked: Option<Severity>,
    function_name: Option<ArcStr>,
    module: Option<ArcStr>,
    polygons: IndexMap<Layer, Vec<Polygon>>,
    labels: Vec<Label>,
    ports: IndexMap<ArcStr, Port>,
    references: Vec<Reference>,
    aliases: Namespace,
    settings: MetadataMap,
    info: MetadataMap,
    child: Option<Arc<Canvas>>,
}

impl Canvas {
    /// Creates an empty, unlocked canvas.
    ///
    /// An empty name is replaced with a placeholder derived from the uid.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        let uid = Uid::next();
        let mut name = name.into();
        if name.is_empty() {
            name = arcstr::format!("{UNNAMED_PREFIX}_{uid}");
        }
        Self {
            uid,
            name: RwLock::new(name),
            locked: None,
            function_name: None,
            module: None,
            polygons: IndexMap::new(),
            labels: Vec::new(),
            ports: IndexMap::new(),
            references: Vec::new(),
            aliases: Namespace::new(),
            settings: MetadataMap::new(),
            info: MetadataMap::new(),
            child: None,
        }
    }

    /// Creates an empty canvas with a placeholder name.
    pub fn unnamed() -> Self {
        Self::new("")
    }

    /// Sets the originating generator name.
    pub fn with_function_name(mut self, function_name: impl Into<ArcStr>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }

    /// The process-unique identifier of this canvas.
    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// The canvas name.
    pub fn name(&self) -> ArcStr {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The name of the generator that built this canvas, if recorded.
    pub fn function_name(&self) -> Option<&ArcStr> {
        self.function_name.as_ref()
    }

    /// The module of the generator that built this canvas, if recorded.
    pub fn module(&self) -> Option<&ArcStr> {
        self.module.as_ref()
    }

    /// The prefix used when auto-naming references to this canvas.
    pub fn alias_prefix(&self) -> ArcStr {
        self.function_name.clone().unwrap_or_else(|| self.name())
    }

    /// Returns `true` if the canvas has been locked.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    /// Returns `true` if the canvas still carries a placeholder name.
    ///
    /// Placeholders have the form `Unnamed_{uid}`.
    pub fn is_unnamed(&self) -> bool {
        self.name()
            .strip_prefix(UNNAMED_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|uid| !uid.is_empty() && uid.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }

    /// Locks the canvas. Later modifications fail.
    ///
    /// Locking is irreversible; derive a mutable canvas with [`Canvas::copy`].
    pub fn lock(&mut self) {
        self.lock_with(Severity::Error);
    }

    /// Locks the canvas, recording how later modifications are reported.
    ///
    /// Has no effect on a canvas that is already locked.
    pub fn lock_with(&mut self, severity: Severity) {
        if self.locked.is_none() {
            self.locked = Some(severity);
        }
    }

    /// Checks that `action` may modify this canvas.
    fn check_mutable(&self, action: &'static str) -> Result<()> {
        match self.locked {
            None => Ok(()),
            Some(Severity::Error) => Err(Error::Mutability {
                canvas: self.name(),
                action,
            }),
            Some(Severity::Warning) => {
                tracing::warn!(
                    canvas = %self.name(),
                    action,
                    "modifying a locked canvas; every reference to it will change"
                );
                Ok(())
            }
            Some(Severity::Info) => {
                tracing::debug!(canvas = %self.name(), action, "modifying a locked canvas");
                Ok(())
            }
        }
    }

    /// Renames this canvas.
    ///
    /// Published canvases are renamed through
    /// [`BuildCache::rename`](crate::cache::BuildCache::rename).
    pub fn rename(&mut self, name: impl Into<ArcStr>) -> Result<()> {
        self.check_mutable("rename")?;
        self.set_name_unchecked(name.into());
        Ok(())
    }

    pub(crate) fn set_name_unchecked(&self, name: ArcStr) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
    }

    /// Records the module of the originating generator.
    pub fn set_module(&mut self, module: impl Into<ArcStr>) -> Result<()> {
        self.check_mutable("set the module of")?;
        self.module = Some(module.into());
        Ok(())
    }

    /// Records the originating generator name.
    pub fn set_function_name(&mut self, function_name: impl Into<ArcStr>) -> Result<()> {
        self.check_mutable("set the function name of")?;
        self.function_name = Some(function_name.into());
        Ok(())
    }

    /// Adds polygons on `layer`, returning how many were kept.
    ///
    /// Zero-area polygons are dropped. Holes are subtracted from their outline.
    pub fn add_polygon(
        &mut self,
        input: impl Into<GeometryInput>,
        layer: impl Into<Layer>,
    ) -> Result<usize> {
        self.check_mutable("add a polygon to")?;
        let polygons = input.into().into_polygons()?;
        let n = polygons.len();
        if n > 0 {
            self.polygons
                .entry(layer.into())
                .or_default()
                .extend(polygons);
        }
        Ok(n)
    }

    /// Adds a text label.
    pub fn add_label(
        &mut self,
        text: impl Into<ArcStr>,
        position: impl Into<Point>,
        layer: impl Into<Layer>,
    ) -> Result<()> {
        self.check_mutable("add a label to")?;
        self.labels.push(Label {
            text: text.into(),
            position: position.into(),
            layer: layer.into(),
        });
        Ok(())
    }

    /// Adds a port. Fails if a port with the same name exists.
    pub fn add_port(&mut self, port: Port) -> Result<&Port> {
        self.check_mutable("add a port to")?;
        if self.ports.contains_key(port.name()) {
            return Err(Error::PortExists {
                canvas: self.name(),
                port: port.name().clone(),
            });
        }
        let name = port.name().clone();
        let (index, _) = self.ports.insert_full(name, port);
        Ok(&self.ports[index])
    }

    /// Adds a copy of `port` with some fields replaced.
    pub fn add_port_copy(&mut self, port: &Port, overrides: PortOverrides) -> Result<&Port> {
        let port = port.with_overrides(overrides)?;
        self.add_port(port)
    }

    /// Adds copies of `ports`, renamed to `{prefix}{name}{suffix}`.
    ///
    /// Fails without adding anything if any resulting name is taken.
    pub fn add_ports(
        &mut self,
        ports: impl IntoIterator<Item = Port>,
        prefix: &str,
        suffix: &str,
    ) -> Result<()> {
        self.check_mutable("add ports to")?;
        let renamed: Vec<Port> = ports
            .into_iter()
            .map(|p| p.renamed(arcstr::format!("{prefix}{}{suffix}", p.name())))
            .collect();
        for (i, port) in renamed.iter().enumerate() {
            if self.ports.contains_key(port.name())
                || renamed[..i].iter().any(|p| p.name() == port.name())
            {
                return Err(Error::PortExists {
                    canvas: self.name(),
                    port: port.name().clone(),
                });
            }
        }
        for port in renamed {
            self.ports.insert(port.name().clone(), port);
        }
        Ok(())
    }

    /// Places `target` and returns the new reference.
    ///
    /// The alias is `{prefix}_{n}`, where the prefix is the target's
    /// generator name (or its name) and `n` a per-prefix counter.
    pub fn add_ref(&mut self, target: &Arc<Canvas>, placement: Placement) -> Result<&Reference> {
        self.add(Reference::new(target.clone()).with_placement(placement))
    }

    /// Places `target` under an explicit alias.
    pub fn add_ref_with_alias(
        &mut self,
        target: &Arc<Canvas>,
        placement: Placement,
        alias: impl Into<ArcStr>,
    ) -> Result<&Reference> {
        self.add(
            Reference::new(target.clone())
                .with_placement(placement)
                .with_alias(alias),
        )
    }

    /// Places a `rows` by `columns` grid of `target` at the origin.
    pub fn add_array(
        &mut self,
        target: &Arc<Canvas>,
        rows: u32,
        columns: u32,
        spacing: impl Into<Point>,
    ) -> Result<&Reference> {
        self.add(Reference::new(target.clone()).with_array(ArrayParams {
            rows,
            columns,
            spacing: spacing.into(),
        }))
    }

    /// Adds a prepared reference, assigning an alias if it has none.
    pub fn add(&mut self, mut reference: Reference) -> Result<&Reference> {
        self.check_mutable("add a reference to")?;
        let alias = if reference.alias().is_empty() {
            self.aliases.assign(&reference.target().alias_prefix())
        } else {
            self.aliases
                .claim(reference.alias().clone())
                .map_err(|taken| Error::AliasExists {
                    canvas: self.name(),
                    alias: taken.0,
                })?
        };
        tracing::trace!(canvas = %self.name(), %alias, target = %reference.target().name(), "adding reference");
        reference.set_alias(alias);
        self.references.push(reference);
        Ok(&self.references[self.references.len() - 1])
    }

    /// Applies `trans` on top of a reference's current placement.
    pub fn transform_reference(&mut self, alias: &str, trans: Transformation) -> Result<()> {
        self.check_mutable("move a reference in")?;
        let index = self.reference_index(alias)?;
        let reference = &mut self.references[index];
        let placed = Transformation::cascade(trans, reference.transformation());
        reference.set_transformation(placed);
        Ok(())
    }

    /// Removes a port.
    pub fn remove_port(&mut self, name: &str) -> Result<Port> {
        self.check_mutable("remove a port from")?;
        self.ports
            .shift_remove(name)
            .ok_or_else(|| Error::PortNotFound {
                canvas: self.name(),
                port: name.into(),
            })
    }

    /// Removes a reference and releases its alias.
    pub fn remove_reference(&mut self, alias: &str) -> Result<Reference> {
        self.check_mutable("remove a reference from")?;
        let index = self.reference_index(alias)?;
        let reference = self.references.remove(index);
        self.aliases.release(reference.alias());
        Ok(reference)
    }

    /// Removes the polygons on `layer` matching `predicate`, returning how many were removed.
    pub fn remove_polygons(
        &mut self,
        layer: Layer,
        mut predicate: impl FnMut(&Polygon) -> bool,
    ) -> Result<usize> {
        self.check_mutable("remove polygons from")?;
        let Some(polygons) = self.polygons.get_mut(&layer) else {
            return Ok(0);
        };
        let before = polygons.len();
        polygons.retain(|p| !predicate(p));
        let removed = before - polygons.len();
        if polygons.is_empty() {
            self.polygons.shift_remove(&layer);
        }
        Ok(removed)
    }

    /// Removes several items at once.
    ///
    /// Every named port and reference must exist; nothing is removed otherwise.
    pub fn remove(&mut self, items: impl IntoIterator<Item = Item>) -> Result<()> {
        self.check_mutable("remove items from")?;
        let items: Vec<Item> = items.into_iter().collect();
        for item in items.iter() {
            match item {
                Item::Port(name) => {
                    self.port(name)?;
                }
                Item::Reference(alias) => {
                    self.reference_index(alias)?;
                }
                Item::Layer(_) => {}
            }
        }
        for item in items {
            match item {
                Item::Port(name) => {
                    self.remove_port(&name)?;
                }
                Item::Reference(alias) => {
                    self.remove_reference(&alias)?;
                }
                Item::Layer(layer) => {
                    self.polygons.shift_remove(&layer);
                    self.labels.retain(|l| l.layer != layer);
                }
            }
        }
        Ok(())
    }

    /// Sets a construction parameter.
    pub fn set_setting(
        &mut self,
        key: impl Into<ArcStr>,
        value: impl Into<serde_json::Value>,
    ) -> Result<()> {
        self.check_mutable("change a setting of")?;
        self.settings.insert(key.into(), value.into());
        Ok(())
    }

    /// Sets a free-form metadata entry.
    pub fn set_info(
        &mut self,
        key: impl Into<ArcStr>,
        value: impl Into<serde_json::Value>,
    ) -> Result<()> {
        self.check_mutable("change the info of")?;
        self.info.insert(key.into(), value.into());
        Ok(())
    }

    /// The construction parameters.
    pub fn settings(&self) -> &MetadataMap {
        &self.settings
    }

    /// The free-form metadata.
    pub fn info(&self) -> &MetadataMap {
        &self.info
    }

    /// The primary sub-canvas whose metadata this canvas inherits.
    pub fn child(&self) -> Option<&Arc<Canvas>> {
        self.child.as_ref()
    }

    /// The polygons owned directly by this canvas, by layer.
    pub fn polygons(&self) -> &IndexMap<Layer, Vec<Polygon>> {
        &self.polygons
    }

    /// The labels owned directly by this canvas.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// The references of this canvas, in insertion order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Returns the reference with the given alias.
    pub fn reference(&self, alias: &str) -> Result<&Reference> {
        self.reference_index(alias).map(|i| &self.references[i])
    }

    fn reference_index(&self, alias: &str) -> Result<usize> {
        self.references
            .iter()
            .position(|r| r.alias() == alias)
            .ok_or_else(|| Error::ReferenceNotFound {
                canvas: self.name(),
                alias: alias.into(),
            })
    }

    /// Retargets every reference for which `target_for` returns a replacement.
    ///
    /// Only used on fresh copies, so the lock is not consulted.
    pub(crate) fn repoint_references(
        &mut self,
        mut target_for: impl FnMut(&Arc<Canvas>) -> Option<Arc<Canvas>>,
    ) {
        for reference in self.references.iter_mut() {
            if let Some(new_target) = target_for(reference.target()) {
                reference.set_target(new_target);
            }
        }
    }
}
