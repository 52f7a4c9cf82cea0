use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::ptr::NonNull;

use crate::errors::*;

use super::{Loader, LoaderPlugin, IDENTIFIER_MASK};

// Owns a plugin through the raw pointer its commands are bound to. The allocation
// never moves, nor is it re-borrowed uniquely, until it is freed on drop.
struct PluginBox(NonNull<dyn Any>);

impl PluginBox {
    fn new<P: Any>(plugin: P) -> (Self, NonNull<P>) {
        let raw = NonNull::from(Box::leak(Box::new(plugin)));
        (PluginBox(raw), raw)
    }

    #[inline]
    fn get(&self) -> &dyn Any {
        unsafe { self.0.as_ref() }
    }
}

impl Drop for PluginBox {
    fn drop(&mut self) {
        unsafe { drop(Box::from_raw(self.0.as_ptr())) }
    }
}

// Fields drop in declaration order, so the loader (and the delegates bound to the
// plugin) goes away before the plugin.
struct LoaderSlot {
    loader: Loader,
    plugin: Option<PluginBox>,
}

/// The set of loaders of a project, addressable by plugin type and by loader id.
#[derive(Default)]
pub struct LoaderManager {
    slots: Vec<LoaderSlot>,
    identifiers: BTreeMap<u32, usize>,
    plugins: HashMap<TypeId, usize>,
}

impl LoaderManager {
    /// Creates a new and empty `LoaderManager`.
    pub fn new() -> Self {
        LoaderManager {
            slots: Vec::new(),
            identifiers: BTreeMap::new(),
            plugins: HashMap::new(),
        }
    }

    /// Takes ownership of `plugin`, binds its commands into a new loader and returns
    /// the versioned identifier of that loader.
    pub fn register_plugin<P: LoaderPlugin>(&mut self, plugin: P) -> Result<u32> {
        if self.plugins.contains_key(&TypeId::of::<P>()) {
            return Err(Error::DuplicateKey(format!("loader {}", P::NAME)));
        }

        let mut loader = Loader::new(P::NAME).with_subdirectory(plugin.subdirectory());
        self.check_identifier(&loader)?;

        let (plugin, raw) = PluginBox::new(plugin);
        for (load, unload) in P::commands() {
            // The plugin is freed after the loader, see `LoaderSlot`.
            unsafe {
                loader.register_methods(raw.as_ref(), load, unload);
            }
        }

        let index = self.push(loader, Some(plugin));
        self.plugins.insert(TypeId::of::<P>(), index);
        Ok(self.slots[index].loader.versioned_identifier())
    }

    /// Adds a loader whose commands were registered by hand.
    pub fn register_loader(&mut self, loader: Loader) -> Result<u32> {
        self.check_identifier(&loader)?;

        let id = loader.versioned_identifier();
        self.push(loader, None);
        Ok(id)
    }

    fn check_identifier(&self, loader: &Loader) -> Result<()> {
        if self.identifiers.contains_key(&loader.identifier()) {
            return Err(Error::DuplicateKey(format!(
                "loader identifier {:08X} ({})",
                loader.identifier(),
                loader.name()
            )));
        }

        Ok(())
    }

    fn push(&mut self, loader: Loader, plugin: Option<PluginBox>) -> usize {
        info!(
            "Registers loader {} ({:08X}) with {} version(s).",
            loader.name(),
            loader.identifier(),
            loader.version()
        );

        let index = self.slots.len();
        self.identifiers.insert(loader.identifier(), index);
        self.slots.push(LoaderSlot { loader, plugin });
        index
    }

    /// Gets the loader built from plugin `P`.
    pub fn loader<P: LoaderPlugin>(&self) -> Option<&Loader> {
        self.plugins
            .get(&TypeId::of::<P>())
            .map(|&v| &self.slots[v].loader)
    }

    /// Gets the plugin instance of type `P`.
    pub fn plugin<P: LoaderPlugin>(&self) -> Option<&P> {
        self.plugins
            .get(&TypeId::of::<P>())
            .and_then(|&v| self.slots[v].plugin.as_ref())
            .and_then(|v| v.get().downcast_ref::<P>())
    }

    /// Gets the loader of `loader_id`, ignoring its version bits.
    pub fn loader_from_id(&self, loader_id: u32) -> Option<&Loader> {
        self.identifiers
            .get(&(loader_id & IDENTIFIER_MASK))
            .map(|&v| &self.slots[v].loader)
    }

    /// Iterates loaders in registration order.
    pub fn loaders(&self) -> impl Iterator<Item = &Loader> {
        self.slots.iter().map(|v| &v.loader)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
