//! The registry of every resource known to a project.

use std::collections::BTreeMap;

use crate::delegate::{Delegate, DelegateArena, MulticastDelegate};
use crate::errors::*;

use super::codec;
use super::{DataType, DataTypeRegistry, ProjectDir, ResourceHandle};

/// Callback invoked with a resource whose payload has just been loaded.
pub type OnLoad = Delegate<ResourceHandle, ()>;

/// Token returned by the owning subscription helpers, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    data_type: DataType,
    delegate: OnLoad,
}

impl Subscription {
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Owns the resources of a project, keyed by GUID, plus an index of loaded resources
/// by payload type and the per type load events.
///
/// Event handlers are plain delegates. Closures and methods bound through
/// `subscribe_closure` and `subscribe_method` are kept alive by the manager until
/// they are released by `clear`.
pub struct ResourcesManager {
    project_dir: ProjectDir,
    registry: BTreeMap<u32, ResourceHandle>,
    loaded: BTreeMap<DataType, Vec<ResourceHandle>>,
    events: BTreeMap<DataType, MulticastDelegate<ResourceHandle>>,
    data_types: DataTypeRegistry,
    arena: DelegateArena,
}

impl ResourcesManager {
    /// Creates a new and empty `ResourcesManager`.
    pub fn new() -> Self {
        ResourcesManager {
            project_dir: ProjectDir::default(),
            registry: BTreeMap::new(),
            loaded: BTreeMap::new(),
            events: BTreeMap::new(),
            data_types: DataTypeRegistry::new(),
            arena: DelegateArena::new(),
        }
    }

    #[inline]
    pub fn project_dir(&self) -> &ProjectDir {
        &self.project_dir
    }

    /// Shares `dir` with every registered resource and with resources created later.
    pub fn set_project_dir(&mut self, dir: ProjectDir) {
        for rsc in self.registry.values() {
            rsc.borrow_mut().set_project_dir(dir.clone());
        }

        self.project_dir = dir;
    }

    #[inline]
    pub fn data_types(&self) -> &DataTypeRegistry {
        &self.data_types
    }

    #[inline]
    pub fn data_types_mut(&mut self) -> &mut DataTypeRegistry {
        &mut self.data_types
    }

    /// Adds `rsc` under its GUID. Returns false, leaving the registry untouched, if
    /// the GUID is taken already.
    pub fn register_resource(&mut self, rsc: ResourceHandle) -> bool {
        let guid = rsc.guid();
        if self.registry.contains_key(&guid) {
            return false;
        }

        self.registry.insert(guid, rsc);
        true
    }

    /// Removes the resource `guid` and every data type index entry of it.
    pub fn unregister_resource(&mut self, guid: u32) -> bool {
        let rsc = match self.registry.remove(&guid) {
            Some(rsc) => rsc,
            None => return false,
        };

        for handles in self.loaded.values_mut() {
            handles.retain(|v| !v.ptr_eq(&rsc));
        }

        self.loaded.retain(|_, v| !v.is_empty());
        true
    }

    #[inline]
    pub fn try_get_resource(&self, guid: u32) -> Option<ResourceHandle> {
        self.registry.get(&guid).cloned()
    }

    #[inline]
    pub fn contains(&self, guid: u32) -> bool {
        self.registry.contains_key(&guid)
    }

    /// Iterates registered resources in ascending GUID order.
    #[inline]
    pub fn resources(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.registry.values()
    }

    #[inline]
    pub fn guids(&self) -> Vec<u32> {
        self.registry.keys().cloned().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Every resource loaded with payload type `data_type`, one entry per completed
    /// load, in load order.
    pub fn query_resources_of_data_type(&self, data_type: DataType) -> Vec<ResourceHandle> {
        self.loaded.get(&data_type).cloned().unwrap_or_default()
    }

    /// Same as `query_resources_of_data_type`, with the tag registered for `T`.
    pub fn query_resources<T: 'static>(&self) -> Vec<ResourceHandle> {
        self.data_types
            .get::<T>()
            .map(|v| self.query_resources_of_data_type(v))
            .unwrap_or_default()
    }

    /// GUIDs of the registered resources depending on `guid`.
    pub fn dependents_of(&self, guid: u32) -> Vec<u32> {
        self.registry
            .values()
            .filter(|v| v.borrow().dependencies.contains(&guid))
            .map(|v| v.guid())
            .collect()
    }

    /// Dependencies of `guid` that are not registered.
    pub fn missing_dependencies(&self, guid: u32) -> Vec<u32> {
        match self.registry.get(&guid) {
            Some(rsc) => rsc
                .borrow()
                .dependencies
                .iter()
                .filter(|v| !self.registry.contains_key(*v))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Appends `callback` to the load event of `data_type`.
    pub fn subscribe_on_load(&mut self, data_type: DataType, callback: OnLoad) {
        self.events
            .entry(data_type)
            .or_insert_with(MulticastDelegate::new)
            .add(callback);
    }

    /// Appends `callback` to the load event of the tag registered for `T`.
    pub fn subscribe<T: 'static>(&mut self, callback: OnLoad) -> Result<DataType> {
        let data_type = self.data_types.get::<T>().ok_or_else(|| {
            Error::NotFound(format!("data type {}", ::std::any::type_name::<T>()))
        })?;

        self.subscribe_on_load(data_type, callback);
        Ok(data_type)
    }

    /// Moves `func` into the manager and subscribes it to the load event of
    /// `data_type`.
    pub fn subscribe_closure<F>(&mut self, data_type: DataType, func: F) -> Subscription
    where
        F: Fn(ResourceHandle) + 'static,
    {
        // The arena lives as long as the events, and both are only cleared together.
        let delegate = unsafe { self.arena.bind_closure(func) };
        self.subscribe_on_load(data_type, delegate);
        Subscription {
            data_type,
            delegate,
        }
    }

    /// Subscribes `method` bound to `instance` to the load event of `data_type`.
    ///
    /// # Safety
    ///
    /// `instance` must stay at the same address until the subscription is removed or
    /// the manager is cleared or dropped.
    pub unsafe fn subscribe_method<T: 'static>(
        &mut self,
        data_type: DataType,
        instance: &T,
        method: fn(&T, ResourceHandle),
    ) -> Subscription {
        let delegate = self.arena.bind_method(instance, method);
        self.subscribe_on_load(data_type, delegate);
        Subscription {
            data_type,
            delegate,
        }
    }

    /// Removes the first occurrence of `callback` from the load event of `data_type`.
    pub fn unsubscribe_on_load(&mut self, data_type: DataType, callback: &OnLoad) -> bool {
        match self.events.get_mut(&data_type) {
            Some(event) => event.remove(callback),
            None => false,
        }
    }

    #[inline]
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.unsubscribe_on_load(subscription.data_type, &subscription.delegate)
    }

    /// Number of callbacks subscribed to `data_type`.
    #[inline]
    pub fn subscribers(&self, data_type: DataType) -> usize {
        self.events.get(&data_type).map(|v| v.len()).unwrap_or(0)
    }

    /// Records `rsc` as loaded with `data_type`, then notifies subscribers in
    /// subscription order.
    pub(crate) fn invoke_resource_data_loaded(&mut self, data_type: DataType, rsc: &ResourceHandle) {
        self.loaded
            .entry(data_type)
            .or_insert_with(Vec::new)
            .push(rsc.clone());

        if let Some(event) = self.events.get(&data_type) {
            event.invoke(rsc.clone());
        }
    }

    /// Removes every resource and index entry, keeping subscriptions.
    pub fn clear_resources(&mut self) {
        self.registry.clear();
        self.loaded.clear();
    }

    /// Removes every resource, index entry and subscription.
    pub fn clear(&mut self) {
        self.clear_resources();
        self.events.clear();
        self.arena.clear();
    }

    /// Encodes every resource, in ascending GUID order, one line each.
    pub fn encode(&self) -> Result<String> {
        let mut text = String::new();
        for rsc in self.registry.values() {
            codec::encode_resource(&rsc.borrow(), &mut text)?;
        }

        Ok(text)
    }

    /// Decodes resource lines starting at `*offset` and registers them, sharing the
    /// project directory of this manager. Nothing is registered if any line is
    /// malformed. Returns the number of resources registered; records whose GUID is
    /// taken are skipped.
    pub fn decode(&mut self, lines: &[&str], offset: &mut usize) -> Result<usize> {
        let resources = codec::decode_resources(lines, offset)?;

        let mut registered = 0;
        for mut rsc in resources {
            rsc.set_project_dir(self.project_dir.clone());

            let guid = rsc.guid;
            if self.register_resource(ResourceHandle::new(rsc)) {
                registered += 1;
            } else {
                warn!("Skips resource {:08X} decoded twice.", guid);
            }
        }

        Ok(registered)
    }
}

impl Default for ResourcesManager {
    fn default() -> Self {
        ResourcesManager::new()
    }
}
