//! Versioned loaders turning files into resource payloads.
//!
//! A `Loader` is a named, append-only list of `LoaderCommand`s. The command at index
//! `i` is version `i + 1`; the newest version is used when importing new files, while
//! resources remember the version they were imported with.
//!
//! Concrete loaders are plain types implementing `LoaderPlugin`. Registering one into
//! the `LoaderManager` binds its methods into a `Loader`:
//!
//! ```rust
//! use ravine::prelude::*;
//!
//! struct Text(DataType);
//!
//! impl Text {
//!     fn load(&self, rsc: ResourceHandle) -> DataType {
//!         rsc.borrow_mut().set_data(String::from("text"));
//!         self.0
//!     }
//!
//!     fn unload(&self, rsc: ResourceHandle) {
//!         rsc.borrow_mut().take_data();
//!     }
//! }
//!
//! impl LoaderPlugin for Text {
//!     const NAME: &'static str = "text";
//!
//!     fn commands() -> Vec<(LoadMethod<Self>, UnloadMethod<Self>)> {
//!         vec![(Self::load as LoadMethod<Self>, Self::unload as UnloadMethod<Self>)]
//!     }
//! }
//!
//! let mut loaders = LoaderManager::new();
//! let id = loaders.register_plugin(Text(DataType::from_id(0))).unwrap();
//! assert_eq!(id & 0xffff, 1);
//! ```

pub mod bytes;
pub mod driver;
pub mod manager;

pub use self::bytes::{Bytes, BytesLoader};
pub use self::driver::{LoadReport, ResourceLoader};
pub use self::manager::LoaderManager;

use std::fmt;

use crate::delegate::{Delegate, DelegateArena};
use crate::errors::*;
use crate::resource::{DataType, LoadingPhase, ResourceHandle};
use crate::utils::crc16;

/// Bits of a loader id selecting the loader type.
pub const IDENTIFIER_MASK: u32 = 0xffff_0000;
/// Bits of a loader id selecting the command version.
pub const VERSION_MASK: u32 = 0x0000_ffff;

pub type LoadMethod<T> = fn(&T, ResourceHandle) -> DataType;
pub type UnloadMethod<T> = fn(&T, ResourceHandle);

/// A pair of callables producing and releasing the payload of a resource.
///
/// Once registered, a command is only ever invoked through its `Loader`.
#[derive(Debug, PartialEq, Eq)]
pub struct LoaderCommand {
    load: Delegate<ResourceHandle, DataType>,
    unload: Delegate<ResourceHandle, ()>,
}

impl LoaderCommand {
    #[inline]
    pub fn new(
        load: Delegate<ResourceHandle, DataType>,
        unload: Delegate<ResourceHandle, ()>,
    ) -> Self {
        LoaderCommand { load, unload }
    }

    #[inline]
    pub fn from_fns(load: fn(ResourceHandle) -> DataType, unload: fn(ResourceHandle)) -> Self {
        LoaderCommand {
            load: Delegate::from_fn(load),
            unload: Delegate::from_fn(unload),
        }
    }
}

/// A loader type that can be registered into the `LoaderManager`.
pub trait LoaderPlugin: Sized + 'static {
    /// Name of the loader. Its `crc16` is the loader type identifier.
    const NAME: &'static str;

    /// Directory, relative to the project directory, imported files are copied to.
    /// Expected to end with a separator when not empty.
    fn subdirectory(&self) -> &str {
        ""
    }

    /// Load and unload methods, oldest version first.
    fn commands() -> Vec<(LoadMethod<Self>, UnloadMethod<Self>)>;
}

/// Returns the version bits of `loader_id`.
#[inline]
pub fn loader_version(loader_id: u32) -> u16 {
    (loader_id & VERSION_MASK) as u16
}

pub struct Loader {
    name: String,
    type_hash: u16,
    subdirectory: String,
    commands: Vec<LoaderCommand>,
    arena: DelegateArena,
}

impl Loader {
    /// Creates a loader named `name`, without any command.
    pub fn new<T: Into<String>>(name: T) -> Self {
        let name = name.into();
        Loader {
            type_hash: crc16(name.as_str()),
            name,
            subdirectory: String::new(),
            commands: Vec::new(),
            arena: DelegateArena::new(),
        }
    }

    pub fn with_subdirectory<T: Into<String>>(mut self, subdirectory: T) -> Self {
        self.subdirectory = subdirectory.into();
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn subdirectory(&self) -> &str {
        &self.subdirectory
    }

    /// The loader type identifier, shifted into the upper 16 bits.
    #[inline]
    pub fn identifier(&self) -> u32 {
        u32::from(self.type_hash) << 16
    }

    /// `identifier()` combined with the latest version.
    #[inline]
    pub fn versioned_identifier(&self) -> u32 {
        self.identifier() | u32::from(self.version())
    }

    /// The number of registered commands, i.e. the latest version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.commands.len() as u16
    }

    /// Appends `cmd` as the next version, which is returned.
    pub fn register_command(&mut self, cmd: LoaderCommand) -> u16 {
        self.commands.push(cmd);
        self.version()
    }

    /// Moves `load` and `unload` into the loader and appends them as the next version.
    ///
    /// The closures are dropped with the loader. Commands never leave it, so they can
    /// not be called afterwards:
    ///
    /// ```compile_fail
    /// use ravine::prelude::*;
    ///
    /// let mut loader = Loader::new("text");
    /// loader.register_closures(|_| DataType::from_id(0), |_| {});
    /// let cmd = loader.command(None);
    /// ```
    pub fn register_closures<L, U>(&mut self, load: L, unload: U) -> u16
    where
        L: Fn(ResourceHandle) -> DataType + 'static,
        U: Fn(ResourceHandle) + 'static,
    {
        // Only reachable through `command`, which borrows the loader owning the arena.
        let cmd = unsafe {
            LoaderCommand::new(self.arena.bind_closure(load), self.arena.bind_closure(unload))
        };

        self.register_command(cmd)
    }

    /// Appends `load` and `unload`, bound to `instance`, as the next version.
    ///
    /// # Safety
    ///
    /// `instance` must stay at the same address as long as this loader is alive.
    pub unsafe fn register_methods<T: 'static>(
        &mut self,
        instance: &T,
        load: LoadMethod<T>,
        unload: UnloadMethod<T>,
    ) -> u16 {
        let cmd = LoaderCommand::new(
            self.arena.bind_method(instance, load),
            self.arena.bind_method(instance, unload),
        );

        self.register_command(cmd)
    }

    /// Resolves the command of `loader_id`, or the latest one if `None`.
    pub(crate) fn command(&self, loader_id: Option<u32>) -> Result<&LoaderCommand> {
        let (id, version) = match loader_id {
            Some(id) => {
                if id & IDENTIFIER_MASK != self.identifier() {
                    return Err(Error::UnresolvedLoader(id));
                }

                (id, loader_version(id))
            }
            None => (self.versioned_identifier(), self.version()),
        };

        if version == 0 {
            return Err(Error::UnresolvedLoader(id));
        }

        self.commands
            .get(usize::from(version) - 1)
            .ok_or(Error::UnresolvedLoader(id))
    }

    /// Loads `rsc` with the command of `loader_id`, or the latest one if `None`.
    ///
    /// The resource is moved to `Loading` before the command runs; nothing is touched
    /// if the command can not be resolved.
    pub fn load_resource(&self, rsc: &ResourceHandle, loader_id: Option<u32>) -> Result<DataType> {
        let cmd = self.command(loader_id)?;
        rsc.set_phase(LoadingPhase::Loading);
        Ok(cmd.load.invoke(rsc.clone()))
    }

    /// Unloads `rsc` with the command of `loader_id`, or the latest one if `None`, and
    /// moves it to `Unloaded`. Unloading an unloaded resource does nothing.
    pub fn unload_resource(&self, rsc: &ResourceHandle, loader_id: Option<u32>) -> Result<()> {
        if rsc.phase() == LoadingPhase::Unloaded {
            return Ok(());
        }

        let cmd = self.command(loader_id)?;
        cmd.unload.invoke(rsc.clone());
        rsc.set_phase(LoadingPhase::Unloaded);
        Ok(())
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Loader")
            .field("name", &self.name)
            .field("identifier", &format_args!("{:08X}", self.identifier()))
            .field("version", &self.version())
            .field("subdirectory", &self.subdirectory)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::resource::Resource;

    fn load_v1(rsc: ResourceHandle) -> DataType {
        rsc.borrow_mut().set_data(1u32);
        DataType::from_id(1)
    }

    fn load_v2(rsc: ResourceHandle) -> DataType {
        rsc.borrow_mut().set_data(2u32);
        DataType::from_id(2)
    }

    fn unload(rsc: ResourceHandle) {
        rsc.borrow_mut().take_data();
    }

    #[test]
    fn versions() {
        let mut loader = Loader::new("text");
        assert_eq!(loader.identifier(), u32::from(crc16("text")) << 16);
        assert_eq!(loader.version(), 0);
        assert!(loader.command(None).is_err());

        assert_eq!(loader.register_command(LoaderCommand::from_fns(load_v1, unload)), 1);
        assert_eq!(loader.register_command(LoaderCommand::from_fns(load_v2, unload)), 2);
        assert_eq!(loader.versioned_identifier(), loader.identifier() | 2);

        let rsc = ResourceHandle::new(Resource::new("a.txt", "", loader.identifier() | 1));
        let tag = loader.load_resource(&rsc, Some(rsc.loader_id())).unwrap();
        assert_eq!(tag, DataType::from_id(1));
        assert_eq!(rsc.phase(), LoadingPhase::Loading);
        assert_eq!(rsc.borrow().data::<u32>(), Some(&1));

        let tag = loader.load_resource(&rsc, None).unwrap();
        assert_eq!(tag, DataType::from_id(2));
        assert_eq!(rsc.borrow().data::<u32>(), Some(&2));
    }

    #[test]
    fn unresolved() {
        let mut loader = Loader::new("text");
        loader.register_command(LoaderCommand::from_fns(load_v1, unload));

        let rsc = ResourceHandle::new(Resource::new("a.txt", "", 0));
        let id = loader.identifier();
        assert!(loader.load_resource(&rsc, Some(id)).is_err());
        assert!(loader.load_resource(&rsc, Some(id | 2)).is_err());
        assert!(loader.load_resource(&rsc, Some(0x1234_0001)).is_err());
        assert_eq!(rsc.phase(), LoadingPhase::New);
    }

    #[test]
    fn unload_once() {
        let count = Rc::new(Cell::new(0));
        let mut loader = Loader::new("counted");

        {
            let count = count.clone();
            loader.register_closures(
                |_| DataType::from_id(0),
                move |_| count.set(count.get() + 1),
            );
        }

        let rsc = ResourceHandle::new(Resource::new("a.txt", "", 0));
        loader.load_resource(&rsc, None).unwrap();
        loader.unload_resource(&rsc, None).unwrap();
        loader.unload_resource(&rsc, None).unwrap();
        assert_eq!(rsc.phase(), LoadingPhase::Unloaded);
        assert_eq!(count.get(), 1);

        drop(loader);
        assert_eq!(Rc::strong_count(&count), 1);
    }
}
