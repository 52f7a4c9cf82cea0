//! Resources are the assets tracked by a project.
//!
//! # GUID
//!
//! Every resource is identified by the `crc32` of its local path, which is relative
//! to the project directory. The GUID is the primary key of the `ResourcesManager`.
//!
//! # Loader id
//!
//! A resource remembers the versioned identifier of the loader that imported it. The
//! upper 16 bits select the loader type, the lower 16 bits the version of its load and
//! unload commands. Since versions are never removed, resources serialized with an old
//! loader keep resolving to the same commands.
//!
//! # Sharing
//!
//! A `ResourceHandle` is a cheap, single-threaded shared reference to a `Resource`.
//! The registry owns the canonical handle; loaders and load callbacks receive clones.

pub mod codec;
pub mod data_type;
pub mod manager;

pub use self::data_type::{DataType, DataTypeRegistry};
pub use self::manager::{ResourcesManager, Subscription};

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::utils::crc32;

/// The resource loading phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum LoadingPhase {
    /// Newly created resource (no loading).
    New,
    /// Resource on the download queue.
    DownloadEnqueued,
    /// Resource being downloaded.
    Downloading,
    /// Resource on the load queue.
    LoadEnqueue,
    /// Resource being loaded.
    Loading,
    /// Resource is stalled waiting for dependencies.
    Stalled,
    /// Resource has been fully loaded, with its dependencies.
    Complete,
    /// Resource has been unloaded.
    Unloaded,
    /// Resource is in error state.
    Error,
}

impl Default for LoadingPhase {
    fn default() -> Self {
        LoadingPhase::New
    }
}

/// A live reference to the directory of the owning project. Every clone observes
/// relocations made through any other clone.
#[derive(Debug, Clone, Default)]
pub struct ProjectDir(Rc<RefCell<PathBuf>>);

impl ProjectDir {
    pub fn new<T: Into<PathBuf>>(path: T) -> Self {
        ProjectDir(Rc::new(RefCell::new(path.into())))
    }

    #[inline]
    pub fn get(&self) -> PathBuf {
        self.0.borrow().clone()
    }

    #[inline]
    pub fn set<T: Into<PathBuf>>(&self, path: T) {
        *self.0.borrow_mut() = path.into();
    }

    #[inline]
    pub fn join<T: AsRef<Path>>(&self, path: T) -> PathBuf {
        self.0.borrow().join(path)
    }

    /// Returns true if both references point to the same directory slot.
    #[inline]
    pub fn ptr_eq(&self, rhs: &ProjectDir) -> bool {
        Rc::ptr_eq(&self.0, &rhs.0)
    }
}

/// One tracked asset.
pub struct Resource {
    /// Hash value of the local path.
    pub guid: u32,
    /// Versioned identifier of the loader handling this resource.
    pub loader_id: u32,
    pub phase: LoadingPhase,
    /// Path relative to the project directory.
    pub local_path: String,
    /// Original import source, might be empty if local-only.
    pub remote_path: String,
    /// GUIDs of the resources this one depends upon.
    pub dependencies: BTreeSet<u32>,
    project_dir: ProjectDir,
    data: Option<Box<dyn Any>>,
}

impl Resource {
    /// Creates a new resource whose GUID is derived from `local_path`.
    pub fn new<T1, T2>(local_path: T1, remote_path: T2, loader_id: u32) -> Self
    where
        T1: Into<String>,
        T2: Into<String>,
    {
        let local_path = local_path.into();
        Resource {
            guid: crc32(local_path.as_str()),
            loader_id,
            phase: LoadingPhase::New,
            local_path,
            remote_path: remote_path.into(),
            dependencies: BTreeSet::new(),
            project_dir: ProjectDir::default(),
            data: None,
        }
    }

    #[inline]
    pub fn project_dir(&self) -> &ProjectDir {
        &self.project_dir
    }

    #[inline]
    pub fn set_project_dir(&mut self, dir: ProjectDir) {
        self.project_dir = dir;
    }

    /// Path of the resource on disk, following the current project directory.
    #[inline]
    pub fn full_path(&self) -> PathBuf {
        self.project_dir.join(&self.local_path)
    }

    /// Stores the decoded payload, replacing the previous one.
    #[inline]
    pub fn set_data<T: Any>(&mut self, data: T) {
        self.data = Some(Box::new(data));
    }

    #[inline]
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_ref().and_then(|v| v.downcast_ref())
    }

    #[inline]
    pub fn data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.as_mut().and_then(|v| v.downcast_mut())
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    #[inline]
    pub fn take_data(&mut self) -> Option<Box<dyn Any>> {
        self.data.take()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resource")
            .field("guid", &format_args!("{:08X}", self.guid))
            .field("loader_id", &format_args!("{:08X}", self.loader_id))
            .field("phase", &self.phase)
            .field("local_path", &self.local_path)
            .field("remote_path", &self.remote_path)
            .field("dependencies", &self.dependencies)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

/// Shared reference to a `Resource`. Equality is identity.
#[derive(Clone)]
pub struct ResourceHandle(Rc<RefCell<Resource>>);

impl ResourceHandle {
    pub fn new(resource: Resource) -> Self {
        ResourceHandle(Rc::new(RefCell::new(resource)))
    }

    #[inline]
    pub fn borrow(&self) -> Ref<Resource> {
        self.0.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<Resource> {
        self.0.borrow_mut()
    }

    #[inline]
    pub fn guid(&self) -> u32 {
        self.0.borrow().guid
    }

    #[inline]
    pub fn loader_id(&self) -> u32 {
        self.0.borrow().loader_id
    }

    #[inline]
    pub fn phase(&self) -> LoadingPhase {
        self.0.borrow().phase
    }

    #[inline]
    pub fn set_phase(&self, phase: LoadingPhase) {
        self.0.borrow_mut().phase = phase;
    }

    #[inline]
    pub fn ptr_eq(&self, rhs: &ResourceHandle) -> bool {
        Rc::ptr_eq(&self.0, &rhs.0)
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, rhs: &Self) -> bool {
        self.ptr_eq(rhs)
    }
}

impl Eq for ResourceHandle {}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(v) => v.fmt(f),
            Err(_) => write!(f, "Resource(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn guid_and_paths() {
        let dir = ProjectDir::new("/projects/demo");
        let mut rsc = Resource::new("textures/crate.png", "/import/crate.png", 0x0001_0001);
        rsc.set_project_dir(dir.clone());

        assert_eq!(rsc.guid, crc32("textures/crate.png"));
        assert_eq!(rsc.phase, LoadingPhase::New);
        assert_eq!(
            rsc.full_path(),
            PathBuf::from("/projects/demo/textures/crate.png")
        );

        dir.set("/elsewhere");
        assert_eq!(rsc.full_path(), PathBuf::from("/elsewhere/textures/crate.png"));
        assert!(rsc.project_dir().ptr_eq(&dir));
    }

    #[test]
    fn payload() {
        let mut rsc = Resource::new("a.txt", "", 0);
        assert!(rsc.data::<String>().is_none());

        rsc.set_data(String::from("hello"));
        assert_eq!(rsc.data::<String>().map(|v| v.as_str()), Some("hello"));
        assert!(rsc.data::<u32>().is_none());

        rsc.data_mut::<String>().unwrap().push('!');
        let data = rsc.take_data().unwrap();
        assert_eq!(data.downcast_ref::<String>().unwrap(), "hello!");
        assert!(!rsc.has_data());
    }

    #[test]
    fn handles() {
        let a = ResourceHandle::new(Resource::new("a.txt", "", 0));
        let b = a.clone();
        let c = ResourceHandle::new(Resource::new("a.txt", "", 0));

        assert_eq!(a, b);
        assert_ne!(a, c);

        b.set_phase(LoadingPhase::Complete);
        assert_eq!(a.phase(), LoadingPhase::Complete);
    }
}
