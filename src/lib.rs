//! # What is This?
//!
//! Ravine is the storage and loading core of a project-based asset tool. It keeps
//! track of the resources (assets) of a project directory, loads them through
//! versioned loaders, notifies subscribers when payloads become available, and packs
//! binary payloads into a single indexed data file.
//!
//! # Overview
//!
//! * `datafile` stores variable-length binary records in `project.dat`, addressed
//! through the offsets kept in `project.idx`;
//! * `delegate` provides copyable, comparable handles to free functions, closures and
//! bound methods;
//! * `resource` holds the GUID keyed resource registry, its text encoding and the
//! per data type load events;
//! * `loader` contains the versioned loaders and the driver running them;
//! * `project` ties everything to a project directory and its project file.
//!
//! Everything is single-threaded; load callbacks run inline on the calling thread.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod errors;
pub mod utils;
pub mod datafile;
pub mod delegate;
pub mod loader;
pub mod project;
pub mod resource;

pub mod prelude {
    pub use crate::datafile::{DataFileManager, DataReader, DataSerializer, DataWriter};
    pub use crate::delegate::{Delegate, DelegateArena, MulticastDelegate};
    pub use crate::errors::{Error, Result};
    pub use crate::loader::{
        Bytes, BytesLoader, LoadMethod, LoadReport, Loader, LoaderCommand, LoaderManager,
        LoaderPlugin, ResourceLoader, UnloadMethod,
    };
    pub use crate::project::{ProjectManager, ProjectSettings};
    pub use crate::resource::{
        DataType, LoadingPhase, ProjectDir, Resource, ResourceHandle, ResourcesManager,
    };
}
