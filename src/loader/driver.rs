//! Drives loaders over the resources of a project.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::*;
use crate::resource::codec::check_field;
use crate::resource::{DataType, LoadingPhase, Resource, ResourceHandle, ResourcesManager};
use crate::utils::{crc32, path};

use super::{LoaderManager, LoaderPlugin};

/// Outcome of a load pass, as GUID lists in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<u32>,
    pub stalled: Vec<u32>,
    pub failed: Vec<u32>,
}

impl LoadReport {
    /// Returns true if every resource went through.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.stalled.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Pairs a `LoaderManager` with a `ResourcesManager` to import and load resources.
pub struct ResourceLoader<'a> {
    loaders: &'a LoaderManager,
    resources: &'a mut ResourcesManager,
}

impl<'a> ResourceLoader<'a> {
    pub fn new(loaders: &'a LoaderManager, resources: &'a mut ResourcesManager) -> Self {
        ResourceLoader { loaders, resources }
    }

    /// Imports the file at `source` with the latest version of loader `P`.
    ///
    /// The file is copied into the loader subdirectory of the project unless a file
    /// already exists there. If a resource with the same local path is registered, it
    /// is returned as is. Paths that can not be written to the project file are
    /// rejected with `Malformed` before anything is copied.
    pub fn load_resource_from_path<P, T>(&mut self, source: T) -> Result<ResourceHandle>
    where
        P: LoaderPlugin,
        T: AsRef<Path>,
    {
        let source = source.as_ref();
        let loader = self
            .loaders
            .loader::<P>()
            .ok_or_else(|| Error::NotFound(format!("loader {}", P::NAME)))?;

        let filename = path::file_name(source)
            .ok_or_else(|| Error::Malformed(format!("{:?} does not name a file.", source)))?;

        let local_path = path::local_path(loader.subdirectory(), &filename);
        let guid = crc32(local_path.as_str());
        if let Some(rsc) = self.resources.try_get_resource(guid) {
            return Ok(rsc);
        }

        let remote_path = source.to_string_lossy().into_owned();
        check_field(&local_path, "local path", guid)?;
        check_field(&remote_path, "remote path", guid)?;

        let project_dir = self.resources.project_dir().clone();
        let full_path = project_dir.join(&local_path);
        if !full_path.exists() {
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::copy(source, &full_path)?;
            debug!("Copies {:?} into {:?}.", source, full_path);
        }

        let mut resource = Resource::new(local_path, remote_path, loader.versioned_identifier());
        resource.phase = LoadingPhase::LoadEnqueue;
        resource.set_project_dir(project_dir);

        let rsc = ResourceHandle::new(resource);
        self.resources.register_resource(rsc.clone());

        let data_type = loader.load_resource(&rsc, None)?;
        self.finish(data_type, &rsc)?;
        Ok(rsc)
    }

    /// Loads one registered resource with the loader version it records.
    pub fn load_resource(&mut self, rsc: &ResourceHandle) -> Result<DataType> {
        let loader_id = rsc.loader_id();
        let loader = match self.loaders.loader_from_id(loader_id) {
            Some(loader) => loader,
            None => {
                rsc.set_phase(LoadingPhase::Error);
                return Err(Error::UnresolvedLoader(loader_id));
            }
        };

        rsc.set_phase(LoadingPhase::LoadEnqueue);
        match loader.load_resource(rsc, Some(loader_id)) {
            Ok(data_type) => {
                self.finish(data_type, rsc)?;
                Ok(data_type)
            }
            Err(err) => {
                rsc.set_phase(LoadingPhase::Error);
                Err(err)
            }
        }
    }

    // Completes a load that went through the loader, and notifies subscribers unless
    // the loader flagged the resource as failed.
    fn finish(&mut self, data_type: DataType, rsc: &ResourceHandle) -> Result<()> {
        match rsc.phase() {
            LoadingPhase::Error => return Err(Error::LoadFailed(rsc.guid())),
            LoadingPhase::Loading => rsc.set_phase(LoadingPhase::Complete),
            _ => {}
        }

        self.resources.invoke_resource_data_loaded(data_type, rsc);
        Ok(())
    }

    /// Loads every registered resource, dependencies first.
    ///
    /// Missing dependencies are logged and ignored. A resource depending on a failed
    /// or stalled resource is left `Stalled` without calling its loader.
    pub fn load_all_resources(&mut self) -> LoadReport {
        let mut report = LoadReport::default();

        for guid in self.load_order() {
            let rsc = match self.resources.try_get_resource(guid) {
                Some(rsc) => rsc,
                None => continue,
            };

            let blocked = rsc
                .borrow()
                .dependencies
                .iter()
                .filter_map(|&v| self.resources.try_get_resource(v))
                .any(|v| match v.phase() {
                    LoadingPhase::Error | LoadingPhase::Stalled => true,
                    _ => false,
                });

            if blocked {
                warn!("Resource {:08X} stalls on a failed dependency.", guid);
                rsc.set_phase(LoadingPhase::Stalled);
                report.stalled.push(guid);
                continue;
            }

            match self.load_resource(&rsc) {
                Ok(_) => report.loaded.push(guid),
                Err(err) => {
                    warn!("Failed to load resource {:08X}: {}", guid, err);
                    report.failed.push(guid);
                }
            }
        }

        report
    }

    /// GUIDs of the registered resources, every one placed after its dependencies.
    /// Ties are broken by ascending GUID.
    pub fn load_order(&self) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.resources.len());
        let mut marks = HashMap::new();

        for guid in self.resources.guids() {
            self.visit(guid, &mut marks, &mut order);
        }

        order
    }

    fn visit(&self, guid: u32, marks: &mut HashMap<u32, Mark>, order: &mut Vec<u32>) {
        match marks.get(&guid) {
            Some(Mark::Done) => return,
            Some(Mark::Visiting) => {
                warn!("Dependency cycle through resource {:08X}.", guid);
                return;
            }
            None => {}
        }

        let rsc = match self.resources.try_get_resource(guid) {
            Some(rsc) => rsc,
            None => return,
        };

        marks.insert(guid, Mark::Visiting);

        let dependencies: Vec<u32> = rsc.borrow().dependencies.iter().cloned().collect();
        for dep in dependencies {
            if self.resources.contains(dep) {
                self.visit(dep, marks, order);
            } else {
                warn!("Resource {:08X} depends on missing resource {:08X}.", guid, dep);
            }
        }

        marks.insert(guid, Mark::Done);
        order.push(guid);
    }

    /// Unloads the resource `guid`. Returns false if there is no such resource.
    pub fn unload_resource(&mut self, guid: u32) -> Result<bool> {
        let rsc = match self.resources.try_get_resource(guid) {
            Some(rsc) => rsc,
            None => return Ok(false),
        };

        let loader_id = rsc.loader_id();
        let loader = self
            .loaders
            .loader_from_id(loader_id)
            .ok_or(Error::UnresolvedLoader(loader_id))?;

        loader.unload_resource(&rsc, Some(loader_id))?;
        Ok(true)
    }

    /// Unloads every resource that went through its loader. Returns the number of
    /// resources unloaded.
    pub fn unload_all_resources(&mut self) -> usize {
        let mut unloaded = 0;

        for guid in self.resources.guids() {
            let phase = match self.resources.try_get_resource(guid) {
                Some(rsc) => rsc.phase(),
                None => continue,
            };

            match phase {
                LoadingPhase::Complete | LoadingPhase::Loading => {}
                _ => continue,
            }

            match self.unload_resource(guid) {
                Ok(_) => unloaded += 1,
                Err(err) => warn!("Failed to unload resource {:08X}: {}", guid, err),
            }
        }

        unloaded
    }
}

#[cfg(test)]
mod test {
    use super::super::{Loader, LoaderCommand};
    use super::*;

    fn load(rsc: ResourceHandle) -> DataType {
        if rsc.borrow().local_path == "broken" {
            rsc.set_phase(LoadingPhase::Error);
        }

        DataType::from_id(0)
    }

    fn unload(_: ResourceHandle) {}

    fn setup() -> (LoaderManager, ResourcesManager, u32) {
        let mut loaders = LoaderManager::new();
        let mut loader = Loader::new("plain");
        loader.register_command(LoaderCommand::from_fns(load, unload));
        let id = loaders.register_loader(loader).unwrap();
        (loaders, ResourcesManager::new(), id)
    }

    fn add(resources: &mut ResourcesManager, path: &str, id: u32, deps: &[&str]) -> u32 {
        let mut rsc = Resource::new(path, "", id);
        rsc.dependencies = deps.iter().map(|v| crc32(*v)).collect();
        let guid = rsc.guid;
        resources.register_resource(ResourceHandle::new(rsc));
        guid
    }

    #[test]
    fn dependencies_first() {
        let (loaders, mut resources, id) = setup();
        let a = add(&mut resources, "a", id, &["b", "c"]);
        let b = add(&mut resources, "b", id, &["c"]);
        let c = add(&mut resources, "c", id, &["missing"]);

        let mut driver = ResourceLoader::new(&loaders, &mut resources);
        assert_eq!(driver.load_order(), vec![c, b, a]);

        let report = driver.load_all_resources();
        assert_eq!(report.loaded, vec![c, b, a]);
        assert!(report.is_complete());
        assert_eq!(
            resources.try_get_resource(a).unwrap().phase(),
            LoadingPhase::Complete
        );
    }

    #[test]
    fn failures_stall_dependents() {
        let (loaders, mut resources, id) = setup();
        let broken = add(&mut resources, "broken", id, &[]);
        let user = add(&mut resources, "user", id, &["broken"]);
        let orphan = add(&mut resources, "orphan", 0x0bad_0001, &[]);

        let report = ResourceLoader::new(&loaders, &mut resources).load_all_resources();
        assert_eq!(report.stalled, vec![user]);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed.contains(&broken));
        assert!(report.failed.contains(&orphan));
        assert!(report.loaded.is_empty());

        assert_eq!(
            resources.try_get_resource(user).unwrap().phase(),
            LoadingPhase::Stalled
        );
        assert_eq!(
            resources.try_get_resource(orphan).unwrap().phase(),
            LoadingPhase::Error
        );
    }

    #[test]
    fn cycles_terminate() {
        let (loaders, mut resources, id) = setup();
        add(&mut resources, "a", id, &["b"]);
        add(&mut resources, "b", id, &["a"]);

        let report = ResourceLoader::new(&loaders, &mut resources).load_all_resources();
        assert_eq!(report.loaded.len(), 2);
    }

    #[test]
    fn unload_pass() {
        let (loaders, mut resources, id) = setup();
        let a = add(&mut resources, "a", id, &[]);
        add(&mut resources, "b", id, &[]);

        let mut driver = ResourceLoader::new(&loaders, &mut resources);
        driver.load_all_resources();
        assert!(driver.unload_resource(a).unwrap());
        assert!(!driver.unload_resource(1).unwrap());
        assert_eq!(driver.unload_all_resources(), 1);
        assert_eq!(
            resources.try_get_resource(a).unwrap().phase(),
            LoadingPhase::Unloaded
        );
    }
}
