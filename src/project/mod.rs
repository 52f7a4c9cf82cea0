//! Project lifecycle: creating, loading, saving and unloading a project directory.
//!
//! A project lives in a directory holding:
//!
//! * the project text file `<name><extension>`. Line 1 is the project name, the
//! following lines are the resource records of the `ResourcesManager`;
//! * the packed data file and its index, owned by a `DataFileManager`;
//! * the files imported by the loaders, at their local paths.
//!
//! Every lifecycle operation performs its fallible steps before touching the manager,
//! so a failed call leaves the previous project (or the lack of one) untouched.

pub mod settings;

pub use self::settings::ProjectSettings;

use std::any::Any;
use std::cell::RefCell;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::datafile::{DataFileManager, SharedDataFile};
use crate::errors::*;
use crate::loader::{LoadReport, LoaderManager, ResourceLoader};
use crate::resource::{codec, DataType, ProjectDir, ResourceHandle, ResourcesManager};
use crate::utils::path;

pub struct ProjectManager {
    settings: ProjectSettings,
    initialized: bool,
    name: String,
    directory: ProjectDir,
    loaders: LoaderManager,
    resources: ResourcesManager,
    data_files: SharedDataFile,
}

impl ProjectManager {
    /// Creates an uninitialized project manager.
    pub fn new(settings: ProjectSettings) -> Self {
        let directory = ProjectDir::default();
        let mut resources = ResourcesManager::new();
        resources.set_project_dir(directory.clone());

        let data_files = DataFileManager::with_file_names(
            settings.data_file.as_str(),
            settings.index_file.as_str(),
        );

        ProjectManager {
            name: settings.default_name.clone(),
            settings,
            initialized: false,
            directory,
            loaders: LoaderManager::new(),
            resources,
            data_files: Rc::new(RefCell::new(data_files)),
        }
    }

    #[inline]
    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn file_extension(&self) -> &str {
        &self.settings.file_extension
    }

    #[inline]
    pub fn project_name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn set_project_name<T: Into<String>>(&mut self, name: T) {
        self.name = name.into();
    }

    /// The live project directory, shared with every resource.
    #[inline]
    pub fn project_dir(&self) -> &ProjectDir {
        &self.directory
    }

    /// Relocates the project directory. Resources follow, the data file does not.
    #[inline]
    pub fn set_project_dir<T: Into<PathBuf>>(&mut self, dir: T) {
        self.directory.set(dir);
    }

    /// `<directory>/<name><extension>`.
    pub fn project_file_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}{}", self.name, self.settings.file_extension))
    }

    #[inline]
    pub fn loaders(&self) -> &LoaderManager {
        &self.loaders
    }

    #[inline]
    pub fn loaders_mut(&mut self) -> &mut LoaderManager {
        &mut self.loaders
    }

    #[inline]
    pub fn resources(&self) -> &ResourcesManager {
        &self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut ResourcesManager {
        &mut self.resources
    }

    /// The data file of the project, shared with loaders that pack payloads.
    #[inline]
    pub fn data_files(&self) -> SharedDataFile {
        self.data_files.clone()
    }

    /// Assigns a data type tag to `T`, see `DataTypeRegistry::register`.
    #[inline]
    pub fn register_data_type<T: Any>(&mut self) -> DataType {
        self.resources.data_types_mut().register::<T>()
    }

    /// A driver importing and loading resources with the loaders of this project.
    #[inline]
    pub fn resource_loader(&mut self) -> ResourceLoader<'_> {
        ResourceLoader::new(&self.loaders, &mut self.resources)
    }

    /// Imports `source` through loader `P`, see `ResourceLoader::load_resource_from_path`.
    pub fn import<P, T>(&mut self, source: T) -> Result<ResourceHandle>
    where
        P: crate::loader::LoaderPlugin,
        T: AsRef<Path>,
    {
        if !self.initialized {
            return Err(Error::NotBound);
        }

        self.resource_loader().load_resource_from_path::<P, T>(source)
    }

    /// Project metadata lines.
    pub fn encode(&self) -> String {
        format!("{}\n", self.name)
    }

    /// Reads the project name at `*offset` and advances past it.
    pub fn decode(lines: &[&str], offset: &mut usize) -> Result<String> {
        match lines.get(*offset) {
            Some(name) if !name.is_empty() && !codec::is_resource_line(name) => {
                *offset += 1;
                Ok((*name).to_owned())
            }
            _ => Err(Error::Malformed(format!(
                "Line {}: missing project name.",
                *offset + 1
            ))),
        }
    }

    fn open_data_files(&self, dir: &Path) -> Result<DataFileManager> {
        let mut files = DataFileManager::with_file_names(
            self.settings.data_file.as_str(),
            self.settings.index_file.as_str(),
        );

        files.bind(dir)?;
        Ok(files)
    }

    /// Starts an empty project named `name` in `dir`, creating its data file.
    pub fn new_project<T1, T2>(&mut self, dir: T1, name: T2) -> Result<()>
    where
        T1: AsRef<Path>,
        T2: Into<String>,
    {
        let dir = dir.as_ref();
        let files = self.open_data_files(dir)?;

        if self.initialized {
            self.unload_project();
        }

        self.directory.set(dir);
        self.name = name.into();
        *self.data_files.borrow_mut() = files;
        self.initialized = true;

        info!("Creates project {} in {:?}.", self.name, dir);
        Ok(())
    }

    /// Opens the project file at `path`, then loads every resource it lists.
    ///
    /// The project name is the first line of the file, which may differ from the file
    /// name. The data file index is loaded before any resource, so loaders can read
    /// packed payloads.
    pub fn load_project<T: AsRef<Path>>(&mut self, path: T) -> Result<LoadReport> {
        let path = path.as_ref();
        let (dir, _) = path::split_project_path(path)
            .ok_or_else(|| Error::Malformed(format!("{:?} is not a project file.", path)))?;

        let text = fs::read_to_string(path)?;
        let lines: Vec<&str> = text.lines().collect();

        let mut offset = 0;
        let name = Self::decode(&lines, &mut offset)?;
        let decoded = codec::decode_resources(&lines, &mut offset)?;
        if offset < lines.len() {
            warn!(
                "Ignores {} trailing lines of project file {:?}.",
                lines.len() - offset,
                path
            );
        }

        let mut files = self.open_data_files(&dir)?;
        files.load_index_table()?;

        if self.initialized {
            self.unload_project();
        }

        self.directory.set(dir.as_path());
        self.name = name;
        *self.data_files.borrow_mut() = files;

        for mut rsc in decoded {
            rsc.set_project_dir(self.directory.clone());

            let guid = rsc.guid;
            if !self.resources.register_resource(ResourceHandle::new(rsc)) {
                warn!("Skips resource {:08X} listed twice.", guid);
            }
        }

        self.initialized = true;
        let report = self.resource_loader().load_all_resources();

        info!(
            "Loads project {} from {:?}: {} loaded, {} stalled, {} failed.",
            self.name,
            path,
            report.loaded.len(),
            report.stalled.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Writes the project file and the data file index.
    pub fn save_project(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotBound);
        }

        let mut text = self.encode();
        text.push_str(&self.resources.encode()?);

        let path = self.project_file_path();
        fs::write(&path, text)?;
        self.data_files.borrow_mut().save_index_table()?;

        info!(
            "Saves project {} ({} resources) to {:?}.",
            self.name,
            self.resources.len(),
            path
        );

        Ok(())
    }

    /// Saves the project under `name` in `dir`. Imported files and the data file are
    /// copied over when `dir` differs from the current directory, which the project
    /// then moves to.
    pub fn save_project_as<T1, T2>(&mut self, dir: T1, name: T2) -> Result<()>
    where
        T1: AsRef<Path>,
        T2: Into<String>,
    {
        if !self.initialized {
            return Err(Error::NotBound);
        }

        let dir = dir.as_ref();
        let current = self.directory.get();

        if dir != current.as_path() {
            self.data_files.borrow_mut().save_index_table()?;

            fs::create_dir_all(dir)?;
            for file in &[&self.settings.data_file, &self.settings.index_file] {
                fs::copy(current.join(file), dir.join(file))?;
            }

            for rsc in self.resources.resources() {
                let local_path = rsc.borrow().local_path.clone();
                let source = current.join(&local_path);
                if !source.exists() {
                    continue;
                }

                let target = dir.join(&local_path);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }

                fs::copy(&source, &target)?;
            }

            let mut files = self.open_data_files(dir)?;
            files.load_index_table()?;

            *self.data_files.borrow_mut() = files;
            self.directory.set(dir);
        }

        let previous = mem::replace(&mut self.name, name.into());
        if let Err(err) = self.save_project() {
            self.name = previous;
            return Err(err);
        }

        Ok(())
    }

    /// Unloads every resource through its loader, then forgets the resources and
    /// closes the data file. Load subscriptions are kept.
    pub fn unload_project(&mut self) {
        let unloaded = self.resource_loader().unload_all_resources();
        self.resources.clear_resources();
        self.data_files.borrow_mut().reset();
        self.initialized = false;

        info!("Unloads project {} ({} resources).", self.name, unloaded);
    }
}

impl Default for ProjectManager {
    fn default() -> Self {
        ProjectManager::new(ProjectSettings::default())
    }
}
