//! Functions for loading project settings.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json;

use crate::datafile::{DEFAULT_DATA_FILE, DEFAULT_INDEX_FILE};
use crate::errors::*;

/// A structure containing the naming conventions of the files of a project. Missing
/// fields of a JSON document fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Extension of the project text file, dot included.
    pub file_extension: String,
    /// Name given to projects that have not been named yet.
    pub default_name: String,
    /// File name of the packed data file inside the project directory.
    pub data_file: String,
    /// File name of the data file index inside the project directory.
    pub index_file: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        ProjectSettings {
            file_extension: ".ravineproj".to_owned(),
            default_name: "Unnamed Project".to_owned(),
            data_file: DEFAULT_DATA_FILE.to_owned(),
            index_file: DEFAULT_INDEX_FILE.to_owned(),
        }
    }
}

impl ProjectSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from the JSON file at `path`.
    pub fn load_from<T: AsRef<Path>>(path: T) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
