//! Helpers to turn file-system paths into the slash separated strings stored in
//! project files.

use std::path::{Path, PathBuf};

/// Returns the file name component of `path` as a string, or `None` if `path`
/// terminates in `..` or is not valid unicode.
pub fn file_name<T: AsRef<Path>>(path: T) -> Option<String> {
    path.as_ref()
        .file_name()
        .and_then(|v| v.to_str())
        .map(|v| v.to_owned())
}

/// Joins a loader subdirectory and a file name into a local resource path.
///
/// ```
/// use ravine::utils::path::local_path;
/// assert_eq!(local_path("textures", "crate.png"), "textures/crate.png");
/// assert_eq!(local_path("textures/", "crate.png"), "textures/crate.png");
/// assert_eq!(local_path("", "crate.png"), "crate.png");
/// ```
pub fn local_path(subdirectory: &str, filename: &str) -> String {
    let subdirectory = subdirectory.replace('\\', "/");
    if subdirectory.is_empty() || subdirectory.ends_with('/') {
        format!("{}{}", subdirectory, filename)
    } else {
        format!("{}/{}", subdirectory, filename)
    }
}

/// Splits a project file path into `(directory, name)`, where `name` is the file
/// stem without the extension.
pub fn split_project_path<T: AsRef<Path>>(path: T) -> Option<(PathBuf, String)> {
    let path = path.as_ref();
    let name = path.file_stem().and_then(|v| v.to_str())?.to_owned();
    let dir = path
        .parent()
        .map(|v| v.to_owned())
        .unwrap_or_else(PathBuf::new);

    Some((dir, name))
}
