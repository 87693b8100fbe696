//! Filesystem utilities for Kole.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::UtilError;

fn io_error(path: &Path, source: std::io::Error) -> UtilError {
    UtilError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| io_error(path, source))
}

/// Return the last modification time of `path`.
///
/// # Errors
/// Returns an error if the metadata cannot be read.
pub fn modified_time(path: &Path) -> Result<SystemTime, UtilError> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| io_error(path, source))
}

/// List the regular files directly inside `dir`, sorted by path.
///
/// Sub-directories are not descended into.
///
/// # Errors
/// Returns an error if `dir` cannot be read.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| io_error(dir, source))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| io_error(dir, source))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Remove every regular file directly inside `dir`. Returns how many were removed.
///
/// No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be read, or a file cannot be removed.
pub fn clear_dir(dir: &Path) -> Result<usize, UtilError> {
    if !dir.exists() {
        return Ok(0);
    }

    let files = list_files(dir)?;
    for file in &files {
        std::fs::remove_file(file).map_err(|source| io_error(file, source))?;
    }
    Ok(files.len())
}
