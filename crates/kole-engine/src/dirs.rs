//! Project directory management for `kole setup`, `kole init` and `kole clean`.

use std::path::Path;

use kole_config::{BuildConfig, Role};

use crate::error::EngineError;

/// Creates and clears the directories named in the configuration.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryManager<'a> {
    config: &'a BuildConfig,
}

impl<'a> DirectoryManager<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self { config }
    }

    /// Create every directory of the roles listed in `autocreate`, plus the
    /// generated-UI directory when UI generation is enabled.
    ///
    /// A directory that cannot be created is logged and does not stop the
    /// others. Returns how many directories were created.
    pub fn create_directories(&self) -> usize {
        let mut created = 0;

        for name in &self.config.autocreate {
            let Ok(role) = name.parse::<Role>() else {
                continue;
            };
            for dir in self.config.dirs(role) {
                if create_directory(Path::new(dir)) {
                    created += 1;
                }
            }
        }

        let qt = &self.config.qt_support;
        if qt.compile_ui
            && !qt.ui_output_dir.is_empty()
            && create_directory(Path::new(&qt.ui_output_dir))
        {
            created += 1;
        }

        created
    }

    /// Remove every file in the object directory. Returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read or a file cannot be removed.
    pub fn clear_object_directory(&self) -> Result<usize, EngineError> {
        let Some(obj) = self.config.first_dir(Role::Obj) else {
            tracing::warn!("No object directory configured. Nothing to clear");
            return Ok(0);
        };

        let removed = kole_util::fs::clear_dir(Path::new(obj))?;
        if removed == 0 {
            tracing::debug!("Object directory is empty. Nothing to clear");
        } else {
            tracing::debug!("Cleared {removed} file(s) from {obj}");
        }
        Ok(removed)
    }
}

fn create_directory(dir: &Path) -> bool {
    if dir.as_os_str().is_empty() || dir.exists() {
        return false;
    }

    match kole_util::fs::ensure_dir(dir) {
        Ok(()) => {
            tracing::info!("Created empty directory '{}'", dir.display());
            true
        }
        Err(e) => {
            tracing::error!("Failed to create directory '{}': {e}", dir.display());
            false
        }
    }
}
