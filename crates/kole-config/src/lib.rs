//! Load and validate `Kole.toml`.

pub mod config;

pub use config::{BuildConfig, ConfigError, DirList, Directories, QtSupport, Role};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "Kole.toml";
