//! Error types for kole-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A command could not be spawned.
    #[error("cannot execute `{command}`: {source}")]
    CommandExec {
        command: String,
        source: std::io::Error,
    },
}
