//! Error types for kole-engine.

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] kole_util::UtilError),

    /// The configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] kole_config::ConfigError),

    /// A compile, generate or link command exited with a non-zero code.
    #[error("command failed with exit code {code}: {command}")]
    CommandFailed { command: String, code: i32 },

    /// The binary to run was never produced.
    #[error("binary executable {path} wasn't found, build the project before running it")]
    MissingBinary { path: String },

    /// The link step found no objects, so any existing binary is stale.
    #[error("nothing was linked, refusing to run a stale {path}")]
    NothingLinked { path: String },

    /// The parallel compile pool could not be started.
    #[error("cannot start compile workers: {message}")]
    WorkerPool { message: String },
}
