#![forbid(unsafe_code)]
//! Filesystem utilities and process execution for Kole.

pub mod error;
pub mod fs;
pub mod process;

pub use error::UtilError;
pub use process::{Executor, ShellExecutor};
