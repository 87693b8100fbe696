//! Incremental build pipeline for Kole: exclude patterns, flags, command
//! synthesis and the compile → link → run orchestration.

pub mod build;
pub mod command;
pub mod dirs;
pub mod error;
pub mod flags;
pub mod pattern;
pub mod source;

pub use build::{
    build, BuildOptions, BuildResult, BuildState, Builder, CompileSummary, LinkOutcome,
};
pub use command::CommandSynthesizer;
pub use dirs::DirectoryManager;
pub use error::EngineError;
pub use flags::FlagManager;
pub use pattern::PatternMatcher;
pub use source::{SourceFile, SourceKind};
