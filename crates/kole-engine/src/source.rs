//! Source file classification.

use std::path::{Path, PathBuf};

use kole_config::QtSupport;

/// Extensions compiled directly to object files.
pub const NATIVE_EXTENSIONS: [&str; 5] = ["c", "cc", "cpp", "cxx", "c++"];

/// Header extensions that can be fed to the meta-compiler.
pub const HEADER_EXTENSIONS: [&str; 4] = ["h", "hh", "hpp", "hxx"];

/// Extension of UI description files.
pub const UI_EXTENSION: &str = "ui";

/// What kind of build step a source file needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Compiled to an object file.
    Native,
    /// Meta-compiled to an intermediate source file.
    MetaHeader,
    /// Turned into a header by the UI generator.
    UiDescriptor,
}

impl SourceKind {
    /// Classify a file extension. Returns `None` for files Kole does not build.
    ///
    /// Headers and UI files only count when their generation step is enabled.
    pub fn infer(extension: &str, qt: &QtSupport) -> Option<Self> {
        if NATIVE_EXTENSIONS.contains(&extension) {
            Some(SourceKind::Native)
        } else if qt.compile_moc && HEADER_EXTENSIONS.contains(&extension) {
            Some(SourceKind::MetaHeader)
        } else if qt.compile_ui && extension == UI_EXTENSION {
            Some(SourceKind::UiDescriptor)
        } else {
            None
        }
    }

    /// Past-tense verb used when reporting a finished step.
    pub fn verb(self) -> &'static str {
        match self {
            SourceKind::Native => "Compiled",
            SourceKind::MetaHeader => "Meta-compiled",
            SourceKind::UiDescriptor => "Generated UI header for",
        }
    }
}

/// A file found while walking a source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub stem: String,
    pub extension: String,
    pub kind: Option<SourceKind>,
}

impl SourceFile {
    pub fn new(path: &Path, qt: &QtSupport) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = SourceKind::infer(&extension, qt);

        Self {
            path: path.to_path_buf(),
            stem,
            extension,
            kind,
        }
    }
}
