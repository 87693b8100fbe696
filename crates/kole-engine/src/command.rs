//! Command-line synthesis for compile, generate, link and run steps.
//!
//! Nothing here touches the filesystem or spawns processes.

use std::path::{Path, PathBuf};

use kole_config::{BuildConfig, Role};
use kole_platform::Platform;

use crate::flags::FlagManager;
use crate::source::SourceKind;

/// Extension of compiled object files.
pub const OBJECT_EXTENSION: &str = "o";

/// Extension of the intermediate sources written by the meta-compiler.
pub const META_SOURCE_EXTENSION: &str = "cpp";

/// Builds shell command strings from the configuration and computed flags.
#[derive(Debug, Clone, Copy)]
pub struct CommandSynthesizer<'a> {
    config: &'a BuildConfig,
    flags: &'a FlagManager<'a>,
}

impl<'a> CommandSynthesizer<'a> {
    pub fn new(config: &'a BuildConfig, flags: &'a FlagManager<'a>) -> Self {
        Self { config, flags }
    }

    /// Where the build step for `<stem>.<extension>` writes its output.
    ///
    /// Returns `None` for unsupported files, or when the target directory is not configured.
    pub fn artifact_path(&self, stem: &str, extension: &str) -> Option<PathBuf> {
        let qt = &self.config.qt_support;

        match SourceKind::infer(extension, qt)? {
            SourceKind::Native => {
                let obj = self.config.first_dir(Role::Obj)?;
                Some(Path::new(obj).join(format!("{stem}.{OBJECT_EXTENSION}")))
            }
            SourceKind::MetaHeader => {
                let obj = self.config.first_dir(Role::Obj)?;
                Some(Path::new(obj).join(format!(
                    "{}{stem}.{META_SOURCE_EXTENSION}",
                    qt.moc_prefix
                )))
            }
            SourceKind::UiDescriptor => Some(Path::new(&qt.ui_output_dir).join(format!(
                "{}{stem}.{}",
                qt.ui_prefix, qt.ui_extension
            ))),
        }
    }

    /// The command that turns `source` into `output`, chosen by `extension`.
    ///
    /// Returns `None` for unsupported extensions.
    pub fn compile_command(&self, extension: &str, source: &Path, output: &Path) -> Option<String> {
        let kind = SourceKind::infer(extension, &self.config.qt_support)?;
        let source = source.display().to_string();
        let output = output.display().to_string();

        let command = match kind {
            SourceKind::Native => self.native_command(&source, &output),
            SourceKind::MetaHeader => join_parts(&[
                &self.config.qt_support.moc,
                &source,
                "-o",
                &output,
                "--no-notes",
            ]),
            SourceKind::UiDescriptor => {
                join_parts(&[&self.config.qt_support.uic, &source, "-o", &output])
            }
        };
        Some(command)
    }

    fn native_command(&self, source: &str, output: &str) -> String {
        let standard = if self.config.language_version.is_empty() {
            String::new()
        } else {
            format!("-std={}", self.config.language_version)
        };

        join_parts(&[
            &self.config.compiler,
            &standard,
            self.flags.flags(),
            "-c",
            source,
            "-o",
            output,
            self.flags.include_paths(),
        ])
    }

    /// The command that links `objects` into `output`.
    pub fn link_command(&self, objects: &[PathBuf], output: &Path) -> String {
        let objects = objects
            .iter()
            .map(|o| o.display().to_string())
            .collect::<Vec<_>>()
            .join(" ");

        join_parts(&[
            &self.config.compiler,
            &objects,
            "-o",
            &output.display().to_string(),
            self.flags.flags(),
        ])
    }

    /// The command that starts `binary` with `args` appended.
    ///
    /// Relative paths are prefixed with `./`; on Windows every `/` becomes `\`.
    pub fn run_command(binary: &Path, args: &str, platform: Platform) -> String {
        let program = if binary.is_absolute() {
            binary.display().to_string()
        } else {
            format!("./{}", binary.display())
        };
        let command = join_parts(&[&program, args]);

        if platform.is_windows() {
            command.replace('/', "\\")
        } else {
            command
        }
    }
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
