use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Keys accepted in the `[flags]` table.
pub const KNOWN_FLAG_KEYS: [&str; 5] = ["common", "windows", "linux", "macos", "unix"];

/// Setting value that is resolved later from the platform.
pub const AUTO: &str = "auto";

/// The logical category of a configured directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Src,
    Obj,
    Bin,
    Include,
    Ui,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Src, Role::Obj, Role::Bin, Role::Include, Role::Ui];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Src => "src",
            Role::Obj => "obj",
            Role::Bin => "bin",
            Role::Include => "include",
            Role::Ui => "ui",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL.into_iter().find(|r| r.as_str() == s).ok_or(())
    }
}

/// One or more directory paths. A bare string in the config is a one-element list.
///
/// Empty entries and entries spelled `none` are dropped on load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "Vec<String>")]
pub struct DirList(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for DirList {
    fn from(value: OneOrMany) -> Self {
        let raw = match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        };
        DirList::new(raw)
    }
}

impl From<DirList> for Vec<String> {
    fn from(value: DirList) -> Self {
        value.0
    }
}

impl DirList {
    pub fn new<S: Into<String>>(dirs: impl IntoIterator<Item = S>) -> Self {
        Self(
            dirs.into_iter()
                .map(Into::into)
                .filter(|d| !d.is_empty() && !is_none(d))
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The `[directories]` table: role → paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directories {
    pub src: DirList,
    pub obj: DirList,
    pub bin: DirList,
    pub include: DirList,
    pub ui: DirList,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            src: DirList::new(["src"]),
            obj: DirList::new(["obj"]),
            bin: DirList::new(["bin"]),
            include: DirList::new(["include"]),
            ui: DirList::default(),
            unknown: BTreeMap::new(),
        }
    }
}

impl Directories {
    pub fn get(&self, role: Role) -> &DirList {
        match role {
            Role::Src => &self.src,
            Role::Obj => &self.obj,
            Role::Bin => &self.bin,
            Role::Include => &self.include,
            Role::Ui => &self.ui,
        }
    }
}

/// The `[qt_support]` table: meta-compilation and UI generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QtSupport {
    pub compile_ui: bool,
    pub compile_moc: bool,
    pub ui_prefix: String,
    pub ui_extension: String,
    pub ui_output_dir: String,
    pub moc_prefix: String,
    /// Meta-compiler executable.
    pub moc: String,
    /// UI generator executable.
    pub uic: String,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

impl Default for QtSupport {
    fn default() -> Self {
        Self {
            compile_ui: false,
            compile_moc: false,
            ui_prefix: "ui_".to_owned(),
            ui_extension: "h".to_owned(),
            ui_output_dir: "ui".to_owned(),
            moc_prefix: "moc_".to_owned(),
            moc: "moc".to_owned(),
            uic: "uic".to_owned(),
            unknown: BTreeMap::new(),
        }
    }
}

/// The `Kole.toml` build configuration.
///
/// Scalar fields come before tables so the default file serializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub output: String,
    pub extension: String,
    pub platform: String,
    pub compiler: String,
    pub language_version: String,
    pub optimization: String,
    pub autocreate: Vec<String>,
    pub exclude: Vec<String>,
    pub directories: Directories,
    pub flags: BTreeMap<String, String>,
    pub qt_support: QtSupport,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: "main".to_owned(),
            extension: AUTO.to_owned(),
            platform: AUTO.to_owned(),
            compiler: "g++".to_owned(),
            language_version: "c++17".to_owned(),
            optimization: "debug".to_owned(),
            autocreate: vec!["obj".to_owned(), "bin".to_owned()],
            exclude: Vec::new(),
            directories: Directories::default(),
            flags: KNOWN_FLAG_KEYS
                .iter()
                .map(|k| ((*k).to_owned(), String::new()))
                .collect(),
            qt_support: QtSupport::default(),
            unknown: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Load a config file, falling back to defaults when it does not exist.
    ///
    /// Unrecognized keys are reported as warnings and otherwise ignored.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read, is not valid TOML,
    /// or leaves a required key empty.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(
                "Config file {} doesn't exist, using default values",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml_str(&content, &path.display().to_string())?;
        tracing::debug!("Read config file {}", path.display());
        Ok(config)
    }

    /// Parse, normalize and validate config text. `origin` names the source in errors.
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or a required key is empty.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut config: BuildConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_owned(),
            source: e,
        })?;
        config.normalize();

        for warning in config.warnings() {
            tracing::warn!("{warning}");
        }

        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize { source: e })
    }

    /// Write a default config to `path` unless one already exists.
    ///
    /// Returns `true` if a file was written.
    ///
    /// # Errors
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn write_default(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            tracing::warn!("A config file already exists at {}", path.display());
            return Ok(false);
        }

        let content = Self::default().to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        tracing::info!("Created config file at {}", path.display());
        Ok(true)
    }

    /// Paths configured for `role`.
    pub fn dirs(&self, role: Role) -> &[String] {
        self.directories.get(role).as_slice()
    }

    /// First path configured for `role`, used for single-directory roles.
    pub fn first_dir(&self, role: Role) -> Option<&str> {
        self.directories.get(role).first()
    }

    /// Turn every `none` setting into an empty value.
    fn normalize(&mut self) {
        for value in [
            &mut self.output,
            &mut self.extension,
            &mut self.platform,
            &mut self.compiler,
            &mut self.language_version,
            &mut self.optimization,
            &mut self.qt_support.ui_prefix,
            &mut self.qt_support.ui_extension,
            &mut self.qt_support.ui_output_dir,
            &mut self.qt_support.moc_prefix,
        ] {
            if is_none(value) {
                value.clear();
            }
        }

        for value in self.flags.values_mut() {
            if is_none(value) {
                value.clear();
            }
        }

        self.autocreate.retain(|v| !is_none(v));
        self.exclude.retain(|v| !v.is_empty() && !is_none(v));
    }

    /// Non-fatal problems with the configuration.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for key in self.unknown.keys() {
            warnings.push(format!(
                "Property '{key}' was not recognized in the configuration. Ignoring..."
            ));
        }
        for key in self.directories.unknown.keys() {
            warnings.push(format!("Directory '{key}' was not recognized. Ignoring..."));
        }
        for key in self.flags.keys() {
            if !KNOWN_FLAG_KEYS.contains(&key.as_str()) {
                warnings.push(format!("Flag '{key}' was not recognized. Ignoring..."));
            }
        }
        for key in self.qt_support.unknown.keys() {
            warnings.push(format!(
                "QT support property '{key}' was not recognized. Ignoring..."
            ));
        }
        for role in &self.autocreate {
            if role.parse::<Role>().is_err() {
                warnings.push(format!(
                    "Autocreate entry '{role}' is not a directory role. Ignoring..."
                ));
            }
        }

        let ui_extension = self.qt_support.ui_extension.as_str();
        if self.qt_support.compile_ui && ui_extension != "h" && ui_extension != "hpp" {
            warnings.push(format!(
                "UI extension '{ui_extension}' is not valid and may cause issues"
            ));
        }

        warnings
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("output", &self.output),
            ("platform", &self.platform),
            ("compiler", &self.compiler),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty {
                    key: key.to_owned(),
                });
            }
        }
        Ok(())
    }
}

fn is_none(value: &str) -> bool {
    value.eq_ignore_ascii_case("none")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid Kole.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("cannot serialize config: {source}")]
    Serialize { source: toml::ser::Error },
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("'{key}' in the config can't be empty")]
    Empty { key: String },
}
