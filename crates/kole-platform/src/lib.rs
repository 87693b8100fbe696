//! Host detection and platform naming for Kole.

use std::fmt;
use std::str::FromStr;

/// Setting value that means "detect the host platform".
pub const AUTO: &str = "auto";

/// An operating-system family that flags and binary extensions are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unix,
    Unknown,
}

impl Platform {
    /// Every platform, in declaration order.
    pub const ALL: [Platform; 5] = [
        Platform::Windows,
        Platform::Linux,
        Platform::MacOs,
        Platform::Unix,
        Platform::Unknown,
    ];

    /// Detect the platform Kole is running on.
    pub fn host() -> Self {
        Self::from_os(std::env::consts::OS, cfg!(unix))
    }

    fn from_os(os: &str, is_unix: bool) -> Self {
        match os {
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            _ if is_unix => Platform::Unix,
            _ => Platform::Unknown,
        }
    }

    /// Resolve a configured `platform` setting.
    ///
    /// `"auto"` selects the host. An unrecognized name is not fatal: it is
    /// reported and the host platform is used instead.
    pub fn resolve(setting: &str) -> Self {
        if setting.eq_ignore_ascii_case(AUTO) {
            let host = Self::host();
            tracing::debug!("Operating system is {host}");
            return host;
        }

        match setting.parse::<Platform>() {
            Ok(platform) => {
                tracing::debug!("Using configured platform {platform}");
                platform
            }
            Err(e) => {
                let host = Self::host();
                tracing::warn!("{e}, falling back to {host}");
                host
            }
        }
    }

    /// Human-readable name, e.g. `"MacOS"`.
    pub fn name(self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::MacOs => "MacOS",
            Platform::Unix => "Unix",
            Platform::Unknown => "Unknown",
        }
    }

    /// Key used to look up per-platform flags in the configuration.
    pub fn flag_key(self) -> String {
        self.name().to_ascii_lowercase()
    }

    /// Binary extension used when the configuration asks for `"auto"`.
    pub fn default_extension(self) -> &'static str {
        match self {
            Platform::Windows => "exe",
            Platform::Linux | Platform::Unix => "out",
            Platform::MacOs | Platform::Unknown => "",
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .filter(|p| *p != Platform::Unknown)
            .find(|p| p.flag_key() == lower)
            .ok_or_else(|| PlatformError::UnknownPlatform {
                name: s.to_owned(),
                known: Platform::ALL
                    .iter()
                    .filter(|p| **p != Platform::Unknown)
                    .map(|p| p.flag_key())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform \"{name}\" was not recognized (expected one of: {known})")]
    UnknownPlatform { name: String, known: String },
}
