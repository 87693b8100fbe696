//! Compiler flag and include-path computation.

use std::sync::OnceLock;

use kole_config::{BuildConfig, Role};
use kole_platform::Platform;

/// Optimization level names (lower-case) and their compiler switches.
pub const OPTIMIZATION_LEVELS: [(&str, &str); 7] = [
    ("none", "-O0"),
    ("opt1", "-O1"),
    ("opt2", "-O2"),
    ("release", "-O3"),
    ("fast", "-Ofast"),
    ("debug", "-Og"),
    ("size", "-Os"),
];

const DEFAULT_OPTIMIZATION: &str = "-Og";

/// Computes the flag and include-path strings once and hands out the cached copies.
#[derive(Debug)]
pub struct FlagManager<'a> {
    config: &'a BuildConfig,
    platform: Platform,
    flags: OnceLock<String>,
    include_paths: OnceLock<String>,
}

impl<'a> FlagManager<'a> {
    pub fn new(config: &'a BuildConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            flags: OnceLock::new(),
            include_paths: OnceLock::new(),
        }
    }

    /// Optimization switch, common flags and platform flags, in that order.
    pub fn flags(&self) -> &str {
        self.flags.get_or_init(|| {
            tracing::debug!("Generating flags for the first time...");

            let common = self
                .config
                .flags
                .get("common")
                .map(String::as_str)
                .unwrap_or_default();
            let platform = self.platform_flags();
            let (user_flags, packages) = extract_pkg_config(&join_flags(&[common, platform]));
            let pkg_clause = pkg_config_clause(&packages);

            let flags = join_flags(&[self.optimization(), &user_flags, &pkg_clause]);
            tracing::debug!("Generated flags: '{flags}'");
            flags
        })
    }

    /// One `-I<dir>` per include directory, plus the generated-UI directory
    /// when UI generation is enabled.
    pub fn include_paths(&self) -> &str {
        self.include_paths.get_or_init(|| {
            let mut dirs: Vec<&str> = self
                .config
                .dirs(Role::Include)
                .iter()
                .map(String::as_str)
                .collect();

            let qt = &self.config.qt_support;
            if qt.compile_ui && !qt.ui_output_dir.is_empty() {
                dirs.push(qt.ui_output_dir.as_str());
            }

            let paths = dirs
                .iter()
                .filter(|d| !d.is_empty())
                .map(|d| format!("-I{d}"))
                .collect::<Vec<_>>()
                .join(" ");
            tracing::debug!("Include paths are '{paths}'");
            paths
        })
    }

    /// The optimization switch for the configured level, `-Og` if unrecognized.
    pub fn optimization(&self) -> &'static str {
        let level = self.config.optimization.to_ascii_lowercase();

        match OPTIMIZATION_LEVELS.iter().find(|(name, _)| *name == level) {
            Some((name, switch)) => {
                tracing::debug!("Setting optimization level to '{name}' ({switch})");
                switch
            }
            None => {
                tracing::warn!("Optimization level '{level}' not recognized");
                tracing::debug!("Defaulting to debug optimization level");
                DEFAULT_OPTIMIZATION
            }
        }
    }

    fn platform_flags(&self) -> &'a str {
        let key = self.platform.flag_key();
        if let Some(flags) = self.config.flags.get(&key) {
            return flags;
        }

        tracing::warn!("Configuration for platform '{key}' was not found");
        tracing::info!("Applying only common (platform-independent) flags");
        ""
    }
}

/// Split `$package` tokens out of a flag string.
///
/// Returns the remaining flags and the package names in order of appearance.
pub fn extract_pkg_config(flags: &str) -> (String, Vec<String>) {
    let mut rest = Vec::new();
    let mut packages = Vec::new();

    for token in flags.split_whitespace() {
        match token.strip_prefix('$') {
            Some(package) if !package.is_empty() => packages.push(package.to_owned()),
            _ => rest.push(token),
        }
    }

    (rest.join(" "), packages)
}

/// Shell substitution asking pkg-config for the packages' compile and link flags.
pub fn pkg_config_clause(packages: &[String]) -> String {
    if packages.is_empty() {
        return String::new();
    }
    format!("`pkg-config --cflags --libs {}`", packages.join(" "))
}

fn join_flags(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
