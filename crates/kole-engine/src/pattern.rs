//! Exclude-pattern matching.
//!
//! Patterns are glob-like: `*` matches any run of characters (separators
//! included) and `/` or `\` match either path separator, so a pattern written
//! on one platform works on the other. Every pattern must match the whole
//! path.

use std::collections::HashMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};

/// Upper bound on the compiled size of a single pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Matches paths against exclude patterns, compiling each pattern once.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    /// Raw pattern text → compiled regex, or `None` if it failed to compile.
    compiled: HashMap<String, Option<Regex>>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` is matched by any of `patterns`.
    pub fn matches(&mut self, path: &Path, patterns: &[String]) -> bool {
        self.matches_str(&path.to_string_lossy(), patterns)
    }

    /// Whether the path string `path` is matched by any of `patterns`.
    pub fn matches_str(&mut self, path: &str, patterns: &[String]) -> bool {
        let normalized = normalize_path(path);

        for pattern in patterns {
            let Some(regex) = self.compiled(pattern) else {
                continue;
            };
            if regex.is_match(&normalized) {
                tracing::debug!("Excluding '{normalized}' due to pattern '{pattern}'");
                return true;
            }
        }

        false
    }

    /// Number of distinct patterns seen so far.
    pub fn cached_patterns(&self) -> usize {
        self.compiled.len()
    }

    fn compiled(&mut self, pattern: &str) -> Option<&Regex> {
        if !self.compiled.contains_key(pattern) {
            let regex = compile(pattern);
            self.compiled.insert(pattern.to_owned(), regex);
        }
        self.compiled.get(pattern).and_then(Option::as_ref)
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    let source = pattern_to_regex(pattern);
    match RegexBuilder::new(&source)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("Invalid exclude pattern '{pattern}': {e}");
            None
        }
    }
}

/// Translate a glob-like pattern into an anchored regular expression.
pub fn pattern_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 6);
    out.push_str("^(?:");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '/' | '\\' => out.push_str(r"[\\/]"),
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }
    out.push_str(")$");
    out
}

/// Forward-slash form of `path` without a leading `./`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_owned();
    }
    normalized
}
