use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use thiserror::Error;

/// Path component the OS places in front of the temporary prefix when it
/// reports resolved paths (FSEvents on macOS reports `/private/var/folders`).
pub const DEFAULT_ALIAS_PREFIX: &str = "/private";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const IDENTIFIER_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FixtureConfig {
    #[serde(default)]
    pub temporary_root: Option<PathBuf>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub alias_prefix: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

impl FixtureConfig {
    pub fn with_temporary_root(root: impl Into<PathBuf>) -> Self {
        Self {
            temporary_root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn temporary_root(&self) -> PathBuf {
        self.temporary_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Canonical prefix every guarded deletion target must carry.
    pub fn path_prefix(&self) -> String {
        match self.path_prefix.as_deref() {
            Some(prefix) => prefix.to_string(),
            None => self.temporary_root().to_string_lossy().into_owned(),
        }
    }

    pub fn alias_prefix(&self) -> &str {
        self.alias_prefix.as_deref().unwrap_or(DEFAULT_ALIAS_PREFIX)
    }

    /// `temporary_root [/ namespace] / identifier`
    pub fn managed_directory_path(&self, identifier: &Identifier) -> Result<PathBuf, FixtureError> {
        let mut path = self.temporary_root();
        if let Some(namespace) = self.namespace.as_deref() {
            path.push(Identifier::new(namespace)?.as_str());
        }
        path.push(identifier.as_str());
        Ok(path)
    }
}

/// Name of one test instance, safe to use as a single path component.
///
/// Distinct names always map to distinct identifiers: `::` separators become
/// `.` and every other character outside `[A-Za-z0-9_-]` is percent-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: &str) -> Result<Self, FixtureError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FixtureError::InvalidIdentifier {
                value: raw.to_string(),
                reason: "it is empty",
            });
        }
        Ok(Self(sanitize_identifier(trimmed)))
    }

    /// Identifier for the test running on this thread. libtest names each
    /// test thread after the test's full path (`manager::tests::set_up`).
    pub fn for_current_thread() -> Result<Self, FixtureError> {
        let thread = std::thread::current();
        match thread.name() {
            Some("main") | None => Err(FixtureError::InvalidIdentifier {
                value: thread.name().unwrap_or_default().to_string(),
                reason: "the current thread is not a named test thread",
            }),
            Some(name) => Self::new(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_identifier(value: &str) -> String {
    let segments: Vec<&str> = value.split("::").collect();
    // An empty segment would leave a bare `.` or `..` behind.
    if segments.iter().any(|segment| segment.is_empty()) {
        return utf8_percent_encode(value, IDENTIFIER_ESCAPES).to_string();
    }
    segments
        .iter()
        .map(|segment| utf8_percent_encode(segment, IDENTIFIER_ESCAPES).to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("attempted to delete {path}, which is not inside {root}")]
    Containment { path: PathBuf, root: PathBuf },
    #[error("url `{url}` does not name a local file")]
    InvalidUrl { url: String },
    #[error("invalid identifier `{value}`: {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },
    #[error("unable to prepare temporary directory {path}: {reason}")]
    Setup {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<FixtureError>>,
    },
    #[error("unable to {action} {path}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FixtureError {
    pub fn filesystem(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Misuse by the calling test, as opposed to a failure of the environment.
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            Self::Containment { .. } | Self::InvalidUrl { .. } | Self::InvalidIdentifier { .. }
        )
    }
}

/// Rewrites an alias-prefixed path (`/private/var/folders/..`) to the
/// canonical prefix (`/var/folders/..`). Anything else is returned as is.
pub fn resolve(path: &str, canonical_prefix: &str, alias_prefix: &str) -> String {
    if alias_prefix.is_empty() {
        return path.to_string();
    }
    let aliased = format!("{}{}", alias_prefix.trim_end_matches('/'), canonical_prefix);
    match path.strip_prefix(aliased.as_str()) {
        Some(rest) => format!("{canonical_prefix}{rest}"),
        None => path.to_string(),
    }
}

pub fn has_path_prefix(path: &Path, prefix: &str) -> bool {
    !prefix.is_empty() && path.to_string_lossy().starts_with(prefix)
}

/// True when `path` carries `prefix` and names something below it, never
/// the prefix directory itself.
pub fn is_strictly_below_prefix(path: &Path, prefix: &str) -> bool {
    let path = path.to_string_lossy();
    !prefix.is_empty()
        && path.starts_with(prefix)
        && path.trim_end_matches(MAIN_SEPARATOR) != prefix.trim_end_matches(MAIN_SEPARATOR)
}

/// `path` is `dir` itself or lies under it on a component boundary.
pub fn is_within_directory(path: &Path, dir: &Path) -> bool {
    let path = path.to_string_lossy();
    let dir = dir.to_string_lossy();
    let dir = dir.trim_end_matches(MAIN_SEPARATOR);
    if dir.is_empty() {
        return false;
    }
    match path.strip_prefix(dir) {
        Some("") => true,
        Some(rest) => rest.starts_with(MAIN_SEPARATOR),
        None => false,
    }
}

pub fn has_parent_traversal(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::ParentDir))
}
