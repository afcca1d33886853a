//! Logical partitions of the paste key space.

use std::fmt;
use thiserror::Error;

const NAMESPACE_MAX_LEN: usize = 64;

/// First path segments owned by service routes.
pub const RESERVED_NAMESPACES: &[&str] = &["static", "healthz", "readyz"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("namespace `{name}` invalid: {reason}")]
pub struct InvalidNamespace {
    pub name: String,
    pub reason: &'static str,
}

/// A namespace groups pastes under one storage root.
///
/// The default namespace has no name and is reached through single-segment
/// URLs; named namespaces are the first path segment (`temp`, `md`, or any
/// custom name created lazily on first write).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Namespace {
    name: Option<String>,
}

impl Namespace {
    /// The unnamed namespace.
    pub fn root() -> Self {
        Self::default()
    }

    /// Validate and wrap a namespace name taken from a URL segment.
    ///
    /// Names are 1-64 characters of ASCII letters, digits, `_` and `-`,
    /// and may not start with `-` or `_`. Names in [`RESERVED_NAMESPACES`]
    /// are rejected.
    pub fn named(name: &str) -> Result<Self, InvalidNamespace> {
        let invalid = |reason| InvalidNamespace {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() || name.len() > NAMESPACE_MAX_LEN {
            return Err(invalid("must be between 1 and 64 characters"));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(invalid(
                "allowed characters are letters, digits, underscores and hyphens",
            ));
        }
        if name.starts_with('-') || name.starts_with('_') {
            return Err(invalid("must start with a letter or digit"));
        }
        if RESERVED_NAMESPACES.contains(&name) {
            return Err(invalid("reserved for a service route"));
        }

        Ok(Self {
            name: Some(name.to_string()),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this namespace carries the given configured name.
    pub fn is(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    /// Directory holding this namespace's pastes under the storage base path.
    pub fn dir_name(&self) -> String {
        format!("_{}", self.name.as_deref().unwrap_or(""))
    }

    /// URL path (without leading slash) at which `key` is served.
    pub fn url_path(&self, key: &str) -> String {
        match &self.name {
            Some(name) => format!("{}/{}", name, key),
            None => key.to_string(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or("/"))
    }
}
