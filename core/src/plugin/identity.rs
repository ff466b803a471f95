use std::sync::OnceLock;

use regex::Regex;

/// Validates and decomposes the four-part plug-in name
/// `{org}.plugin.{short-name}.{major}[.{minor}.{patch}]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginIdentity {
    raw: String,
    org: String,
    short_name: String,
    major: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("plugin identifier {0:?} does not match {{org}}.plugin.{{short-name}}.{{major}}[.{{minor}}.{{patch}}]")]
    MalformedName(String),

    #[error("plugin identifier {0:?} has a non-numeric major version component")]
    InvalidMajorVersion(String),
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([a-z0-9][a-z0-9\-]*)\.plugin\.([a-z0-9][a-z0-9\-]*)\.(\d+)(?:\.\d+\.\d+)?$")
            .expect("plugin identity pattern is a valid regex")
    })
}

impl PluginIdentity {
    /// Parse and validate a raw identifier string.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let captures = pattern()
            .captures(raw)
            .ok_or_else(|| IdentityError::MalformedName(raw.to_string()))?;

        let org = captures[1].to_string();
        let short_name = captures[2].to_string();
        let major: u32 = captures[3]
            .parse()
            .map_err(|_| IdentityError::InvalidMajorVersion(raw.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            org,
            short_name,
            major,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn major_version(&self) -> u32 {
        self.major
    }

    /// Two identities are compatible iff their major versions are equal,
    /// independent of org/short-name — used when resolving dependency
    /// declarations against loaded plug-ins.
    pub fn is_compatible_with(&self, other: &PluginIdentity) -> bool {
        self.major == other.major
    }
}

impl std::fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for PluginIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
