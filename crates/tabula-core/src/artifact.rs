//! Artifact naming vocabulary.
//!
//! Artifacts live inside groups and are versioned; every version references a
//! deduplicated content entry. The types here are the client-facing names:
//! they are validated on the way in and then treated as opaque keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = 256;

/// A client-chosen identifier for an artifact group.
///
/// Groups are the unit of namespacing below the tenant; reverse-DNS style
/// names (`com.example.orders`) are common but not required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Creates a new group ID after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty, longer than 256 characters, or
    /// contains characters outside `[A-Za-z0-9._-]`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_name("group ID", &id)?;
        Ok(Self(id))
    }

    /// The group that artifacts land in when the client does not name one.
    #[must_use]
    pub fn default_group() -> Self {
        Self("default".to_string())
    }

    /// Returns the group ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// A client-chosen identifier for an artifact within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Creates a new artifact ID after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty, longer than 256 characters, or
    /// contains characters outside `[A-Za-z0-9._-]`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_name("artifact ID", &id)?;
        Ok(Self(id))
    }

    /// Returns the artifact ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

fn validate_name(what: &'static str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidId {
            message: format!("{what} cannot be empty"),
        });
    }

    if id.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId {
            message: format!("{what} '{id}' is too long (maximum {MAX_NAME_LEN} characters)"),
        });
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(Error::InvalidId {
            message: format!(
                "{what} '{id}' contains invalid characters (only letters, digits, '.', '-', '_' allowed)"
            ),
        });
    }

    Ok(())
}

/// The declared type of an artifact's content.
///
/// Canonicalization is scoped by artifact type: the same bytes under two
/// different types are never considered equivalent. The set is open so that
/// deployments can register custom types alongside the builtin ones; values
/// are normalized to uppercase on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactType(String);

impl ArtifactType {
    /// Creates an artifact type after validating and uppercasing the name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, longer than 64 characters, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidId {
                message: "artifact type cannot be empty".to_string(),
            });
        }
        if name.len() > 64 {
            return Err(Error::InvalidId {
                message: format!("artifact type '{name}' is too long (maximum 64 characters)"),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidId {
                message: format!("artifact type '{name}' contains invalid characters"),
            });
        }
        Ok(Self(name.to_ascii_uppercase()))
    }

    /// Avro schemas.
    #[must_use]
    pub fn avro() -> Self {
        Self("AVRO".to_string())
    }

    /// Protobuf definitions.
    #[must_use]
    pub fn protobuf() -> Self {
        Self("PROTOBUF".to_string())
    }

    /// JSON Schema documents.
    #[must_use]
    pub fn json() -> Self {
        Self("JSON".to_string())
    }

    /// OpenAPI documents.
    #[must_use]
    pub fn openapi() -> Self {
        Self("OPENAPI".to_string())
    }

    /// Returns the type name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArtifactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Lifecycle state of an artifact version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    /// The version is active and served normally.
    #[default]
    Enabled,
    /// The version is served but flagged as deprecated.
    Deprecated,
    /// The version is hidden from normal lookups.
    Disabled,
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Deprecated => write!(f, "deprecated"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}
