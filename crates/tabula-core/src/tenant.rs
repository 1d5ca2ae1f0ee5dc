//! Multi-tenant isolation primitives.
//!
//! Tenant isolation is enforced at multiple levels in Tabula:
//! - **Partitioning**: The tenant ID is the leading component of every journal
//!   partition key, so no two tenants ever share an ordering domain
//! - **Storage**: All storage operations are keyed by tenant first
//! - **Service boundaries**: Requests are scoped to a single tenant
//!
//! # Example
//!
//! ```rust
//! use tabula_core::tenant::TenantId;
//!
//! let tenant = TenantId::new("acme-corp").unwrap();
//! assert_eq!(tenant.as_str(), "acme-corp");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A unique identifier for a tenant.
///
/// Tenant IDs must be:
/// - Non-empty
/// - Lowercase alphanumeric with hyphens
/// - Between 3 and 63 characters (compatible with DNS naming)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant ID is invalid.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Creates a tenant ID without validation.
    ///
    /// The caller must ensure the ID is valid. This is intended for
    /// IDs that have already been validated (e.g., decoded from a journal
    /// record written by a validated submission path).
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the tenant ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a tenant ID string.
    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidId {
                message: "tenant ID cannot be empty".to_string(),
            });
        }

        if id.len() < 3 {
            return Err(Error::InvalidId {
                message: format!("tenant ID '{id}' is too short (minimum 3 characters)"),
            });
        }

        if id.len() > 63 {
            return Err(Error::InvalidId {
                message: format!("tenant ID '{id}' is too long (maximum 63 characters)"),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(Error::InvalidId {
                message: format!(
                    "tenant ID '{id}' contains invalid characters (only lowercase letters, digits, and hyphens allowed)"
                ),
            });
        }

        if id.starts_with('-') || id.ends_with('-') {
            return Err(Error::InvalidId {
                message: format!("tenant ID '{id}' cannot start or end with a hyphen"),
            });
        }

        Ok(())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
