//! Partition keys and the stable key-to-partition mapping.
//!
//! Commands that must be ordered relative to each other carry the same
//! partition key, and the mapping from key to partition index must be the
//! same on every node and every journal implementation. The mapping here is
//! the contract: SHA-256 of the key bytes, first 8 bytes as a big-endian
//! integer, modulo the partition count. It must never change for a journal
//! with retained history, or replay would reorder entities across partitions.

use sha2::{Digest, Sha256};
use std::fmt;

use tabula_core::{ContentHash, GroupId, TenantId};

use crate::error::{JournalError, Result};

/// An opaque routing key deciding which partition a record lands in.
///
/// Keys follow the convention `{tenant}/groups/{group}` for entity commands
/// and `{tenant}/content/{hash}` for content registration; the typed
/// constructors below are the only producers of those forms. The journal
/// itself only requires a key to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Creates a partition key from a raw string.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(JournalError::InvalidKey {
                message: "partition key cannot be empty".to_string(),
            });
        }
        Ok(Self(key))
    }

    /// The key ordering all commands that touch entities in one group.
    #[must_use]
    pub fn for_group(tenant: &TenantId, group: &GroupId) -> Self {
        Self(format!("{}/groups/{}", tenant.as_str(), group.as_str()))
    }

    /// The key ordering content registrations for one content identity.
    ///
    /// Callers pass the canonical hash when one exists, otherwise the raw
    /// hash, so that registrations of equivalent content share a partition.
    #[must_use]
    pub fn for_content(tenant: &TenantId, hash: &ContentHash) -> Self {
        Self(format!("{}/content/{hash}", tenant.as_str()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Maps this key to a partition index in `0..count`.
    ///
    /// Deterministic across nodes, processes, and journal implementations.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero; journals always have at least one partition.
    #[must_use]
    pub fn partition(&self, count: u32) -> u32 {
        assert!(count > 0, "journal must have at least one partition");
        let digest = Sha256::digest(self.0.as_bytes());
        let mut prefix = [0_u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let value = u64::from_be_bytes(prefix);
        u32::try_from(value % u64::from(count)).unwrap_or(0)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
