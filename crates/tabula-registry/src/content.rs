//! Node-local content hash index.
//!
//! Two lookup tiers, consulted in order:
//! 1. **Raw**: SHA-256 over the exact submitted bytes, across all types.
//! 2. **Canonical**: SHA-256 over the canonical form, scoped to the artifact
//!    type whose canonicalizer produced it.
//!
//! The index is fed exclusively by the log applier as `register_content`
//! commands apply, so every node's index converges with the journal. It backs
//! the submission fast path; the store's own two-tier check at apply time
//! remains authoritative.

use dashmap::DashMap;

use tabula_core::{ArtifactType, ContentHash, ContentId, TenantId};

/// In-memory hash-to-content-id index, per tenant.
#[derive(Debug, Default)]
pub struct ContentIndex {
    by_raw: DashMap<(TenantId, ContentHash), ContentId>,
    by_canonical: DashMap<(TenantId, ArtifactType, ContentHash), ContentId>,
}

impl ContentIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an applied content registration.
    ///
    /// `content_id` is the authoritative id from the applied outcome, which
    /// on a canonical match differs from the id proposed in the command. Both
    /// hashes therefore alias onto whichever entry the store settled on.
    pub fn observe(
        &self,
        tenant: &TenantId,
        artifact_type: &ArtifactType,
        raw_hash: ContentHash,
        canonical_hash: Option<ContentHash>,
        content_id: ContentId,
    ) {
        self.by_raw.insert((tenant.clone(), raw_hash), content_id);
        if let Some(canonical_hash) = canonical_hash {
            self.by_canonical.insert(
                (tenant.clone(), artifact_type.clone(), canonical_hash),
                content_id,
            );
        }
    }

    /// Looks up a content id by the hash of its exact bytes.
    #[must_use]
    pub fn lookup_raw(&self, tenant: &TenantId, raw_hash: &ContentHash) -> Option<ContentId> {
        self.by_raw
            .get(&(tenant.clone(), *raw_hash))
            .map(|entry| *entry.value())
    }

    /// Looks up a content id by canonical hash, scoped to an artifact type.
    #[must_use]
    pub fn lookup_canonical(
        &self,
        tenant: &TenantId,
        artifact_type: &ArtifactType,
        canonical_hash: &ContentHash,
    ) -> Option<ContentId> {
        self.by_canonical
            .get(&(tenant.clone(), artifact_type.clone(), *canonical_hash))
            .map(|entry| *entry.value())
    }
}
