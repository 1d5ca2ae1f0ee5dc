//! Local storage backend contract.
//!
//! The store is the durable state every node converges on. Mutations are
//! invoked exclusively by the log applier, one command at a time per
//! partition, so implementations never see concurrent writes for the same
//! entity. Reads are served directly to request handlers without
//! coordination, the applier being the sole writer.
//!
//! Mutation operations take their timestamps from the caller (the command
//! envelope's submission time), never from the local clock, so that every
//! node stores identical records.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use tabula_core::{
    ArtifactId, ArtifactType, CommentId, ContentHash, ContentId, GroupId, TenantId, VersionState,
};

pub use memory::MemoryStore;

/// The result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors produced by the local storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
        /// The identifier that was looked up.
        key: String,
    },

    /// The entity being created already exists.
    #[error("{entity} already exists: {key}")]
    AlreadyExists {
        /// The kind of entity that collided.
        entity: &'static str,
        /// The identifier that collided.
        key: String,
    },

    /// The operation's arguments were rejected.
    #[error("invalid operation: {message}")]
    Invalid {
        /// Description of the rejection.
        message: String,
    },

    /// The backend failed internally.
    #[error("storage internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// A stored artifact group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Group identifier, unique per tenant.
    pub group: GroupId,
    /// Optional human description.
    pub description: Option<String>,
    /// Free-form labels.
    pub labels: BTreeMap<String, String>,
    /// When the group was created (command submission time).
    pub created_at: DateTime<Utc>,
    /// When the group was last modified.
    pub modified_at: DateTime<Utc>,
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    /// Owning group.
    pub group: GroupId,
    /// Artifact identifier, unique within the group.
    pub artifact: ArtifactId,
    /// Declared content type; scopes canonicalization.
    pub artifact_type: ArtifactType,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional human description.
    pub description: Option<String>,
    /// Free-form labels.
    pub labels: BTreeMap<String, String>,
    /// When the artifact was created (command submission time).
    pub created_at: DateTime<Utc>,
    /// When the artifact metadata was last modified.
    pub modified_at: DateTime<Utc>,
}

/// A stored artifact version referencing a content entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    /// Owning group.
    pub group: GroupId,
    /// Owning artifact.
    pub artifact: ArtifactId,
    /// Version string, unique within the artifact.
    pub version: String,
    /// Monotonic position within the artifact (1-based).
    pub order: u32,
    /// The content entry this version references.
    pub content_id: ContentId,
    /// Lifecycle state.
    pub state: VersionState,
    /// When the version was created (command submission time).
    pub created_at: DateTime<Utc>,
}

/// A stored comment on an artifact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    /// Comment identifier.
    pub comment_id: CommentId,
    /// Owning group.
    pub group: GroupId,
    /// Owning artifact.
    pub artifact: ArtifactId,
    /// Owning version string.
    pub version: String,
    /// Comment body.
    pub value: String,
    /// When the comment was created (command submission time).
    pub created_at: DateTime<Utc>,
}

/// A stored content entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// Stable content identity returned to clients.
    pub content_id: ContentId,
    /// The artifact type the canonical hash is scoped to.
    pub artifact_type: ArtifactType,
    /// The exact registered bytes.
    pub content: Bytes,
    /// SHA-256 of the exact bytes.
    pub raw_hash: ContentHash,
    /// SHA-256 of the canonical form, when canonicalization succeeded.
    pub canonical_hash: Option<ContentHash>,
    /// When the entry was created (command submission time).
    pub created_at: DateTime<Utc>,
}

/// How a content registration resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDisposition {
    /// A new content entry was created.
    Created,
    /// The exact bytes were already registered.
    RawMatch,
    /// Byte-different content matched an existing entry's canonical hash;
    /// the new raw hash was recorded as an alias onto that entry.
    CanonicalMatch,
}

impl ContentDisposition {
    /// Stable label for logging and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::RawMatch => "raw_match",
            Self::CanonicalMatch => "canonical_match",
        }
    }
}

/// The outcome of a content registration.
///
/// `content_id` is authoritative: on a dedup hit it is the pre-existing
/// entry's id, not the id proposed in the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredContent {
    /// The surviving content identity.
    pub content_id: ContentId,
    /// How the registration resolved.
    pub disposition: ContentDisposition,
}

/// A version to create, before storage assigns its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    /// Explicit version string, or `None` to assign the next position number.
    pub version: Option<String>,
    /// The content entry the version references.
    ///
    /// Not validated against the content table: content registration flows
    /// through a different partition and may apply later on other nodes.
    pub content_id: ContentId,
}

/// A partial update to artifact metadata. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement label set.
    pub labels: Option<BTreeMap<String, String>>,
}

/// Durable storage operations, one per command kind, plus consumption
/// progress and the read-only query surface.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Creates a group.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the group exists.
    async fn create_group(&self, tenant: &TenantId, record: GroupRecord)
    -> StoreResult<GroupRecord>;

    /// Deletes a group and everything in it.
    ///
    /// Content entries are not deleted: they are tenant-scoped, not
    /// group-scoped, and may be referenced from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the group does not exist.
    async fn delete_group(&self, tenant: &TenantId, group: &GroupId) -> StoreResult<()>;

    /// Creates an artifact, optionally with its first version.
    ///
    /// The owning group is created implicitly when absent, stamped with the
    /// artifact's creation time.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the artifact exists.
    async fn create_artifact(
        &self,
        tenant: &TenantId,
        record: ArtifactRecord,
        first_version: Option<NewVersion>,
    ) -> StoreResult<(ArtifactRecord, Option<VersionRecord>)>;

    /// Deletes an artifact and its versions.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact does not exist.
    async fn delete_artifact(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<()>;

    /// Applies a metadata patch to an artifact.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact does not exist.
    async fn update_artifact_metadata(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        patch: MetadataPatch,
        modified_at: DateTime<Utc>,
    ) -> StoreResult<ArtifactRecord>;

    /// Creates a version of an existing artifact.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact does not exist, `AlreadyExists` if
    /// the explicit version string is taken.
    async fn create_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: NewVersion,
        created_at: DateTime<Utc>,
    ) -> StoreResult<VersionRecord>;

    /// Deletes a version and its comments.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the version does not exist.
    async fn delete_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> StoreResult<()>;

    /// Updates a version's lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the version does not exist.
    async fn update_version_state(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
        state: VersionState,
    ) -> StoreResult<VersionRecord>;

    /// Adds a comment to a version.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the version does not exist; `AlreadyExists` if
    /// the comment id is already present (duplicate command delivery).
    async fn create_comment(
        &self,
        tenant: &TenantId,
        record: CommentRecord,
    ) -> StoreResult<CommentRecord>;

    /// Deletes a comment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the comment does not exist.
    async fn delete_comment(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
        comment: &CommentId,
    ) -> StoreResult<()>;

    /// Registers content with the two-tier dedup check.
    ///
    /// Raw hash match wins first; otherwise a canonical hash match (scoped to
    /// the artifact type) records the raw hash as an alias onto the existing
    /// entry; otherwise the record is inserted as given.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on backend failure.
    async fn register_content(
        &self,
        tenant: &TenantId,
        record: ContentRecord,
    ) -> StoreResult<RegisteredContent>;

    /// Durably records the last applied offset for a partition.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on backend failure.
    async fn record_progress(&self, partition: u32, offset: u64) -> StoreResult<()>;

    /// Returns the last applied offset for a partition, if any.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on backend failure.
    async fn progress(&self, partition: u32) -> StoreResult<Option<u64>>;

    /// Fetches a group.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    async fn get_group(&self, tenant: &TenantId, group: &GroupId) -> StoreResult<GroupRecord>;

    /// Lists groups for a tenant, ordered by group id.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on backend failure.
    async fn list_groups(&self, tenant: &TenantId) -> StoreResult<Vec<GroupRecord>>;

    /// Fetches an artifact.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    async fn get_artifact(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<ArtifactRecord>;

    /// Lists artifacts in a group, ordered by artifact id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the group does not exist.
    async fn list_artifacts(
        &self,
        tenant: &TenantId,
        group: &GroupId,
    ) -> StoreResult<Vec<ArtifactRecord>>;

    /// Fetches a version.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    async fn get_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> StoreResult<VersionRecord>;

    /// Fetches the version with the highest position.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact has no versions.
    async fn latest_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<VersionRecord>;

    /// Lists versions of an artifact, ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact does not exist.
    async fn list_versions(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<Vec<VersionRecord>>;

    /// Lists comments on a version, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the version does not exist.
    async fn list_comments(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> StoreResult<Vec<CommentRecord>>;

    /// Fetches a content entry by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    async fn get_content(
        &self,
        tenant: &TenantId,
        content_id: ContentId,
    ) -> StoreResult<ContentRecord>;
}
