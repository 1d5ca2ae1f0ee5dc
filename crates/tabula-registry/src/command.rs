//! Replicated command catalog.
//!
//! Every mutation travels through the shared journal as one of these commands,
//! wrapped in a [`CommandEnvelope`]. Appliers on every node decode and apply
//! records in per-partition order, so application must stay deterministic:
//! - Generated identifiers are chosen at submission time and carried inside
//!   the command.
//! - Stored timestamps come from the envelope's `submitted_at`, never from
//!   the applying node's clock.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tabula_core::{
    ArtifactId, ArtifactType, CommentId, ContentHash, ContentId, CorrelationId, GroupId, NodeId,
    TenantId, VersionState,
};
use tabula_journal::PartitionKey;

use crate::error::{ApplyOutcome, RegistryError};
use crate::store::{
    ArtifactRecord, CommentRecord, ContentRecord, GroupRecord, MetadataPatch, NewVersion,
    RegisteredContent, RegistryStore, VersionRecord,
};

/// Envelope schema version written and accepted by this build.
pub const COMMAND_SCHEMA_VERSION: u32 = 1;

/// Serde adapter that puts raw bytes on the wire as standard base64.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let decoded = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

/// First version attached to a `create_artifact` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialVersion {
    /// Explicit version string; `None` assigns the next position number.
    pub version: Option<String>,

    /// Content entry backing the version.
    pub content_id: ContentId,
}

/// Replicated registry mutations (commands carry IDs chosen at submission;
/// timestamps are stamped at apply time from the envelope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Create an empty group.
    CreateGroup {
        /// Group to create.
        group: GroupId,
        /// Optional human-readable description.
        description: Option<String>,
        /// Free-form labels.
        labels: BTreeMap<String, String>,
    },
    /// Delete a group and everything under it.
    DeleteGroup {
        /// Group to delete.
        group: GroupId,
    },
    /// Create an artifact, optionally with its first version.
    CreateArtifact {
        /// Owning group (created implicitly if absent).
        group: GroupId,
        /// Artifact to create.
        artifact: ArtifactId,
        /// Declared artifact type.
        artifact_type: ArtifactType,
        /// Optional display name.
        name: Option<String>,
        /// Optional human-readable description.
        description: Option<String>,
        /// Free-form labels.
        labels: BTreeMap<String, String>,
        /// First version to attach, when content was supplied.
        first_version: Option<InitialVersion>,
    },
    /// Delete an artifact and its versions.
    DeleteArtifact {
        /// Owning group.
        group: GroupId,
        /// Artifact to delete.
        artifact: ArtifactId,
    },
    /// Patch artifact metadata; absent fields stay untouched.
    UpdateArtifactMetadata {
        /// Owning group.
        group: GroupId,
        /// Artifact to patch.
        artifact: ArtifactId,
        /// New display name, if changing.
        name: Option<String>,
        /// New description, if changing.
        description: Option<String>,
        /// Full replacement label set, if changing.
        labels: Option<BTreeMap<String, String>>,
    },
    /// Append a version to an existing artifact.
    CreateVersion {
        /// Owning group.
        group: GroupId,
        /// Owning artifact.
        artifact: ArtifactId,
        /// Explicit version string; `None` assigns the next position number.
        version: Option<String>,
        /// Content entry backing the version.
        content_id: ContentId,
    },
    /// Delete a single version.
    DeleteVersion {
        /// Owning group.
        group: GroupId,
        /// Owning artifact.
        artifact: ArtifactId,
        /// Version to delete.
        version: String,
    },
    /// Transition a version's lifecycle state.
    UpdateVersionState {
        /// Owning group.
        group: GroupId,
        /// Owning artifact.
        artifact: ArtifactId,
        /// Version to transition.
        version: String,
        /// Target state.
        state: VersionState,
    },
    /// Attach a comment to a version.
    CreateComment {
        /// Owning group.
        group: GroupId,
        /// Owning artifact.
        artifact: ArtifactId,
        /// Version commented on.
        version: String,
        /// Comment id chosen at submission; doubles as the duplicate guard.
        comment_id: CommentId,
        /// Comment text.
        value: String,
    },
    /// Remove a comment from a version.
    DeleteComment {
        /// Owning group.
        group: GroupId,
        /// Owning artifact.
        artifact: ArtifactId,
        /// Version the comment hangs off.
        version: String,
        /// Comment to remove.
        comment_id: CommentId,
    },
    /// Register content bytes in the dedup index.
    RegisterContent {
        /// Proposed id; discarded when the store already holds these bytes.
        content_id: ContentId,
        /// Artifact type the canonical hash was computed under.
        artifact_type: ArtifactType,
        /// Raw content bytes exactly as submitted.
        #[serde(with = "base64_bytes")]
        content: Bytes,
        /// SHA-256 over the raw bytes.
        raw_hash: ContentHash,
        /// SHA-256 over the canonical form, when a canonicalizer was available.
        canonical_hash: Option<ContentHash>,
    },
}

impl Command {
    /// Wire discriminator, matching the serialized `kind` field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateGroup { .. } => "create_group",
            Self::DeleteGroup { .. } => "delete_group",
            Self::CreateArtifact { .. } => "create_artifact",
            Self::DeleteArtifact { .. } => "delete_artifact",
            Self::UpdateArtifactMetadata { .. } => "update_artifact_metadata",
            Self::CreateVersion { .. } => "create_version",
            Self::DeleteVersion { .. } => "delete_version",
            Self::UpdateVersionState { .. } => "update_version_state",
            Self::CreateComment { .. } => "create_comment",
            Self::DeleteComment { .. } => "delete_comment",
            Self::RegisterContent { .. } => "register_content",
        }
    }

    /// Journal partition key for this command.
    ///
    /// Group-scoped commands share a partition per `(tenant, group)` so that
    /// mutations of one artifact tree apply in submission order. Content
    /// registrations key on the canonical hash when one exists, which lands
    /// byte-different duplicates of the same schema on the same partition
    /// and lets the store resolve them sequentially.
    #[must_use]
    pub fn partition_key(&self, tenant: &TenantId) -> PartitionKey {
        match self {
            Self::RegisterContent {
                raw_hash,
                canonical_hash,
                ..
            } => PartitionKey::for_content(tenant, canonical_hash.as_ref().unwrap_or(raw_hash)),
            Self::CreateGroup { group, .. }
            | Self::DeleteGroup { group }
            | Self::CreateArtifact { group, .. }
            | Self::DeleteArtifact { group, .. }
            | Self::UpdateArtifactMetadata { group, .. }
            | Self::CreateVersion { group, .. }
            | Self::DeleteVersion { group, .. }
            | Self::UpdateVersionState { group, .. }
            | Self::CreateComment { group, .. }
            | Self::DeleteComment { group, .. } => PartitionKey::for_group(tenant, group),
        }
    }

    /// Applies this command against the store.
    ///
    /// Called by the log applier only; everything non-deterministic comes in
    /// through `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an [`crate::error::ApplyFailure`] describing why the command
    /// was rejected. Rejections are deterministic: every node applying the
    /// same journal prefix rejects the same commands.
    pub async fn apply(&self, store: &dyn RegistryStore, ctx: &ApplyContext<'_>) -> ApplyOutcome {
        match self {
            Self::CreateGroup {
                group,
                description,
                labels,
            } => {
                let record = GroupRecord {
                    group: group.clone(),
                    description: description.clone(),
                    labels: labels.clone(),
                    created_at: ctx.occurred_at,
                    modified_at: ctx.occurred_at,
                };
                let created = store.create_group(ctx.tenant, record).await?;
                Ok(CommandReturn::Group(created))
            }
            Self::DeleteGroup { group } => {
                store.delete_group(ctx.tenant, group).await?;
                Ok(CommandReturn::None)
            }
            Self::CreateArtifact {
                group,
                artifact,
                artifact_type,
                name,
                description,
                labels,
                first_version,
            } => {
                let record = ArtifactRecord {
                    group: group.clone(),
                    artifact: artifact.clone(),
                    artifact_type: artifact_type.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    labels: labels.clone(),
                    created_at: ctx.occurred_at,
                    modified_at: ctx.occurred_at,
                };
                let first = first_version.as_ref().map(|initial| NewVersion {
                    version: initial.version.clone(),
                    content_id: initial.content_id,
                });
                let (artifact, first_version) =
                    store.create_artifact(ctx.tenant, record, first).await?;
                Ok(CommandReturn::Artifact {
                    artifact,
                    first_version,
                })
            }
            Self::DeleteArtifact { group, artifact } => {
                store.delete_artifact(ctx.tenant, group, artifact).await?;
                Ok(CommandReturn::None)
            }
            Self::UpdateArtifactMetadata {
                group,
                artifact,
                name,
                description,
                labels,
            } => {
                let patch = MetadataPatch {
                    name: name.clone(),
                    description: description.clone(),
                    labels: labels.clone(),
                };
                let updated = store
                    .update_artifact_metadata(ctx.tenant, group, artifact, patch, ctx.occurred_at)
                    .await?;
                Ok(CommandReturn::Artifact {
                    artifact: updated,
                    first_version: None,
                })
            }
            Self::CreateVersion {
                group,
                artifact,
                version,
                content_id,
            } => {
                let new_version = NewVersion {
                    version: version.clone(),
                    content_id: *content_id,
                };
                let created = store
                    .create_version(ctx.tenant, group, artifact, new_version, ctx.occurred_at)
                    .await?;
                Ok(CommandReturn::Version(created))
            }
            Self::DeleteVersion {
                group,
                artifact,
                version,
            } => {
                store
                    .delete_version(ctx.tenant, group, artifact, version)
                    .await?;
                Ok(CommandReturn::None)
            }
            Self::UpdateVersionState {
                group,
                artifact,
                version,
                state,
            } => {
                let updated = store
                    .update_version_state(ctx.tenant, group, artifact, version, *state)
                    .await?;
                Ok(CommandReturn::Version(updated))
            }
            Self::CreateComment {
                group,
                artifact,
                version,
                comment_id,
                value,
            } => {
                let record = CommentRecord {
                    comment_id: *comment_id,
                    group: group.clone(),
                    artifact: artifact.clone(),
                    version: version.clone(),
                    value: value.clone(),
                    created_at: ctx.occurred_at,
                };
                let created = store.create_comment(ctx.tenant, record).await?;
                Ok(CommandReturn::Comment(created))
            }
            Self::DeleteComment {
                group,
                artifact,
                version,
                comment_id,
            } => {
                store
                    .delete_comment(ctx.tenant, group, artifact, version, comment_id)
                    .await?;
                Ok(CommandReturn::None)
            }
            Self::RegisterContent {
                content_id,
                artifact_type,
                content,
                raw_hash,
                canonical_hash,
            } => {
                let record = ContentRecord {
                    content_id: *content_id,
                    artifact_type: artifact_type.clone(),
                    content: content.clone(),
                    raw_hash: *raw_hash,
                    canonical_hash: *canonical_hash,
                    created_at: ctx.occurred_at,
                };
                let registered = store.register_content(ctx.tenant, record).await?;
                Ok(CommandReturn::Content(registered))
            }
        }
    }
}

/// Deterministic inputs an applier passes into [`Command::apply`].
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    /// Tenant the command operates on.
    pub tenant: &'a TenantId,

    /// Timestamp stamped onto created records. Taken from the envelope so
    /// every node stores identical values.
    pub occurred_at: DateTime<Utc>,
}

/// Result payload delivered back to the submitting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReturn {
    /// The command succeeded and produced no record worth returning.
    None,
    /// A created group.
    Group(GroupRecord),
    /// A created or updated artifact.
    Artifact {
        /// The artifact record after the command.
        artifact: ArtifactRecord,
        /// First version, when the command carried one.
        first_version: Option<VersionRecord>,
    },
    /// A created or updated version.
    Version(VersionRecord),
    /// A created comment.
    Comment(CommentRecord),
    /// Content registration outcome, carrying the authoritative id.
    Content(RegisteredContent),
}

/// Wire envelope for replicated commands.
///
/// The envelope carries everything an applier needs without consulting the
/// submitting node: tenant scope, the deterministic timestamp, and the
/// correlation id the origin is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Correlates the applied outcome back to the submitting node.
    pub correlation_id: CorrelationId,

    /// Envelope format version (gates decoding).
    pub schema_version: u32,

    /// Tenant the command operates on.
    pub tenant: TenantId,

    /// Node that submitted the command.
    pub origin: NodeId,

    /// Submission wall-clock time; applied records are stamped with it.
    pub submitted_at: DateTime<Utc>,

    /// The command to apply.
    pub command: Command,
}

impl CommandEnvelope {
    /// Builds an envelope with a fresh correlation id, stamped now.
    #[must_use]
    pub fn new(tenant: TenantId, origin: NodeId, command: Command) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            schema_version: COMMAND_SCHEMA_VERSION,
            tenant,
            origin,
            submitted_at: Utc::now(),
            command,
        }
    }

    /// Journal partition key for this envelope.
    #[must_use]
    pub fn partition_key(&self) -> PartitionKey {
        self.command.partition_key(&self.tenant)
    }

    /// Serializes the envelope for the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self) -> Result<Bytes, RegistryError> {
        let bytes = serde_json::to_vec(self).map_err(|e| {
            RegistryError::codec(format!("failed to serialize command envelope: {e}"))
        })?;
        Ok(Bytes::from(bytes))
    }

    /// Decodes an envelope from journal record bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an unsupported schema version.
    pub fn decode(bytes: &[u8]) -> Result<Self, RegistryError> {
        let envelope: Self = serde_json::from_slice(bytes).map_err(|e| {
            RegistryError::codec(format!("failed to deserialize command envelope: {e}"))
        })?;
        if envelope.schema_version != COMMAND_SCHEMA_VERSION {
            return Err(RegistryError::codec(format!(
                "unsupported command schema version {} (expected {COMMAND_SCHEMA_VERSION})",
                envelope.schema_version
            )));
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn group() -> GroupId {
        GroupId::new("com.example").unwrap()
    }

    fn artifact() -> ArtifactId {
        ArtifactId::new("orders-value").unwrap()
    }

    fn sample_commands() -> Vec<Command> {
        let content = Bytes::from_static(b"{\"type\": \"record\"}");
        vec![
            Command::CreateGroup {
                group: group(),
                description: Some("example group".to_string()),
                labels: BTreeMap::from([("team".to_string(), "data".to_string())]),
            },
            Command::DeleteGroup { group: group() },
            Command::CreateArtifact {
                group: group(),
                artifact: artifact(),
                artifact_type: ArtifactType::avro(),
                name: Some("Orders".to_string()),
                description: None,
                labels: BTreeMap::new(),
                first_version: Some(InitialVersion {
                    version: None,
                    content_id: ContentId::generate(),
                }),
            },
            Command::DeleteArtifact {
                group: group(),
                artifact: artifact(),
            },
            Command::UpdateArtifactMetadata {
                group: group(),
                artifact: artifact(),
                name: Some("Orders v2".to_string()),
                description: None,
                labels: None,
            },
            Command::CreateVersion {
                group: group(),
                artifact: artifact(),
                version: Some("2".to_string()),
                content_id: ContentId::generate(),
            },
            Command::DeleteVersion {
                group: group(),
                artifact: artifact(),
                version: "2".to_string(),
            },
            Command::UpdateVersionState {
                group: group(),
                artifact: artifact(),
                version: "1".to_string(),
                state: VersionState::Deprecated,
            },
            Command::CreateComment {
                group: group(),
                artifact: artifact(),
                version: "1".to_string(),
                comment_id: CommentId::generate(),
                value: "ship it".to_string(),
            },
            Command::DeleteComment {
                group: group(),
                artifact: artifact(),
                version: "1".to_string(),
                comment_id: CommentId::generate(),
            },
            Command::RegisterContent {
                content_id: ContentId::generate(),
                artifact_type: ArtifactType::avro(),
                content: content.clone(),
                raw_hash: ContentHash::of(&content),
                canonical_hash: Some(ContentHash::of(b"canonical")),
            },
        ]
    }

    #[test]
    fn envelope_roundtrip_preserves_every_kind() {
        for command in sample_commands() {
            let envelope = CommandEnvelope::new(tenant(), NodeId::generate(), command);
            let bytes = envelope.encode().unwrap();
            let decoded = CommandEnvelope::decode(&bytes).unwrap();
            assert_eq!(decoded, envelope, "kind {}", envelope.command.kind());
        }
    }

    #[test]
    fn kind_matches_wire_tag() {
        for command in sample_commands() {
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["kind"], command.kind());
        }
    }

    #[test]
    fn group_commands_share_a_partition_key() {
        let create = Command::CreateArtifact {
            group: group(),
            artifact: artifact(),
            artifact_type: ArtifactType::avro(),
            name: None,
            description: None,
            labels: BTreeMap::new(),
            first_version: None,
        };
        let delete = Command::DeleteVersion {
            group: group(),
            artifact: artifact(),
            version: "1".to_string(),
        };
        assert_eq!(create.partition_key(&tenant()), delete.partition_key(&tenant()));

        let elsewhere = Command::DeleteGroup {
            group: GroupId::new("org.other").unwrap(),
        };
        assert_ne!(
            create.partition_key(&tenant()),
            elsewhere.partition_key(&tenant())
        );
    }

    #[test]
    fn content_commands_key_on_canonical_hash_when_present() {
        let raw = ContentHash::of(b"raw");
        let canonical = ContentHash::of(b"canonical");

        let with_canonical = Command::RegisterContent {
            content_id: ContentId::generate(),
            artifact_type: ArtifactType::avro(),
            content: Bytes::from_static(b"raw"),
            raw_hash: raw,
            canonical_hash: Some(canonical),
        };
        assert_eq!(
            with_canonical.partition_key(&tenant()),
            PartitionKey::for_content(&tenant(), &canonical)
        );

        let without = Command::RegisterContent {
            content_id: ContentId::generate(),
            artifact_type: ArtifactType::avro(),
            content: Bytes::from_static(b"raw"),
            raw_hash: raw,
            canonical_hash: None,
        };
        assert_eq!(
            without.partition_key(&tenant()),
            PartitionKey::for_content(&tenant(), &raw)
        );
    }

    #[test]
    fn unsupported_schema_version_rejected() {
        let envelope = CommandEnvelope::new(
            tenant(),
            NodeId::generate(),
            Command::DeleteGroup { group: group() },
        );
        let mut value = serde_json::to_value(&envelope).unwrap();
        value["schema_version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&value).unwrap();

        let err = CommandEnvelope::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("schema version"));
    }

    #[tokio::test]
    async fn apply_stamps_records_with_envelope_time() {
        let store = MemoryStore::new();
        let occurred_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ctx = ApplyContext {
            tenant: &tenant(),
            occurred_at,
        };

        let command = Command::CreateGroup {
            group: group(),
            description: None,
            labels: BTreeMap::new(),
        };
        let outcome = command.apply(&store, &ctx).await.unwrap();

        match outcome {
            CommandReturn::Group(record) => {
                assert_eq!(record.created_at, occurred_at);
                assert_eq!(record.modified_at, occurred_at);
            }
            other => panic!("unexpected return: {other:?}"),
        }
        let stored = store.get_group(&tenant(), &group()).await.unwrap();
        assert_eq!(stored.created_at, occurred_at);
    }

    #[tokio::test]
    async fn apply_surfaces_store_rejections() {
        let store = MemoryStore::new();
        let ctx = ApplyContext {
            tenant: &tenant(),
            occurred_at: Utc::now(),
        };

        let command = Command::DeleteGroup { group: group() };
        let failure = command.apply(&store, &ctx).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
    }
}
