//! In-memory storage backend for tests and local development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence
//! - **Single-process only**: State is not visible across process boundaries
//!
//! Mutation ordering is supplied by the log applier; the lock here only
//! protects against torn reads from concurrent query traffic.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tabula_core::{
    ArtifactId, ArtifactType, CommentId, ContentHash, ContentId, GroupId, TenantId, VersionState,
};

use super::{
    ArtifactRecord, CommentRecord, ContentDisposition, ContentRecord, GroupRecord, MetadataPatch,
    NewVersion, RegisteredContent, RegistryStore, StoreError, StoreResult, VersionRecord,
};

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::internal("store lock poisoned")
}

#[derive(Debug, Default)]
struct TenantState {
    groups: HashMap<GroupId, GroupRecord>,
    artifacts: HashMap<(GroupId, ArtifactId), ArtifactRecord>,
    versions: HashMap<(GroupId, ArtifactId), Vec<VersionRecord>>,
    comments: HashMap<(GroupId, ArtifactId, String), Vec<CommentRecord>>,
    contents: HashMap<ContentId, ContentRecord>,
    by_raw_hash: HashMap<ContentHash, ContentId>,
    by_canonical_hash: HashMap<(ArtifactType, ContentHash), ContentId>,
}

impl TenantState {
    fn artifact_key(group: &GroupId, artifact: &ArtifactId) -> (GroupId, ArtifactId) {
        (group.clone(), artifact.clone())
    }

    fn require_artifact(
        &self,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<&ArtifactRecord> {
        self.artifacts
            .get(&Self::artifact_key(group, artifact))
            .ok_or_else(|| StoreError::not_found("artifact", format!("{group}/{artifact}")))
    }

    fn require_version(
        &self,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> StoreResult<&VersionRecord> {
        self.versions
            .get(&Self::artifact_key(group, artifact))
            .and_then(|versions| versions.iter().find(|v| v.version == version))
            .ok_or_else(|| {
                StoreError::not_found("version", format!("{group}/{artifact}/{version}"))
            })
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tenants: HashMap<TenantId, TenantState>,
    progress: HashMap<u32, u64>,
}

impl StoreState {
    fn tenant(&mut self, tenant: &TenantId) -> &mut TenantState {
        self.tenants.entry(tenant.clone()).or_default()
    }

    fn tenant_ref(&self, tenant: &TenantId) -> Option<&TenantState> {
        self.tenants.get(tenant)
    }
}

/// In-memory registry store.
///
/// ## Example
///
/// ```rust
/// use tabula_registry::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// // Apply commands against it in tests...
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn create_group(
        &self,
        tenant: &TenantId,
        record: GroupRecord,
    ) -> StoreResult<GroupRecord> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        if tenant_state.groups.contains_key(&record.group) {
            return Err(StoreError::already_exists("group", &record.group));
        }
        tenant_state
            .groups
            .insert(record.group.clone(), record.clone());
        Ok(record)
    }

    async fn delete_group(&self, tenant: &TenantId, group: &GroupId) -> StoreResult<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        if tenant_state.groups.remove(group).is_none() {
            return Err(StoreError::not_found("group", group));
        }
        tenant_state.artifacts.retain(|(g, _), _| g != group);
        tenant_state.versions.retain(|(g, _), _| g != group);
        tenant_state.comments.retain(|(g, _, _), _| g != group);
        Ok(())
    }

    async fn create_artifact(
        &self,
        tenant: &TenantId,
        record: ArtifactRecord,
        first_version: Option<NewVersion>,
    ) -> StoreResult<(ArtifactRecord, Option<VersionRecord>)> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);

        let key = TenantState::artifact_key(&record.group, &record.artifact);
        if tenant_state.artifacts.contains_key(&key) {
            return Err(StoreError::already_exists(
                "artifact",
                format!("{}/{}", record.group, record.artifact),
            ));
        }

        // Implicit group creation keeps first-touch registration cheap.
        tenant_state
            .groups
            .entry(record.group.clone())
            .or_insert_with(|| GroupRecord {
                group: record.group.clone(),
                description: None,
                labels: std::collections::BTreeMap::new(),
                created_at: record.created_at,
                modified_at: record.created_at,
            });

        let version = first_version.map(|new_version| VersionRecord {
            group: record.group.clone(),
            artifact: record.artifact.clone(),
            version: new_version.version.unwrap_or_else(|| "1".to_string()),
            order: 1,
            content_id: new_version.content_id,
            state: VersionState::Enabled,
            created_at: record.created_at,
        });

        tenant_state.artifacts.insert(key.clone(), record.clone());
        if let Some(ref version) = version {
            tenant_state.versions.insert(key, vec![version.clone()]);
        }

        Ok((record, version))
    }

    async fn delete_artifact(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        let key = TenantState::artifact_key(group, artifact);
        if tenant_state.artifacts.remove(&key).is_none() {
            return Err(StoreError::not_found(
                "artifact",
                format!("{group}/{artifact}"),
            ));
        }
        tenant_state.versions.remove(&key);
        tenant_state
            .comments
            .retain(|(g, a, _), _| !(g == group && a == artifact));
        Ok(())
    }

    async fn update_artifact_metadata(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        patch: MetadataPatch,
        modified_at: DateTime<Utc>,
    ) -> StoreResult<ArtifactRecord> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        let record = tenant_state
            .artifacts
            .get_mut(&TenantState::artifact_key(group, artifact))
            .ok_or_else(|| StoreError::not_found("artifact", format!("{group}/{artifact}")))?;

        if let Some(name) = patch.name {
            record.name = Some(name);
        }
        if let Some(description) = patch.description {
            record.description = Some(description);
        }
        if let Some(labels) = patch.labels {
            record.labels = labels;
        }
        record.modified_at = modified_at;
        Ok(record.clone())
    }

    async fn create_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: NewVersion,
        created_at: DateTime<Utc>,
    ) -> StoreResult<VersionRecord> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        tenant_state.require_artifact(group, artifact)?;

        let key = TenantState::artifact_key(group, artifact);
        let versions = tenant_state.versions.entry(key).or_default();

        // max+1 rather than len+1: after deleting a middle version, len+1
        // would collide with a surviving number.
        let order = versions.iter().map(|v| v.order).max().unwrap_or(0) + 1;
        let version_string = version.version.unwrap_or_else(|| order.to_string());
        if versions.iter().any(|v| v.version == version_string) {
            return Err(StoreError::already_exists(
                "version",
                format!("{group}/{artifact}/{version_string}"),
            ));
        }

        let record = VersionRecord {
            group: group.clone(),
            artifact: artifact.clone(),
            version: version_string,
            order,
            content_id: version.content_id,
            state: VersionState::Enabled,
            created_at,
        };
        versions.push(record.clone());
        Ok(record)
    }

    async fn delete_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        let versions = tenant_state
            .versions
            .get_mut(&TenantState::artifact_key(group, artifact))
            .ok_or_else(|| {
                StoreError::not_found("version", format!("{group}/{artifact}/{version}"))
            })?;

        let before = versions.len();
        versions.retain(|v| v.version != version);
        if versions.len() == before {
            return Err(StoreError::not_found(
                "version",
                format!("{group}/{artifact}/{version}"),
            ));
        }
        tenant_state
            .comments
            .remove(&(group.clone(), artifact.clone(), version.to_string()));
        Ok(())
    }

    async fn update_version_state(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
        state_value: VersionState,
    ) -> StoreResult<VersionRecord> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        let record = tenant_state
            .versions
            .get_mut(&TenantState::artifact_key(group, artifact))
            .and_then(|versions| versions.iter_mut().find(|v| v.version == version))
            .ok_or_else(|| {
                StoreError::not_found("version", format!("{group}/{artifact}/{version}"))
            })?;
        record.state = state_value;
        Ok(record.clone())
    }

    async fn create_comment(
        &self,
        tenant: &TenantId,
        record: CommentRecord,
    ) -> StoreResult<CommentRecord> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        tenant_state.require_version(&record.group, &record.artifact, &record.version)?;

        let key = (
            record.group.clone(),
            record.artifact.clone(),
            record.version.clone(),
        );
        let comments = tenant_state.comments.entry(key).or_default();
        if comments.iter().any(|c| c.comment_id == record.comment_id) {
            return Err(StoreError::already_exists("comment", record.comment_id));
        }
        comments.push(record.clone());
        Ok(record)
    }

    async fn delete_comment(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
        comment: &CommentId,
    ) -> StoreResult<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);
        let comments = tenant_state
            .comments
            .get_mut(&(group.clone(), artifact.clone(), version.to_string()))
            .ok_or_else(|| StoreError::not_found("comment", comment))?;

        let before = comments.len();
        comments.retain(|c| &c.comment_id != comment);
        if comments.len() == before {
            return Err(StoreError::not_found("comment", comment));
        }
        Ok(())
    }

    async fn register_content(
        &self,
        tenant: &TenantId,
        record: ContentRecord,
    ) -> StoreResult<RegisteredContent> {
        let mut state = self.state.write().map_err(poison_err)?;
        let tenant_state = state.tenant(tenant);

        if let Some(existing) = tenant_state.by_raw_hash.get(&record.raw_hash) {
            return Ok(RegisteredContent {
                content_id: *existing,
                disposition: ContentDisposition::RawMatch,
            });
        }

        if let Some(canonical_hash) = record.canonical_hash {
            let key = (record.artifact_type.clone(), canonical_hash);
            if let Some(existing) = tenant_state.by_canonical_hash.get(&key).copied() {
                // Byte-different duplicate: alias the new raw hash onto the
                // existing entry instead of creating a second one.
                tenant_state.by_raw_hash.insert(record.raw_hash, existing);
                return Ok(RegisteredContent {
                    content_id: existing,
                    disposition: ContentDisposition::CanonicalMatch,
                });
            }
        }

        let content_id = record.content_id;
        tenant_state.by_raw_hash.insert(record.raw_hash, content_id);
        if let Some(canonical_hash) = record.canonical_hash {
            tenant_state
                .by_canonical_hash
                .insert((record.artifact_type.clone(), canonical_hash), content_id);
        }
        tenant_state.contents.insert(content_id, record);

        Ok(RegisteredContent {
            content_id,
            disposition: ContentDisposition::Created,
        })
    }

    async fn record_progress(&self, partition: u32, offset: u64) -> StoreResult<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.progress.insert(partition, offset);
        Ok(())
    }

    async fn progress(&self, partition: u32) -> StoreResult<Option<u64>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.progress.get(&partition).copied())
    }

    async fn get_group(&self, tenant: &TenantId, group: &GroupId) -> StoreResult<GroupRecord> {
        let state = self.state.read().map_err(poison_err)?;
        state
            .tenant_ref(tenant)
            .and_then(|t| t.groups.get(group))
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", group))
    }

    async fn list_groups(&self, tenant: &TenantId) -> StoreResult<Vec<GroupRecord>> {
        let state = self.state.read().map_err(poison_err)?;
        let mut groups: Vec<GroupRecord> = state
            .tenant_ref(tenant)
            .map(|t| t.groups.values().cloned().collect())
            .unwrap_or_default();
        groups.sort_by(|a, b| a.group.cmp(&b.group));
        Ok(groups)
    }

    async fn get_artifact(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<ArtifactRecord> {
        let state = self.state.read().map_err(poison_err)?;
        state
            .tenant_ref(tenant)
            .and_then(|t| t.artifacts.get(&TenantState::artifact_key(group, artifact)))
            .cloned()
            .ok_or_else(|| StoreError::not_found("artifact", format!("{group}/{artifact}")))
    }

    async fn list_artifacts(
        &self,
        tenant: &TenantId,
        group: &GroupId,
    ) -> StoreResult<Vec<ArtifactRecord>> {
        let state = self.state.read().map_err(poison_err)?;
        let tenant_state = state
            .tenant_ref(tenant)
            .filter(|t| t.groups.contains_key(group))
            .ok_or_else(|| StoreError::not_found("group", group))?;
        let mut artifacts: Vec<ArtifactRecord> = tenant_state
            .artifacts
            .values()
            .filter(|a| &a.group == group)
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| a.artifact.cmp(&b.artifact));
        Ok(artifacts)
    }

    async fn get_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> StoreResult<VersionRecord> {
        let state = self.state.read().map_err(poison_err)?;
        state
            .tenant_ref(tenant)
            .ok_or_else(|| StoreError::not_found("version", format!("{group}/{artifact}/{version}")))?
            .require_version(group, artifact, version)
            .cloned()
    }

    async fn latest_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<VersionRecord> {
        let state = self.state.read().map_err(poison_err)?;
        state
            .tenant_ref(tenant)
            .and_then(|t| t.versions.get(&TenantState::artifact_key(group, artifact)))
            .and_then(|versions| versions.iter().max_by_key(|v| v.order))
            .cloned()
            .ok_or_else(|| StoreError::not_found("version", format!("{group}/{artifact}")))
    }

    async fn list_versions(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> StoreResult<Vec<VersionRecord>> {
        let state = self.state.read().map_err(poison_err)?;
        let tenant_state = state
            .tenant_ref(tenant)
            .ok_or_else(|| StoreError::not_found("artifact", format!("{group}/{artifact}")))?;
        tenant_state.require_artifact(group, artifact)?;
        let mut versions = tenant_state
            .versions
            .get(&TenantState::artifact_key(group, artifact))
            .cloned()
            .unwrap_or_default();
        versions.sort_by_key(|v| v.order);
        Ok(versions)
    }

    async fn list_comments(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> StoreResult<Vec<CommentRecord>> {
        let state = self.state.read().map_err(poison_err)?;
        let tenant_state = state
            .tenant_ref(tenant)
            .ok_or_else(|| StoreError::not_found("version", format!("{group}/{artifact}/{version}")))?;
        tenant_state.require_version(group, artifact, version)?;
        Ok(tenant_state
            .comments
            .get(&(group.clone(), artifact.clone(), version.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_content(
        &self,
        tenant: &TenantId,
        content_id: ContentId,
    ) -> StoreResult<ContentRecord> {
        let state = self.state.read().map_err(poison_err)?;
        state
            .tenant_ref(tenant)
            .and_then(|t| t.contents.get(&content_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("content", content_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::BTreeMap;

    fn tenant() -> TenantId {
        TenantId::new("test-tenant").unwrap()
    }

    fn group_record(name: &str) -> GroupRecord {
        GroupRecord {
            group: GroupId::new(name).unwrap(),
            description: None,
            labels: BTreeMap::new(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    fn artifact_record(group: &str, artifact: &str) -> ArtifactRecord {
        ArtifactRecord {
            group: GroupId::new(group).unwrap(),
            artifact: ArtifactId::new(artifact).unwrap(),
            artifact_type: ArtifactType::avro(),
            name: None,
            description: None,
            labels: BTreeMap::new(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    fn content_record(bytes: &[u8], canonical: Option<&[u8]>) -> ContentRecord {
        ContentRecord {
            content_id: ContentId::generate(),
            artifact_type: ArtifactType::avro(),
            content: Bytes::copy_from_slice(bytes),
            raw_hash: ContentHash::of(bytes),
            canonical_hash: canonical.map(ContentHash::of),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_and_get_group() {
        let store = MemoryStore::new();
        let record = group_record("com.example");
        store.create_group(&tenant(), record.clone()).await.unwrap();

        let fetched = store.get_group(&tenant(), &record.group).await.unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn duplicate_group_rejected() {
        let store = MemoryStore::new();
        store
            .create_group(&tenant(), group_record("com.example"))
            .await
            .unwrap();
        let err = store
            .create_group(&tenant(), group_record("com.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { entity: "group", .. }));
    }

    #[tokio::test]
    async fn create_artifact_implicitly_creates_group() {
        let store = MemoryStore::new();
        let record = artifact_record("implicit", "orders");
        let first = NewVersion {
            version: None,
            content_id: ContentId::generate(),
        };

        let (artifact, version) = store
            .create_artifact(&tenant(), record.clone(), Some(first))
            .await
            .unwrap();
        assert_eq!(artifact.artifact, record.artifact);

        let version = version.expect("first version should be created");
        assert_eq!(version.version, "1");
        assert_eq!(version.order, 1);
        assert_eq!(version.state, VersionState::Enabled);

        let group = store.get_group(&tenant(), &record.group).await.unwrap();
        assert_eq!(group.created_at, record.created_at);
    }

    #[tokio::test]
    async fn version_auto_numbering_skips_deleted_positions() {
        let store = MemoryStore::new();
        let record = artifact_record("g", "a");
        let group = record.group.clone();
        let artifact = record.artifact.clone();
        store
            .create_artifact(&tenant(), record, None)
            .await
            .unwrap();

        for expected in ["1", "2", "3"] {
            let version = store
                .create_version(
                    &tenant(),
                    &group,
                    &artifact,
                    NewVersion {
                        version: None,
                        content_id: ContentId::generate(),
                    },
                    Utc::now(),
                )
                .await
                .unwrap();
            assert_eq!(version.version, expected);
        }

        store
            .delete_version(&tenant(), &group, &artifact, "2")
            .await
            .unwrap();
        let next = store
            .create_version(
                &tenant(),
                &group,
                &artifact,
                NewVersion {
                    version: None,
                    content_id: ContentId::generate(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        // Position 2 stays vacant; numbering continues past the highest survivor.
        assert_eq!(next.order, 4);
        assert_eq!(next.version, "4");
    }

    #[tokio::test]
    async fn explicit_version_conflict_rejected() {
        let store = MemoryStore::new();
        let record = artifact_record("g", "a");
        let group = record.group.clone();
        let artifact = record.artifact.clone();
        store
            .create_artifact(&tenant(), record, None)
            .await
            .unwrap();

        let new_version = |v: &str| NewVersion {
            version: Some(v.to_string()),
            content_id: ContentId::generate(),
        };
        store
            .create_version(&tenant(), &group, &artifact, new_version("v1"), Utc::now())
            .await
            .unwrap();
        let err = store
            .create_version(&tenant(), &group, &artifact, new_version("v1"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { entity: "version", .. }));
    }

    #[tokio::test]
    async fn delete_group_cascades() {
        let store = MemoryStore::new();
        let record = artifact_record("doomed", "a");
        let group = record.group.clone();
        let artifact = record.artifact.clone();
        store
            .create_artifact(
                &tenant(),
                record,
                Some(NewVersion {
                    version: None,
                    content_id: ContentId::generate(),
                }),
            )
            .await
            .unwrap();

        store.delete_group(&tenant(), &group).await.unwrap();

        assert!(store.get_group(&tenant(), &group).await.is_err());
        assert!(store.get_artifact(&tenant(), &group, &artifact).await.is_err());
        assert!(store.latest_version(&tenant(), &group, &artifact).await.is_err());
    }

    #[tokio::test]
    async fn metadata_patch_leaves_unset_fields() {
        let store = MemoryStore::new();
        let mut record = artifact_record("g", "a");
        record.name = Some("original".to_string());
        record.description = Some("described".to_string());
        let group = record.group.clone();
        let artifact = record.artifact.clone();
        store
            .create_artifact(&tenant(), record, None)
            .await
            .unwrap();

        let modified_at = Utc::now();
        let patch = MetadataPatch {
            name: Some("renamed".to_string()),
            description: None,
            labels: None,
        };
        let updated = store
            .update_artifact_metadata(&tenant(), &group, &artifact, patch, modified_at)
            .await
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("renamed"));
        assert_eq!(updated.description.as_deref(), Some("described"));
        assert_eq!(updated.modified_at, modified_at);
    }

    #[tokio::test]
    async fn version_state_update() {
        let store = MemoryStore::new();
        let record = artifact_record("g", "a");
        let group = record.group.clone();
        let artifact = record.artifact.clone();
        store
            .create_artifact(
                &tenant(),
                record,
                Some(NewVersion {
                    version: None,
                    content_id: ContentId::generate(),
                }),
            )
            .await
            .unwrap();

        let updated = store
            .update_version_state(&tenant(), &group, &artifact, "1", VersionState::Deprecated)
            .await
            .unwrap();
        assert_eq!(updated.state, VersionState::Deprecated);

        let fetched = store.get_version(&tenant(), &group, &artifact, "1").await.unwrap();
        assert_eq!(fetched.state, VersionState::Deprecated);
    }

    #[tokio::test]
    async fn comments_roundtrip_and_duplicate_rejected() {
        let store = MemoryStore::new();
        let record = artifact_record("g", "a");
        let group = record.group.clone();
        let artifact = record.artifact.clone();
        store
            .create_artifact(
                &tenant(),
                record,
                Some(NewVersion {
                    version: None,
                    content_id: ContentId::generate(),
                }),
            )
            .await
            .unwrap();

        let comment = CommentRecord {
            comment_id: CommentId::generate(),
            group: group.clone(),
            artifact: artifact.clone(),
            version: "1".to_string(),
            value: "looks good".to_string(),
            created_at: Utc::now(),
        };
        store.create_comment(&tenant(), comment.clone()).await.unwrap();

        // Re-applying the same command (duplicate delivery) is rejected, not doubled.
        let err = store.create_comment(&tenant(), comment.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { entity: "comment", .. }));

        let comments = store
            .list_comments(&tenant(), &group, &artifact, "1")
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);

        store
            .delete_comment(&tenant(), &group, &artifact, "1", &comment.comment_id)
            .await
            .unwrap();
        assert!(store
            .list_comments(&tenant(), &group, &artifact, "1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn register_content_dispositions() {
        let store = MemoryStore::new();

        let original = content_record(b"{\"a\": 1}", Some(b"canonical"));
        let created = store.register_content(&tenant(), original.clone()).await.unwrap();
        assert_eq!(created.disposition, ContentDisposition::Created);
        assert_eq!(created.content_id, original.content_id);

        // Same bytes again: raw fast path, proposed id discarded.
        let replay = content_record(b"{\"a\": 1}", Some(b"canonical"));
        let raw_match = store.register_content(&tenant(), replay).await.unwrap();
        assert_eq!(raw_match.disposition, ContentDisposition::RawMatch);
        assert_eq!(raw_match.content_id, original.content_id);

        // Different bytes, same canonical form: aliased onto the original.
        let variant = content_record(b"{ \"a\" : 1 }", Some(b"canonical"));
        let variant_raw = variant.raw_hash;
        let canonical_match = store.register_content(&tenant(), variant).await.unwrap();
        assert_eq!(canonical_match.disposition, ContentDisposition::CanonicalMatch);
        assert_eq!(canonical_match.content_id, original.content_id);

        // The alias makes the variant's bytes a raw match from now on.
        let again = ContentRecord {
            raw_hash: variant_raw,
            ..content_record(b"{ \"a\" : 1 }", Some(b"canonical"))
        };
        let second = store.register_content(&tenant(), again).await.unwrap();
        assert_eq!(second.disposition, ContentDisposition::RawMatch);
        assert_eq!(second.content_id, original.content_id);

        // Only one entry exists.
        let entry = store.get_content(&tenant(), original.content_id).await.unwrap();
        assert_eq!(entry.raw_hash, original.raw_hash);
    }

    #[tokio::test]
    async fn canonical_match_is_type_scoped() {
        let store = MemoryStore::new();

        let avro = content_record(b"schema-a", Some(b"same-canonical"));
        store.register_content(&tenant(), avro.clone()).await.unwrap();

        let mut protobuf = content_record(b"schema-b", Some(b"same-canonical"));
        protobuf.artifact_type = ArtifactType::protobuf();
        let result = store.register_content(&tenant(), protobuf.clone()).await.unwrap();

        // Same canonical hash under a different type is not a match.
        assert_eq!(result.disposition, ContentDisposition::Created);
        assert_eq!(result.content_id, protobuf.content_id);
    }

    #[tokio::test]
    async fn content_without_canonical_hash_dedups_raw_only() {
        let store = MemoryStore::new();

        let first = content_record(b"opaque-bytes", None);
        store.register_content(&tenant(), first.clone()).await.unwrap();

        let exact = content_record(b"opaque-bytes", None);
        let raw_match = store.register_content(&tenant(), exact).await.unwrap();
        assert_eq!(raw_match.disposition, ContentDisposition::RawMatch);
        assert_eq!(raw_match.content_id, first.content_id);

        let different = content_record(b"opaque-bytes-2", None);
        let created = store.register_content(&tenant(), different.clone()).await.unwrap();
        assert_eq!(created.disposition, ContentDisposition::Created);
        assert_eq!(created.content_id, different.content_id);
    }

    #[tokio::test]
    async fn progress_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.progress(0).await.unwrap(), None);

        store.record_progress(0, 41).await.unwrap();
        store.record_progress(0, 42).await.unwrap();
        store.record_progress(3, 7).await.unwrap();

        assert_eq!(store.progress(0).await.unwrap(), Some(42));
        assert_eq!(store.progress(3).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = MemoryStore::new();
        let other = TenantId::new("other-tenant").unwrap();

        store
            .create_group(&tenant(), group_record("shared-name"))
            .await
            .unwrap();

        let group = GroupId::new("shared-name").unwrap();
        assert!(store.get_group(&other, &group).await.is_err());

        let content = content_record(b"bytes", None);
        store.register_content(&tenant(), content.clone()).await.unwrap();
        let same_bytes = content_record(b"bytes", None);
        let result = store.register_content(&other, same_bytes.clone()).await.unwrap();
        // Dedup never crosses tenants.
        assert_eq!(result.disposition, ContentDisposition::Created);
        assert_eq!(result.content_id, same_bytes.content_id);
    }
}
