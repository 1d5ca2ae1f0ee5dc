//! Registry node lifecycle and public surface.
//!
//! A node owns one applier task per journal partition plus a submission
//! coordinator, and exposes the typed read/write API on top of them. Writes
//! go through the journal and return the applied outcome; reads come from
//! the local store, which trails the journal only by the applier's position.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use tabula_core::{
    ArtifactId, ArtifactType, CommentId, ContentHash, ContentId, GroupId, NodeId, TenantId,
    VersionState,
};
use tabula_journal::Journal;

use crate::applier::LogApplier;
use crate::canon::CanonicalizerRegistry;
use crate::command::{Command, CommandEnvelope, CommandReturn, InitialVersion};
use crate::config::RegistryConfig;
use crate::content::ContentIndex;
use crate::coordinator::SubmissionCoordinator;
use crate::error::{RegistryError, Result};
use crate::store::{
    ArtifactRecord, CommentRecord, ContentDisposition, ContentRecord, GroupRecord, MetadataPatch,
    RegisteredContent, RegistryStore, VersionRecord,
};

/// Marks the node halted when an applier task dies for any reason.
///
/// Dropping the guard while armed sets the halt flag and abandons pending
/// submissions, which covers both error returns and panics. A clean
/// shutdown disarms it first.
struct HaltGuard {
    halted: Arc<AtomicBool>,
    coordinator: Arc<SubmissionCoordinator>,
    armed: bool,
}

impl HaltGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for HaltGuard {
    fn drop(&mut self) {
        if self.armed {
            self.halted.store(true, Ordering::SeqCst);
            let abandoned = self.coordinator.abandon_all();
            if abandoned > 0 {
                warn!(abandoned, "abandoned pending submissions after applier failure");
            }
        }
    }
}

/// Request payload for creating an artifact.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    group: GroupId,
    artifact: ArtifactId,
    artifact_type: ArtifactType,
    name: Option<String>,
    description: Option<String>,
    labels: BTreeMap<String, String>,
    first_content: Option<Bytes>,
}

impl NewArtifact {
    /// Creates a request for `group`/`artifact` of the given type.
    #[must_use]
    pub fn new(group: GroupId, artifact: ArtifactId, artifact_type: ArtifactType) -> Self {
        Self {
            group,
            artifact,
            artifact_type,
            name: None,
            description: None,
            labels: BTreeMap::new(),
            first_content: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the labels.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Attaches content for an initial version `"1"`. The content is
    /// registered (deduplicated) before the artifact is created.
    #[must_use]
    pub fn with_content(mut self, content: Bytes) -> Self {
        self.first_content = Some(content);
        self
    }
}

/// One registry node: appliers, coordinator, and the typed API.
pub struct RegistryNode {
    node_id: NodeId,
    store: Arc<dyn RegistryStore>,
    coordinator: Arc<SubmissionCoordinator>,
    content_index: Arc<ContentIndex>,
    canonicalizers: CanonicalizerRegistry,
    halted: Arc<AtomicBool>,
    closed: AtomicBool,
    shutdown_senders: Mutex<Vec<oneshot::Sender<()>>>,
}

impl RegistryNode {
    /// Starts a node against a journal and a store.
    ///
    /// Spawns one applier per partition and waits until every partition has
    /// caught up to the journal head observed at startup, so a node returned
    /// from here serves reads that include all previously committed history.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal or store fails during replay.
    pub async fn start(
        config: RegistryConfig,
        journal: Arc<dyn Journal>,
        store: Arc<dyn RegistryStore>,
        canonicalizers: CanonicalizerRegistry,
    ) -> Result<Arc<Self>> {
        let node_id = NodeId::generate();
        let coordinator = Arc::new(SubmissionCoordinator::new(
            Arc::clone(&journal),
            node_id,
            config.submit_timeout,
        ));
        let content_index = Arc::new(ContentIndex::new());
        let halted = Arc::new(AtomicBool::new(false));

        let mut shutdown_senders = Vec::new();
        let mut ready_receivers = Vec::new();
        for partition in 0..journal.partition_count() {
            let applier = LogApplier::new(
                Arc::clone(&journal),
                Arc::clone(&store),
                Arc::clone(&coordinator),
                Arc::clone(&content_index),
                node_id,
                partition,
                config.dedup_window,
            );
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let (ready_tx, ready_rx) = oneshot::channel();
            shutdown_senders.push(shutdown_tx);
            ready_receivers.push((partition, ready_rx));

            let guard = HaltGuard {
                halted: Arc::clone(&halted),
                coordinator: Arc::clone(&coordinator),
                armed: true,
            };
            tokio::spawn(async move {
                match applier.run(shutdown_rx, ready_tx).await {
                    Ok(()) => guard.disarm(),
                    Err(error) => {
                        error!(partition, %error, "applier stopped; halting node");
                        drop(guard);
                    }
                }
            });
        }

        for (partition, ready) in ready_receivers {
            match ready.await {
                Ok(applied_through) => {
                    debug!(partition, applied_through, "partition caught up");
                }
                // The applier died during replay; its guard has already
                // halted the node. Dropping our senders stops the rest.
                Err(_closed) => return Err(RegistryError::Halted),
            }
        }
        info!(%node_id, partitions = journal.partition_count(), "registry node ready");

        Ok(Arc::new(Self {
            node_id,
            store,
            coordinator,
            content_index,
            canonicalizers,
            halted,
            closed: AtomicBool::new(false),
            shutdown_senders: Mutex::new(shutdown_senders),
        }))
    }

    /// This node's identity, as carried in envelopes it originates.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Whether the node has halted after an applier failure.
    ///
    /// A halted node rejects writes but keeps serving (possibly stale)
    /// reads.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Stops the applier tasks and fails pending submissions.
    ///
    /// Reads keep working against the frozen local state. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let senders = match self.shutdown_senders.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for sender in senders {
            let _ = sender.send(());
        }
        let abandoned = self.coordinator.abandon_all();
        if abandoned > 0 {
            warn!(abandoned, "abandoned in-flight submissions at shutdown");
        }
        info!(node_id = %self.node_id, "registry node shut down");
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RegistryError::ShutDown);
        }
        if self.halted.load(Ordering::SeqCst) {
            return Err(RegistryError::Halted);
        }
        Ok(())
    }

    async fn submit(&self, tenant: &TenantId, command: Command) -> Result<CommandReturn> {
        self.ensure_accepting()?;
        let envelope = CommandEnvelope::new(tenant.clone(), self.node_id, command);
        self.coordinator.submit(envelope).await
    }

    // ------------------------------------------------------------------
    // Write surface
    // ------------------------------------------------------------------

    /// Creates a group.
    ///
    /// # Errors
    ///
    /// Rejects with [`crate::error::FailureKind::AlreadyExists`] when the
    /// group exists.
    pub async fn create_group(
        &self,
        tenant: &TenantId,
        group: GroupId,
        description: Option<String>,
        labels: BTreeMap<String, String>,
    ) -> Result<GroupRecord> {
        let outcome = self
            .submit(
                tenant,
                Command::CreateGroup {
                    group,
                    description,
                    labels,
                },
            )
            .await?;
        match outcome {
            CommandReturn::Group(record) => Ok(record),
            other => Err(unexpected_return("create_group", &other)),
        }
    }

    /// Deletes a group and everything under it. Registered content is not
    /// deleted; it may be referenced from other groups.
    ///
    /// # Errors
    ///
    /// Rejects when the group does not exist.
    pub async fn delete_group(&self, tenant: &TenantId, group: GroupId) -> Result<()> {
        self.submit(tenant, Command::DeleteGroup { group }).await?;
        Ok(())
    }

    /// Creates an artifact, optionally with a deduplicated first version.
    ///
    /// # Errors
    ///
    /// Rejects when the artifact already exists.
    pub async fn create_artifact(
        &self,
        tenant: &TenantId,
        request: NewArtifact,
    ) -> Result<(ArtifactRecord, Option<VersionRecord>)> {
        let first_version = match request.first_content {
            Some(content) => {
                let registered = self
                    .lookup_or_register_content(tenant, &request.artifact_type, content)
                    .await?;
                Some(InitialVersion {
                    version: None,
                    content_id: registered.content_id,
                })
            }
            None => None,
        };

        let outcome = self
            .submit(
                tenant,
                Command::CreateArtifact {
                    group: request.group,
                    artifact: request.artifact,
                    artifact_type: request.artifact_type,
                    name: request.name,
                    description: request.description,
                    labels: request.labels,
                    first_version,
                },
            )
            .await?;
        match outcome {
            CommandReturn::Artifact {
                artifact,
                first_version,
            } => Ok((artifact, first_version)),
            other => Err(unexpected_return("create_artifact", &other)),
        }
    }

    /// Deletes an artifact and its versions.
    ///
    /// # Errors
    ///
    /// Rejects when the artifact does not exist.
    pub async fn delete_artifact(
        &self,
        tenant: &TenantId,
        group: GroupId,
        artifact: ArtifactId,
    ) -> Result<()> {
        self.submit(tenant, Command::DeleteArtifact { group, artifact })
            .await?;
        Ok(())
    }

    /// Patches artifact metadata; `None` fields stay untouched.
    ///
    /// # Errors
    ///
    /// Rejects when the artifact does not exist.
    pub async fn update_artifact_metadata(
        &self,
        tenant: &TenantId,
        group: GroupId,
        artifact: ArtifactId,
        patch: MetadataPatch,
    ) -> Result<ArtifactRecord> {
        let outcome = self
            .submit(
                tenant,
                Command::UpdateArtifactMetadata {
                    group,
                    artifact,
                    name: patch.name,
                    description: patch.description,
                    labels: patch.labels,
                },
            )
            .await?;
        match outcome {
            CommandReturn::Artifact { artifact, .. } => Ok(artifact),
            other => Err(unexpected_return("update_artifact_metadata", &other)),
        }
    }

    /// Registers `content` and appends it to an artifact as a new version.
    ///
    /// # Errors
    ///
    /// Rejects when the artifact does not exist or the explicit version
    /// string is taken.
    pub async fn create_version(
        &self,
        tenant: &TenantId,
        group: GroupId,
        artifact: ArtifactId,
        version: Option<String>,
        artifact_type: &ArtifactType,
        content: Bytes,
    ) -> Result<VersionRecord> {
        let registered = self
            .lookup_or_register_content(tenant, artifact_type, content)
            .await?;
        let outcome = self
            .submit(
                tenant,
                Command::CreateVersion {
                    group,
                    artifact,
                    version,
                    content_id: registered.content_id,
                },
            )
            .await?;
        match outcome {
            CommandReturn::Version(record) => Ok(record),
            other => Err(unexpected_return("create_version", &other)),
        }
    }

    /// Deletes a single version.
    ///
    /// # Errors
    ///
    /// Rejects when the version does not exist.
    pub async fn delete_version(
        &self,
        tenant: &TenantId,
        group: GroupId,
        artifact: ArtifactId,
        version: String,
    ) -> Result<()> {
        self.submit(
            tenant,
            Command::DeleteVersion {
                group,
                artifact,
                version,
            },
        )
        .await?;
        Ok(())
    }

    /// Transitions a version's lifecycle state.
    ///
    /// # Errors
    ///
    /// Rejects when the version does not exist.
    pub async fn update_version_state(
        &self,
        tenant: &TenantId,
        group: GroupId,
        artifact: ArtifactId,
        version: String,
        state: VersionState,
    ) -> Result<VersionRecord> {
        let outcome = self
            .submit(
                tenant,
                Command::UpdateVersionState {
                    group,
                    artifact,
                    version,
                    state,
                },
            )
            .await?;
        match outcome {
            CommandReturn::Version(record) => Ok(record),
            other => Err(unexpected_return("update_version_state", &other)),
        }
    }

    /// Attaches a comment to a version.
    ///
    /// # Errors
    ///
    /// Rejects when the version does not exist.
    pub async fn create_comment(
        &self,
        tenant: &TenantId,
        group: GroupId,
        artifact: ArtifactId,
        version: String,
        value: String,
    ) -> Result<CommentRecord> {
        let outcome = self
            .submit(
                tenant,
                Command::CreateComment {
                    group,
                    artifact,
                    version,
                    comment_id: CommentId::generate(),
                    value,
                },
            )
            .await?;
        match outcome {
            CommandReturn::Comment(record) => Ok(record),
            other => Err(unexpected_return("create_comment", &other)),
        }
    }

    /// Removes a comment.
    ///
    /// # Errors
    ///
    /// Rejects when the comment does not exist.
    pub async fn delete_comment(
        &self,
        tenant: &TenantId,
        group: GroupId,
        artifact: ArtifactId,
        version: String,
        comment_id: CommentId,
    ) -> Result<()> {
        self.submit(
            tenant,
            Command::DeleteComment {
                group,
                artifact,
                version,
                comment_id,
            },
        )
        .await?;
        Ok(())
    }

    /// Returns the id for `content`, registering it if unseen.
    ///
    /// The fast path answers from the local raw index without touching the
    /// journal. Everything else, including canonical matches, submits a
    /// registration command: the store must learn new raw aliases, and only
    /// apply order can settle concurrent registrations of equivalent content.
    ///
    /// # Errors
    ///
    /// Fails when the submission fails; content registration itself has no
    /// rejection cases.
    pub async fn lookup_or_register_content(
        &self,
        tenant: &TenantId,
        artifact_type: &ArtifactType,
        content: Bytes,
    ) -> Result<RegisteredContent> {
        self.ensure_accepting()?;
        let raw_hash = ContentHash::of(&content);

        if let Some(content_id) = self.content_index.lookup_raw(tenant, &raw_hash) {
            crate::metrics::record_content_lookup("raw");
            return Ok(RegisteredContent {
                content_id,
                disposition: ContentDisposition::RawMatch,
            });
        }

        let canonical_hash = self
            .canonicalizers
            .canonical_form(artifact_type, &content)
            .map(|canonical| ContentHash::of(&canonical));
        let canonical_hit = canonical_hash.as_ref().is_some_and(|hash| {
            self.content_index
                .lookup_canonical(tenant, artifact_type, hash)
                .is_some()
        });
        crate::metrics::record_content_lookup(if canonical_hit { "canonical" } else { "miss" });

        let outcome = self
            .submit(
                tenant,
                Command::RegisterContent {
                    content_id: ContentId::generate(),
                    artifact_type: artifact_type.clone(),
                    content,
                    raw_hash,
                    canonical_hash,
                },
            )
            .await?;
        match outcome {
            CommandReturn::Content(registered) => Ok(registered),
            other => Err(unexpected_return("register_content", &other)),
        }
    }

    // ------------------------------------------------------------------
    // Read surface
    //
    // Reads come from the local store and stay available after halt or
    // shutdown.
    // ------------------------------------------------------------------

    /// Fetches a group.
    ///
    /// # Errors
    ///
    /// Fails when the group does not exist.
    pub async fn get_group(&self, tenant: &TenantId, group: &GroupId) -> Result<GroupRecord> {
        Ok(self.store.get_group(tenant, group).await?)
    }

    /// Lists groups in a stable order.
    ///
    /// # Errors
    ///
    /// Fails when storage fails.
    pub async fn list_groups(&self, tenant: &TenantId) -> Result<Vec<GroupRecord>> {
        Ok(self.store.list_groups(tenant).await?)
    }

    /// Fetches an artifact.
    ///
    /// # Errors
    ///
    /// Fails when the artifact does not exist.
    pub async fn get_artifact(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> Result<ArtifactRecord> {
        Ok(self.store.get_artifact(tenant, group, artifact).await?)
    }

    /// Lists a group's artifacts in a stable order.
    ///
    /// # Errors
    ///
    /// Fails when the group does not exist.
    pub async fn list_artifacts(
        &self,
        tenant: &TenantId,
        group: &GroupId,
    ) -> Result<Vec<ArtifactRecord>> {
        Ok(self.store.list_artifacts(tenant, group).await?)
    }

    /// Fetches a version.
    ///
    /// # Errors
    ///
    /// Fails when the version does not exist.
    pub async fn get_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> Result<VersionRecord> {
        Ok(self
            .store
            .get_version(tenant, group, artifact, version)
            .await?)
    }

    /// Fetches the highest-positioned version of an artifact.
    ///
    /// # Errors
    ///
    /// Fails when the artifact has no versions.
    pub async fn latest_version(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> Result<VersionRecord> {
        Ok(self.store.latest_version(tenant, group, artifact).await?)
    }

    /// Lists an artifact's versions in position order.
    ///
    /// # Errors
    ///
    /// Fails when the artifact does not exist.
    pub async fn list_versions(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
    ) -> Result<Vec<VersionRecord>> {
        Ok(self.store.list_versions(tenant, group, artifact).await?)
    }

    /// Lists a version's comments in creation order.
    ///
    /// # Errors
    ///
    /// Fails when the version does not exist.
    pub async fn list_comments(
        &self,
        tenant: &TenantId,
        group: &GroupId,
        artifact: &ArtifactId,
        version: &str,
    ) -> Result<Vec<CommentRecord>> {
        Ok(self
            .store
            .list_comments(tenant, group, artifact, version)
            .await?)
    }

    /// Fetches registered content bytes and hashes by id.
    ///
    /// # Errors
    ///
    /// Fails when no content has that id.
    pub async fn get_content(
        &self,
        tenant: &TenantId,
        content_id: ContentId,
    ) -> Result<ContentRecord> {
        Ok(self.store.get_content(tenant, content_id).await?)
    }
}

impl std::fmt::Debug for RegistryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryNode")
            .field("node_id", &self.node_id)
            .field("halted", &self.is_halted())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn unexpected_return(operation: &str, other: &CommandReturn) -> RegistryError {
    RegistryError::internal(format!(
        "unexpected return payload for {operation}: {other:?}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewVersion, StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::time::Duration;
    use tabula_journal::MemoryJournal;

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    async fn start_node(journal: Arc<MemoryJournal>) -> Arc<RegistryNode> {
        RegistryNode::start(
            RegistryConfig::default(),
            journal as Arc<dyn Journal>,
            Arc::new(MemoryStore::new()),
            CanonicalizerRegistry::builtin(),
        )
        .await
        .unwrap()
    }

    async fn journal_size(journal: &MemoryJournal) -> u64 {
        let mut total = 0;
        for partition in 0..journal.partition_count() {
            total += journal.head(partition).await.unwrap();
        }
        total
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let journal = Arc::new(MemoryJournal::new(4));
        let node = start_node(journal).await;

        let group = GroupId::new("com.example").unwrap();
        let created = node
            .create_group(&tenant(), group.clone(), Some("demo".into()), BTreeMap::new())
            .await
            .unwrap();

        let fetched = node.get_group(&tenant(), &group).await.unwrap();
        assert_eq!(fetched, created);
        node.shutdown();
    }

    #[tokio::test]
    async fn raw_content_hit_skips_the_journal() {
        let journal = Arc::new(MemoryJournal::new(4));
        let node = start_node(Arc::clone(&journal)).await;
        let content = Bytes::from_static(b"{\"type\":\"string\"}");

        let first = node
            .lookup_or_register_content(&tenant(), &ArtifactType::avro(), content.clone())
            .await
            .unwrap();
        assert_eq!(first.disposition, ContentDisposition::Created);
        let after_first = journal_size(&journal).await;

        let second = node
            .lookup_or_register_content(&tenant(), &ArtifactType::avro(), content)
            .await
            .unwrap();
        assert_eq!(second.disposition, ContentDisposition::RawMatch);
        assert_eq!(second.content_id, first.content_id);
        // Exact bytes answered locally; nothing new in the journal.
        assert_eq!(journal_size(&journal).await, after_first);
        node.shutdown();
    }

    #[tokio::test]
    async fn byte_different_duplicates_converge_on_one_entry() {
        let journal = Arc::new(MemoryJournal::new(4));
        let node = start_node(Arc::clone(&journal)).await;

        let pretty = Bytes::from_static(b"{ \"type\" : \"record\", \"name\" : \"P\", \"fields\" : [] }");
        let minified = Bytes::from_static(b"{\"fields\":[],\"name\":\"P\",\"type\":\"record\"}");

        let first = node
            .lookup_or_register_content(&tenant(), &ArtifactType::avro(), pretty)
            .await
            .unwrap();
        let second = node
            .lookup_or_register_content(&tenant(), &ArtifactType::avro(), minified)
            .await
            .unwrap();

        assert_eq!(second.disposition, ContentDisposition::CanonicalMatch);
        assert_eq!(second.content_id, first.content_id);

        // The stored entry keeps the first rendition's bytes.
        let entry = node.get_content(&tenant(), first.content_id).await.unwrap();
        assert_eq!(entry.raw_hash, ContentHash::of(b"{ \"type\" : \"record\", \"name\" : \"P\", \"fields\" : [] }"));
        node.shutdown();
    }

    #[tokio::test]
    async fn artifact_with_content_gets_first_version() {
        let journal = Arc::new(MemoryJournal::new(4));
        let node = start_node(journal).await;

        let group = GroupId::new("com.example").unwrap();
        let artifact = ArtifactId::new("orders").unwrap();
        let request = NewArtifact::new(group.clone(), artifact.clone(), ArtifactType::json())
            .with_name("Orders")
            .with_content(Bytes::from_static(b"{\"type\":\"object\"}"));

        let (created, first_version) = node.create_artifact(&tenant(), request).await.unwrap();
        assert_eq!(created.name.as_deref(), Some("Orders"));

        let first_version = first_version.expect("content implies a first version");
        assert_eq!(first_version.version, "1");
        let entry = node
            .get_content(&tenant(), first_version.content_id)
            .await
            .unwrap();
        assert_eq!(entry.content, Bytes::from_static(b"{\"type\":\"object\"}"));

        // The group came into being implicitly.
        assert!(node.get_group(&tenant(), &group).await.is_ok());
        node.shutdown();
    }

    #[tokio::test]
    async fn shutdown_rejects_writes_but_keeps_reads() {
        let journal = Arc::new(MemoryJournal::new(2));
        let node = start_node(journal).await;
        let group = GroupId::new("com.example").unwrap();
        node.create_group(&tenant(), group.clone(), None, BTreeMap::new())
            .await
            .unwrap();

        node.shutdown();
        node.shutdown(); // idempotent

        let err = node
            .create_group(&tenant(), GroupId::new("com.other").unwrap(), None, BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ShutDown));
        assert!(node.get_group(&tenant(), &group).await.is_ok());
    }

    /// Store wrapper whose progress recording always fails, which an applier
    /// must treat as fatal.
    struct BrokenProgress {
        inner: MemoryStore,
    }

    #[async_trait]
    impl RegistryStore for BrokenProgress {
        async fn create_group(
            &self,
            tenant: &TenantId,
            record: GroupRecord,
        ) -> StoreResult<GroupRecord> {
            self.inner.create_group(tenant, record).await
        }

        async fn delete_group(&self, tenant: &TenantId, group: &GroupId) -> StoreResult<()> {
            self.inner.delete_group(tenant, group).await
        }

        async fn create_artifact(
            &self,
            tenant: &TenantId,
            record: ArtifactRecord,
            first_version: Option<NewVersion>,
        ) -> StoreResult<(ArtifactRecord, Option<VersionRecord>)> {
            self.inner.create_artifact(tenant, record, first_version).await
        }

        async fn delete_artifact(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
        ) -> StoreResult<()> {
            self.inner.delete_artifact(tenant, group, artifact).await
        }

        async fn update_artifact_metadata(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
            patch: MetadataPatch,
            modified_at: DateTime<Utc>,
        ) -> StoreResult<ArtifactRecord> {
            self.inner
                .update_artifact_metadata(tenant, group, artifact, patch, modified_at)
                .await
        }

        async fn create_version(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
            version: NewVersion,
            created_at: DateTime<Utc>,
        ) -> StoreResult<VersionRecord> {
            self.inner
                .create_version(tenant, group, artifact, version, created_at)
                .await
        }

        async fn delete_version(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
            version: &str,
        ) -> StoreResult<()> {
            self.inner.delete_version(tenant, group, artifact, version).await
        }

        async fn update_version_state(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
            version: &str,
            state: VersionState,
        ) -> StoreResult<VersionRecord> {
            self.inner
                .update_version_state(tenant, group, artifact, version, state)
                .await
        }

        async fn create_comment(
            &self,
            tenant: &TenantId,
            record: CommentRecord,
        ) -> StoreResult<CommentRecord> {
            self.inner.create_comment(tenant, record).await
        }

        async fn delete_comment(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
            version: &str,
            comment: &CommentId,
        ) -> StoreResult<()> {
            self.inner
                .delete_comment(tenant, group, artifact, version, comment)
                .await
        }

        async fn register_content(
            &self,
            tenant: &TenantId,
            record: ContentRecord,
        ) -> StoreResult<RegisteredContent> {
            self.inner.register_content(tenant, record).await
        }

        async fn record_progress(&self, _partition: u32, _offset: u64) -> StoreResult<()> {
            Err(StoreError::internal("progress volume is read-only"))
        }

        async fn progress(&self, partition: u32) -> StoreResult<Option<u64>> {
            self.inner.progress(partition).await
        }

        async fn get_group(&self, tenant: &TenantId, group: &GroupId) -> StoreResult<GroupRecord> {
            self.inner.get_group(tenant, group).await
        }

        async fn list_groups(&self, tenant: &TenantId) -> StoreResult<Vec<GroupRecord>> {
            self.inner.list_groups(tenant).await
        }

        async fn get_artifact(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
        ) -> StoreResult<ArtifactRecord> {
            self.inner.get_artifact(tenant, group, artifact).await
        }

        async fn list_artifacts(
            &self,
            tenant: &TenantId,
            group: &GroupId,
        ) -> StoreResult<Vec<ArtifactRecord>> {
            self.inner.list_artifacts(tenant, group).await
        }

        async fn get_version(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
            version: &str,
        ) -> StoreResult<VersionRecord> {
            self.inner.get_version(tenant, group, artifact, version).await
        }

        async fn latest_version(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
        ) -> StoreResult<VersionRecord> {
            self.inner.latest_version(tenant, group, artifact).await
        }

        async fn list_versions(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
        ) -> StoreResult<Vec<VersionRecord>> {
            self.inner.list_versions(tenant, group, artifact).await
        }

        async fn list_comments(
            &self,
            tenant: &TenantId,
            group: &GroupId,
            artifact: &ArtifactId,
            version: &str,
        ) -> StoreResult<Vec<CommentRecord>> {
            self.inner
                .list_comments(tenant, group, artifact, version)
                .await
        }

        async fn get_content(
            &self,
            tenant: &TenantId,
            content_id: ContentId,
        ) -> StoreResult<ContentRecord> {
            self.inner.get_content(tenant, content_id).await
        }
    }

    #[tokio::test]
    async fn storage_failure_halts_writes() {
        let journal = Arc::new(MemoryJournal::new(1));
        // Empty journal, so startup replays nothing and succeeds; the broken
        // progress volume only bites once a record applies.
        let node = RegistryNode::start(
            RegistryConfig::default(),
            journal as Arc<dyn Journal>,
            Arc::new(BrokenProgress {
                inner: MemoryStore::new(),
            }),
            CanonicalizerRegistry::empty(),
        )
        .await
        .unwrap();

        // The command applies and resolves before progress recording fails,
        // so this first write still succeeds.
        node.create_group(
            &tenant(),
            GroupId::new("com.example").unwrap(),
            None,
            BTreeMap::new(),
        )
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !node.is_halted() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("node should halt after the progress failure");

        let err = node
            .create_group(
                &tenant(),
                GroupId::new("com.other").unwrap(),
                None,
                BTreeMap::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Halted));

        // Reads survive the halt.
        assert!(node
            .get_group(&tenant(), &GroupId::new("com.example").unwrap())
            .await
            .is_ok());
    }
}
