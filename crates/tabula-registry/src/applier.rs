//! Apply side of the write path.
//!
//! One applier owns one journal partition. It consumes records in commit
//! order, applies each command against the store exactly once, feeds the
//! content index, resolves outcomes for commands this node originated, and
//! records durable progress so a restart resumes where it left off.
//!
//! Apply order is the ordering authority: nothing here consults clocks or
//! generates ids, so every node that applies the same partition prefix holds
//! identical state.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, error};

use tabula_core::{CorrelationId, NodeId};
use tabula_journal::{Journal, JournalRecord};

use crate::command::{ApplyContext, Command, CommandEnvelope, CommandReturn};
use crate::content::ContentIndex;
use crate::coordinator::SubmissionCoordinator;
use crate::error::{FailureKind, RegistryError};
use crate::store::RegistryStore;

/// Bounded memory of recently applied correlation ids.
///
/// The journal is at-least-once: a producer retry after a lost
/// acknowledgement commits the same envelope at two offsets. Durable
/// progress only filters re-reads of the same offset, so this window is what
/// keeps the second copy from applying twice. Duplicates separated by more
/// than `capacity` records fall back on the commands' own guards (creates
/// reject as already existing, content registration re-deduplicates).
pub(crate) struct DedupWindow {
    seen: HashSet<CorrelationId>,
    order: VecDeque<CorrelationId>,
    capacity: usize,
}

impl DedupWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "dedup window capacity must be non-zero");
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts an id, evicting the oldest beyond capacity. Returns `false`
    /// when the id was already present.
    pub(crate) fn insert(&mut self, id: CorrelationId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

/// Applies one journal partition against the store.
pub struct LogApplier {
    journal: Arc<dyn Journal>,
    store: Arc<dyn RegistryStore>,
    coordinator: Arc<SubmissionCoordinator>,
    content_index: Arc<ContentIndex>,
    node: NodeId,
    partition: u32,
    dedup: DedupWindow,
}

impl LogApplier {
    /// Creates an applier for `partition`.
    #[must_use]
    pub fn new(
        journal: Arc<dyn Journal>,
        store: Arc<dyn RegistryStore>,
        coordinator: Arc<SubmissionCoordinator>,
        content_index: Arc<ContentIndex>,
        node: NodeId,
        partition: u32,
        dedup_window: usize,
    ) -> Self {
        Self {
            journal,
            store,
            coordinator,
            content_index,
            node,
            partition,
            dedup: DedupWindow::new(dedup_window),
        }
    }

    /// Consumes the partition until shut down.
    ///
    /// Resumes after the last durably applied offset. `ready` fires once the
    /// applier has caught up to the journal head observed at startup, with
    /// the offset one past the last applied record; reads served before that
    /// point could miss already-committed history.
    ///
    /// # Errors
    ///
    /// Returns an error when the journal or store fails, or when a command
    /// fails non-deterministically. The partition must not advance past such
    /// a record, so the applier stops and the node halts.
    pub async fn run(
        mut self,
        mut shutdown: oneshot::Receiver<()>,
        ready: oneshot::Sender<u64>,
    ) -> Result<(), RegistryError> {
        let start_from = match self.store.progress(self.partition).await? {
            Some(applied) => applied + 1,
            None => 0,
        };
        let head = self.journal.head(self.partition).await?;
        let mut cursor = self.journal.cursor(self.partition, start_from).await?;
        debug!(
            partition = self.partition,
            start_from, head, "applier starting"
        );

        let mut ready = Some(ready);
        if start_from >= head {
            if let Some(sender) = ready.take() {
                let _ = sender.send(start_from);
            }
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(partition = self.partition, "applier shutting down");
                    return Ok(());
                }
                record = cursor.next() => {
                    let record = record?;
                    self.apply_record(&record).await?;
                    let applied_through = record.position.offset + 1;
                    if applied_through >= head {
                        if let Some(sender) = ready.take() {
                            let _ = sender.send(applied_through);
                        }
                    }
                }
            }
        }
    }

    /// Applies a single journal record.
    ///
    /// Undecodable and redelivered records are skipped with their offset
    /// recorded; both would otherwise wedge the partition forever.
    #[tracing::instrument(skip(self, record), fields(position = %record.position))]
    async fn apply_record(&mut self, record: &JournalRecord) -> Result<(), RegistryError> {
        let position = record.position;

        let envelope = match CommandEnvelope::decode(&record.payload) {
            Ok(envelope) => envelope,
            Err(error) => {
                error!(%error, "skipping undecodable journal record");
                crate::metrics::record_decode_failure(position.partition);
                self.store
                    .record_progress(position.partition, position.offset)
                    .await?;
                return Ok(());
            }
        };

        let kind = envelope.command.kind();
        if !self.dedup.insert(envelope.correlation_id) {
            debug!(
                correlation_id = %envelope.correlation_id,
                kind,
                "skipping redelivered record"
            );
            crate::metrics::record_duplicate_skipped(kind);
            self.store
                .record_progress(position.partition, position.offset)
                .await?;
            return Ok(());
        }

        let ctx = ApplyContext {
            tenant: &envelope.tenant,
            occurred_at: envelope.submitted_at,
        };
        let started = Instant::now();
        let outcome = envelope.command.apply(self.store.as_ref(), &ctx).await;
        let outcome_label = if outcome.is_ok() { "applied" } else { "rejected" };
        crate::metrics::record_command_applied(kind, outcome_label, started.elapsed().as_secs_f64());

        if let Err(failure) = &outcome {
            // Deterministic rejections are a normal outcome; every node
            // rejects identically and state stays converged. A backend
            // failure is neither, so this node must stop rather than diverge.
            if failure.kind == FailureKind::Internal {
                error!(kind, %failure, "storage failed while applying; stopping");
                return Err(RegistryError::Apply(failure.clone()));
            }
            debug!(kind, %failure, "command rejected");
        }

        if let (
            Command::RegisterContent {
                artifact_type,
                raw_hash,
                canonical_hash,
                ..
            },
            Ok(CommandReturn::Content(registered)),
        ) = (&envelope.command, &outcome)
        {
            self.content_index.observe(
                &envelope.tenant,
                artifact_type,
                *raw_hash,
                *canonical_hash,
                registered.content_id,
            );
        }

        if envelope.origin == self.node {
            self.coordinator.resolve(envelope.correlation_id, outcome);
        }

        self.store
            .record_progress(position.partition, position.offset)
            .await?;
        Ok(())
    }
}
