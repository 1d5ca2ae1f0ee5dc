//! Submission side of the write path.
//!
//! Writes do not touch the store directly. The coordinator appends an
//! encoded [`CommandEnvelope`] to the journal, parks the caller on a oneshot
//! channel keyed by correlation id, and waits for the local applier to reach
//! the record and resolve it with the applied outcome. The result a caller
//! sees is therefore exactly what every node's store recorded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use tabula_core::{CorrelationId, NodeId};
use tabula_journal::Journal;

use crate::command::{CommandEnvelope, CommandReturn};
use crate::error::{ApplyOutcome, RegistryError};

/// A parked submission awaiting its applied outcome.
///
/// The slot is taken on first resolution; the emptied entry stays in the map
/// until the submitter removes it, which is what makes a second resolution
/// for the same correlation id detectable.
struct Pending {
    slot: Option<oneshot::Sender<ApplyOutcome>>,
}

/// How an applied outcome met its pending submission entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Outcome handed to the waiting submitter.
    Delivered,
    /// No entry was waiting; the submitter already timed out and moved on.
    Unknown,
    /// The entry was already resolved. A duplicate apply slipped past the
    /// dedup window.
    AlreadyResolved,
    /// Entry dropped without an outcome because the node stopped.
    Abandoned,
}

impl Resolution {
    fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Unknown => "unknown",
            Self::AlreadyResolved => "already_resolved",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Coordinates command submission and outcome delivery for one node.
pub struct SubmissionCoordinator {
    journal: Arc<dyn Journal>,
    origin: NodeId,
    pending: DashMap<CorrelationId, Pending>,
    submit_timeout: Duration,
}

impl SubmissionCoordinator {
    /// Creates a coordinator submitting on behalf of `origin`.
    #[must_use]
    pub fn new(journal: Arc<dyn Journal>, origin: NodeId, submit_timeout: Duration) -> Self {
        Self {
            journal,
            origin,
            pending: DashMap::new(),
            submit_timeout,
        }
    }

    /// Node id this coordinator submits as.
    #[must_use]
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// Number of submissions currently awaiting an outcome.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Appends the envelope to the journal and waits for its applied outcome.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Apply`] when the command was applied and rejected.
    /// - [`RegistryError::Timeout`] when no outcome arrived in time. The
    ///   command is already in the journal and may still apply; the caller
    ///   must treat the operation's effect as unknown.
    /// - [`RegistryError::Halted`] when the node stopped before the outcome
    ///   arrived.
    /// - [`RegistryError::Journal`] when the append itself failed; the
    ///   command is not in the journal and had no effect.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            correlation_id = %envelope.correlation_id,
            kind = envelope.command.kind(),
            tenant = %envelope.tenant,
        )
    )]
    pub async fn submit(&self, envelope: CommandEnvelope) -> Result<CommandReturn, RegistryError> {
        let correlation_id = envelope.correlation_id;
        let kind = envelope.command.kind();
        let key = envelope.partition_key();
        let payload = envelope.encode()?;

        // Park before appending: the applier can reach the record before
        // append even returns.
        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            correlation_id,
            Pending {
                slot: Some(sender),
            },
        );

        let position = match self.journal.append(&key, payload).await {
            Ok(position) => position,
            Err(error) => {
                self.pending.remove(&correlation_id);
                return Err(error.into());
            }
        };
        crate::metrics::record_command_submitted(kind);
        debug!(%position, "command appended");

        let appended_at = Instant::now();
        let outcome = tokio::time::timeout(self.submit_timeout, receiver).await;
        self.pending.remove(&correlation_id);

        match outcome {
            Ok(Ok(outcome)) => {
                crate::metrics::record_submit_wait(kind, appended_at.elapsed().as_secs_f64());
                outcome.map_err(RegistryError::from)
            }
            Ok(Err(_closed)) => Err(RegistryError::Halted),
            Err(_elapsed) => {
                crate::metrics::record_submit_timeout(kind);
                warn!(%position, "timed out waiting for applied outcome");
                Err(RegistryError::Timeout {
                    waited: self.submit_timeout,
                })
            }
        }
    }

    /// Delivers an applied outcome to the submission waiting on
    /// `correlation_id`.
    ///
    /// Called by the local applier for records whose origin is this node. A
    /// [`Resolution::Unknown`] is benign: the submitter timed out before the
    /// record applied. [`Resolution::AlreadyResolved`] is not; it means the
    /// same correlation id applied twice.
    pub fn resolve(&self, correlation_id: CorrelationId, outcome: ApplyOutcome) -> Resolution {
        let resolution = match self.pending.get_mut(&correlation_id) {
            None => Resolution::Unknown,
            Some(mut entry) => match entry.slot.take() {
                Some(slot) => {
                    // Send fails only when the receiver is mid-drop; the
                    // entry is settled either way.
                    let _ = slot.send(outcome);
                    Resolution::Delivered
                }
                None => Resolution::AlreadyResolved,
            },
        };

        match resolution {
            Resolution::Unknown => {
                debug!(%correlation_id, "outcome arrived after the submitter gave up");
            }
            Resolution::AlreadyResolved => {
                error!(%correlation_id, "outcome resolved twice; duplicate record applied");
            }
            Resolution::Delivered | Resolution::Abandoned => {}
        }
        crate::metrics::record_resolution(resolution.as_str());
        resolution
    }

    /// Drops every unresolved entry, failing its submitter with
    /// [`RegistryError::Halted`].
    ///
    /// Called when an applier halts or the node shuts down; returns how many
    /// submissions were abandoned.
    pub fn abandon_all(&self) -> usize {
        let mut abandoned = 0;
        self.pending.retain(|_, entry| {
            if entry.slot.is_some() {
                abandoned += 1;
                crate::metrics::record_resolution(Resolution::Abandoned.as_str());
            }
            false
        });
        abandoned
    }
}

impl std::fmt::Debug for SubmissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionCoordinator")
            .field("origin", &self.origin)
            .field("pending", &self.pending.len())
            .field("submit_timeout", &self.submit_timeout)
            .finish()
    }
}
