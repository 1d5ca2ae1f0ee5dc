//! Error types for the registry's write coordination core.

use std::fmt;
use std::time::Duration;

use tabula_journal::JournalError;

use crate::store::StoreError;

/// The result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// The outcome routed from the log applier back to a waiting submitter.
pub type ApplyOutcome = std::result::Result<crate::command::CommandReturn, ApplyFailure>;

/// Classification of an apply failure, stable enough for callers to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The entity being created already exists.
    AlreadyExists,
    /// The command arguments were rejected by storage.
    Invalid,
    /// The storage backend failed internally.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::Invalid => write!(f, "invalid"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// A storage invocation failure captured during apply.
///
/// Produced once per failed command and delivered to the originating caller;
/// remote nodes apply the same command, observe the same failure, and discard
/// it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApplyFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable description from the storage layer.
    pub message: String,
}

impl From<StoreError> for ApplyFailure {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound { .. } => FailureKind::NotFound,
            StoreError::AlreadyExists { .. } => FailureKind::AlreadyExists,
            StoreError::Invalid { .. } => FailureKind::Invalid,
            StoreError::Internal { .. } => FailureKind::Internal,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the registry core.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The submitted command failed when applied against storage.
    #[error("command failed to apply: {0}")]
    Apply(#[from] ApplyFailure),

    /// The caller gave up waiting for the command to be applied.
    ///
    /// The command is not retracted: it may still be committed and applied
    /// after this error, so the caller must treat the outcome as unknown
    /// rather than as rolled back.
    #[error("command submission timed out after {waited:?}; outcome unknown")]
    Timeout {
        /// How long the submitter waited.
        waited: Duration,
    },

    /// The journal rejected an append or a consume operation.
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// A direct read against local storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A command envelope could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Invalid configuration was provided.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The node halted after a fatal apply failure and refuses submissions.
    ///
    /// An apply that fails without producing a structured error risks state
    /// divergence, so the affected applier stops and the node stops accepting
    /// writes instead of silently skipping the record.
    #[error("registry node halted after a fatal apply failure")]
    Halted,

    /// The node was shut down and no longer accepts submissions.
    #[error("registry node is shut down")]
    ShutDown,

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl RegistryError {
    /// Creates a new codec error with the given message.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a new configuration error with the given message.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
