//! Error types for journal operations.

/// The result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;

/// Errors that can occur when appending to or consuming the journal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// An invalid partition key was provided.
    #[error("invalid partition key: {message}")]
    InvalidKey {
        /// Description of what made the key invalid.
        message: String,
    },

    /// A partition index outside the journal's range was requested.
    #[error("partition {partition} out of range (journal has {count} partitions)")]
    PartitionOutOfRange {
        /// The requested partition.
        partition: u32,
        /// The journal's partition count.
        count: u32,
    },

    /// The journal backend failed.
    #[error("journal backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl JournalError {
    /// Creates a new backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}
