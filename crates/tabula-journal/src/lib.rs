//! # tabula-journal
//!
//! The ordered, partitioned, append-only command journal that Tabula nodes
//! coordinate through.
//!
//! This crate defines:
//!
//! - [`Journal`]: Trait for appending opaque records routed by partition key
//! - [`JournalCursor`]: Trait for consuming one partition in commit order
//! - [`PartitionKey`]: Routing key with the stable key-to-partition mapping
//! - [`MemoryJournal`]: In-memory implementation for tests and local development
//!
//! ## Delivery contract
//!
//! The journal is durable and at-least-once: a producer that times out on an
//! acknowledgement may retry an already-committed append, so consumers must
//! treat records as possibly duplicated. Within one partition, records are
//! totally ordered and a cursor observes them in commit order; across
//! partitions there is no ordering relationship. The journal retains enough
//! history for a fresh consumer to replay from offset zero.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod partition;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

pub use error::{JournalError, Result};
pub use memory::MemoryJournal;
pub use partition::PartitionKey;

/// The committed position of a record: which partition, and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JournalPosition {
    /// Partition index.
    pub partition: u32,
    /// Zero-based offset within the partition.
    pub offset: u64,
}

impl fmt::Display for JournalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

/// A committed record as observed by a consumer.
#[derive(Debug, Clone)]
pub struct JournalRecord {
    /// Where the record was committed.
    pub position: JournalPosition,
    /// The opaque payload as appended by the producer.
    pub payload: Bytes,
}

/// An ordered, partitioned, append-only record journal.
///
/// Implementations may target a log broker or, for tests, process memory.
/// All implementations must route appends with
/// [`PartitionKey::partition`] so that producers and consumers on different
/// nodes agree on record placement.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Number of partitions. Fixed for the lifetime of the journal.
    fn partition_count(&self) -> u32;

    /// Appends a record, routed by the partition key.
    ///
    /// Returns the committed position. The append is durable once this
    /// returns; a retry after a lost acknowledgement produces a duplicate
    /// record, which consumers suppress.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the append.
    async fn append(&self, key: &PartitionKey, payload: Bytes) -> Result<JournalPosition>;

    /// Returns the offset one past the last committed record in a partition
    /// (zero for an empty partition).
    ///
    /// # Errors
    ///
    /// Returns an error if the partition is out of range or the backend fails.
    async fn head(&self, partition: u32) -> Result<u64>;

    /// Opens a cursor over one partition starting at `from` (inclusive).
    ///
    /// # Errors
    ///
    /// Returns an error if the partition is out of range or the backend fails.
    async fn cursor(&self, partition: u32, from: u64) -> Result<Box<dyn JournalCursor>>;
}

/// A consumer of a single partition, yielding records in commit order.
///
/// Cursors do not track or persist progress; the consumer owns its offset
/// and persists it through its own storage.
#[async_trait]
pub trait JournalCursor: Send {
    /// Returns the next record, waiting until one is committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn next(&mut self) -> Result<JournalRecord>;
}
