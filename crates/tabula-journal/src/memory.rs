//! In-memory journal implementation for tests and local development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence, no distribution
//! - **Single-process only**: Records are not visible across process boundaries
//! - **Unbounded retention**: Records are kept for the life of the process,
//!   which is exactly what full-replay bootstrap tests need

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::error::{JournalError, Result};
use crate::partition::PartitionKey;
use crate::{Journal, JournalCursor, JournalPosition, JournalRecord};

/// Converts a lock poison error to a backend error.
fn poison_err<T>(_: PoisonError<T>) -> JournalError {
    JournalError::backend("journal lock poisoned")
}

#[derive(Debug, Default)]
struct PartitionLog {
    records: RwLock<Vec<Bytes>>,
    notify: Notify,
}

/// In-memory journal.
///
/// Thread-safe; cursors observe appends from any task in the process.
/// Every cursor gets its own view of the full partition history, so several
/// nodes in one test can consume the same journal independently.
///
/// ## Example
///
/// ```rust
/// use tabula_journal::MemoryJournal;
///
/// let journal = MemoryJournal::new(8);
/// assert_eq!(tabula_journal::Journal::partition_count(&journal), 8);
/// ```
#[derive(Debug)]
pub struct MemoryJournal {
    partitions: Vec<Arc<PartitionLog>>,
}

impl MemoryJournal {
    /// Creates a journal with the given number of partitions.
    ///
    /// # Panics
    ///
    /// Panics if `partition_count` is zero.
    #[must_use]
    pub fn new(partition_count: u32) -> Self {
        assert!(partition_count > 0, "journal must have at least one partition");
        let partitions = (0..partition_count)
            .map(|_| Arc::new(PartitionLog::default()))
            .collect();
        Self { partitions }
    }

    fn log(&self, partition: u32) -> Result<&Arc<PartitionLog>> {
        self.partitions.get(partition as usize).ok_or_else(|| {
            JournalError::PartitionOutOfRange {
                partition,
                count: self.partition_count(),
            }
        })
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    fn partition_count(&self) -> u32 {
        u32::try_from(self.partitions.len()).unwrap_or(u32::MAX)
    }

    async fn append(&self, key: &PartitionKey, payload: Bytes) -> Result<JournalPosition> {
        let partition = key.partition(self.partition_count());
        let log = self.log(partition)?;

        let offset = {
            let mut records = log.records.write().map_err(poison_err)?;
            records.push(payload);
            records.len() as u64 - 1
        };
        log.notify.notify_waiters();

        Ok(JournalPosition { partition, offset })
    }

    async fn head(&self, partition: u32) -> Result<u64> {
        let log = self.log(partition)?;
        let records = log.records.read().map_err(poison_err)?;
        Ok(records.len() as u64)
    }

    async fn cursor(&self, partition: u32, from: u64) -> Result<Box<dyn JournalCursor>> {
        let log = Arc::clone(self.log(partition)?);
        Ok(Box::new(MemoryCursor {
            log,
            partition,
            next_offset: from,
        }))
    }
}

struct MemoryCursor {
    log: Arc<PartitionLog>,
    partition: u32,
    next_offset: u64,
}

#[async_trait]
impl JournalCursor for MemoryCursor {
    async fn next(&mut self) -> Result<JournalRecord> {
        loop {
            // Register for wakeups before checking, otherwise an append
            // racing between the check and the await would be missed.
            let notified = self.log.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let existing = {
                let records = self.log.records.read().map_err(poison_err)?;
                records.get(self.next_offset as usize).cloned()
            };

            if let Some(payload) = existing {
                let record = JournalRecord {
                    position: JournalPosition {
                        partition: self.partition,
                        offset: self.next_offset,
                    },
                    payload,
                };
                self.next_offset += 1;
                return Ok(record);
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn key(raw: &str) -> PartitionKey {
        PartitionKey::new(raw).unwrap()
    }

    #[tokio::test]
    async fn append_assigns_sequential_offsets() {
        let journal = MemoryJournal::new(1);
        let k = key("t/groups/g");

        let first = journal.append(&k, Bytes::from_static(b"a")).await.unwrap();
        let second = journal.append(&k, Bytes::from_static(b"b")).await.unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        assert_eq!(first.partition, second.partition);
    }

    #[tokio::test]
    async fn same_key_routes_to_same_partition() {
        let journal = MemoryJournal::new(16);
        let k = key("acme/groups/orders");

        let a = journal.append(&k, Bytes::from_static(b"a")).await.unwrap();
        let b = journal.append(&k, Bytes::from_static(b"b")).await.unwrap();

        assert_eq!(a.partition, b.partition);
        assert_eq!(a.partition, k.partition(16));
    }

    #[tokio::test]
    async fn cursor_reads_in_commit_order() {
        let journal = MemoryJournal::new(1);
        let k = key("t/groups/g");
        for payload in [&b"a"[..], b"b", b"c"] {
            journal.append(&k, Bytes::copy_from_slice(payload)).await.unwrap();
        }

        let mut cursor = journal.cursor(0, 0).await.unwrap();
        for (offset, expected) in [&b"a"[..], b"b", b"c"].iter().enumerate() {
            let record = cursor.next().await.unwrap();
            assert_eq!(record.position.offset, offset as u64);
            assert_eq!(&record.payload[..], *expected);
        }
    }

    #[tokio::test]
    async fn cursor_waits_for_new_records() {
        let journal = Arc::new(MemoryJournal::new(1));
        let mut cursor = journal.cursor(0, 0).await.unwrap();

        let reader = tokio::spawn(async move { cursor.next().await.unwrap() });

        // Give the reader a chance to start waiting before the append lands.
        tokio::task::yield_now().await;
        journal
            .append(&key("t/groups/g"), Bytes::from_static(b"late"))
            .await
            .unwrap();

        let record = timeout(Duration::from_secs(1), reader)
            .await
            .expect("cursor should wake on append")
            .unwrap();
        assert_eq!(&record.payload[..], b"late");
    }

    #[tokio::test]
    async fn cursor_can_start_mid_stream() {
        let journal = MemoryJournal::new(1);
        let k = key("t/groups/g");
        for payload in [&b"a"[..], b"b", b"c"] {
            journal.append(&k, Bytes::copy_from_slice(payload)).await.unwrap();
        }

        let mut cursor = journal.cursor(0, 2).await.unwrap();
        let record = cursor.next().await.unwrap();
        assert_eq!(record.position.offset, 2);
        assert_eq!(&record.payload[..], b"c");
    }

    #[tokio::test]
    async fn independent_cursors_see_all_records() {
        let journal = MemoryJournal::new(1);
        let k = key("t/groups/g");
        journal.append(&k, Bytes::from_static(b"a")).await.unwrap();

        let mut first = journal.cursor(0, 0).await.unwrap();
        let mut second = journal.cursor(0, 0).await.unwrap();

        assert_eq!(&first.next().await.unwrap().payload[..], b"a");
        assert_eq!(&second.next().await.unwrap().payload[..], b"a");
    }

    #[tokio::test]
    async fn head_tracks_appends() {
        let journal = MemoryJournal::new(1);
        assert_eq!(journal.head(0).await.unwrap(), 0);

        journal
            .append(&key("t/groups/g"), Bytes::from_static(b"a"))
            .await
            .unwrap();
        assert_eq!(journal.head(0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn out_of_range_partition_is_rejected() {
        let journal = MemoryJournal::new(2);
        let err = journal.head(7).await.unwrap_err();
        assert!(matches!(
            err,
            JournalError::PartitionOutOfRange { partition: 7, count: 2 }
        ));
        assert!(journal.cursor(2, 0).await.is_err());
    }
}
