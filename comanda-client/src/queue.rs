//! Durable pending-operation queue
//!
//! Every local mutation lands here before anything touches the network.
//! Entries are keyed by a monotonically increasing sequence number so the
//! drain replays them in exactly the order the device produced them.
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `pending_ops` | sequence (u64) | JSON `PendingOperation` |
//! | `queue_meta` | "seq" | last assigned sequence |
//!
//! Acked operations are removed. Operations that keep failing stay in the
//! table once their retry count passes the cap; `dead_letters()` surfaces
//! them for manual inspection instead of blocking the queue.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use shared::sync::PendingOperation;

use crate::error::ClientResult;

const PENDING_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("pending_ops");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("queue_meta");

const SEQUENCE_KEY: &str = "seq";

/// Append-only operation queue backed by redb
#[derive(Clone)]
pub struct PendingQueue {
    db: Arc<Database>,
}

impl PendingQueue {
    /// Open or create the queue at the given path
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory queue (for tests)
    pub fn open_in_memory() -> ClientResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> ClientResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PENDING_TABLE)?;
            let mut meta = write_txn.open_table(META_TABLE)?;
            if meta.get(SEQUENCE_KEY)?.is_none() {
                meta.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Append one operation, returning its sequence number
    ///
    /// The enqueue commit is what makes the mutation durable; everything
    /// after it (mirror write, network push) can be redone from here.
    pub fn enqueue(&self, op: &PendingOperation) -> ClientResult<u64> {
        let bytes = serde_json::to_vec(op)?;
        let write_txn = self.db.begin_write()?;
        let seq = {
            let mut meta = write_txn.open_table(META_TABLE)?;
            let next = meta.get(SEQUENCE_KEY)?.map(|g| g.value()).unwrap_or(0) + 1;
            meta.insert(SEQUENCE_KEY, next)?;

            let mut pending = write_txn.open_table(PENDING_TABLE)?;
            pending.insert(next, bytes.as_slice())?;
            next
        };
        write_txn.commit()?;
        Ok(seq)
    }

    /// Queued operations still eligible for upload, in enqueue order
    pub fn unprocessed(&self, max_retries: u32) -> ClientResult<Vec<(u64, PendingOperation)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TABLE)?;
        let mut ops = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let op: PendingOperation = serde_json::from_slice(value.value())?;
            if op.retries < max_retries {
                ops.push((key.value(), op));
            }
        }
        Ok(ops)
    }

    /// Remove acknowledged operations
    pub fn ack(&self, seqs: &[u64]) -> ClientResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_TABLE)?;
            for seq in seqs {
                table.remove(seq)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Count a failed upload attempt against the given operations
    pub fn bump_retry(&self, seqs: &[u64]) -> ClientResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_TABLE)?;
            for seq in seqs {
                let Some(bytes) = table.get(seq)?.map(|g| g.value().to_vec()) else {
                    continue;
                };
                let mut op: PendingOperation = serde_json::from_slice(&bytes)?;
                op.retries += 1;
                let bytes = serde_json::to_vec(&op)?;
                table.insert(seq, bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Operations parked after exhausting their retries
    pub fn dead_letters(&self, max_retries: u32) -> ClientResult<Vec<(u64, PendingOperation)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TABLE)?;
        let mut ops = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let op: PendingOperation = serde_json::from_slice(value.value())?;
            if op.retries >= max_retries {
                ops.push((key.value(), op));
            }
        }
        Ok(ops)
    }

    /// Total queued entries, dead letters included
    pub fn len(&self) -> ClientResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TABLE)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> ClientResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::sync::{EntityKind, OpKind};
    use shared::util::{new_id, now_millis};

    fn make_op(entity_id: &str) -> PendingOperation {
        PendingOperation {
            id: new_id(),
            tenant_id: "demo".into(),
            entity: EntityKind::Order,
            entity_id: entity_id.to_string(),
            op: OpKind::Create,
            payload: serde_json::json!({}),
            client_ts: now_millis(),
            processed: false,
            retries: 0,
        }
    }

    #[test]
    fn drains_in_enqueue_order() {
        let queue = PendingQueue::open_in_memory().unwrap();
        queue.enqueue(&make_op("a")).unwrap();
        queue.enqueue(&make_op("b")).unwrap();
        queue.enqueue(&make_op("c")).unwrap();

        let ops = queue.unprocessed(10).unwrap();
        let ids: Vec<&str> = ops.iter().map(|(_, op)| op.entity_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn ack_removes_entries() {
        let queue = PendingQueue::open_in_memory().unwrap();
        let s1 = queue.enqueue(&make_op("a")).unwrap();
        let s2 = queue.enqueue(&make_op("b")).unwrap();

        queue.ack(&[s1]).unwrap();
        let remaining = queue.unprocessed(10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, s2);
    }

    #[test]
    fn exhausted_retries_move_to_dead_letters() {
        let queue = PendingQueue::open_in_memory().unwrap();
        let seq = queue.enqueue(&make_op("a")).unwrap();

        for _ in 0..3 {
            queue.bump_retry(&[seq]).unwrap();
        }

        assert!(queue.unprocessed(3).unwrap().is_empty());
        let dead = queue.dead_letters(3).unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].1.retries, 3);
        // still counted, never silently dropped
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.redb");

        {
            let queue = PendingQueue::open(&path).unwrap();
            queue.enqueue(&make_op("a")).unwrap();
            queue.enqueue(&make_op("b")).unwrap();
        }

        // simulated restart
        let queue = PendingQueue::open(&path).unwrap();
        let ops = queue.unprocessed(10).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].1.entity_id, "a");

        // sequence counter picked up where it left off
        let s3 = queue.enqueue(&make_op("c")).unwrap();
        assert_eq!(s3, 3);
    }

    #[test]
    fn sequence_survives_ack() {
        let queue = PendingQueue::open_in_memory().unwrap();
        let s1 = queue.enqueue(&make_op("a")).unwrap();
        queue.ack(&[s1]).unwrap();
        let s2 = queue.enqueue(&make_op("b")).unwrap();
        assert!(s2 > s1);
    }
}
