//! `oplog`: per-transaction operation log. A tagged `enum` record held in
//! an owned `Vec`, and a table of one log per read/write transaction id,
//! array-of-locks style (one `SpinMutex<Vec<OpRecord>>` per slot).

use crate::config::MAX_RW_TX;
use crate::sync::SpinMutex;

/// One entry in a transaction's operation log, in the order performed.
///
/// Appended by `read`/`write`/`alloc`/`free`, walked head-to-tail at
/// `leave` time to finalize a commit or roll back an abort.
#[derive(Clone, Copy, Debug)]
pub(crate) enum OpRecord {
    Read { seg_id: u8, offset: u64, len: u64 },
    Write { seg_id: u8, offset: u64, len: u64 },
    Alloc { seg_id: u8 },
    Free { seg_id: u8 },
}

/// One `Vec<OpRecord>` per possible read/write transaction id.
///
/// Read-only transactions never log anything — they never mutate state
/// and never need rollback — so the table is sized `MAX_RW_TX`, not
/// `MAX_RW_TX + 1`.
pub(crate) struct LogTable {
    slots: Vec<SpinMutex<Vec<OpRecord>>>,
}

impl LogTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: (0..MAX_RW_TX).map(|_| SpinMutex::new(Vec::new())).collect(),
        }
    }

    /// Append a record to `tx`'s log. `tx` must be a read/write id
    /// (`< MAX_RW_TX`); the caller (the `txn` module) never calls this for
    /// read-only ids.
    pub(crate) fn push(&self, tx: u32, record: OpRecord) {
        self.slots[tx as usize].lock().push(record);
    }

    /// Remove and return every record logged for `tx`, in order, leaving
    /// its log empty.
    pub(crate) fn take(&self, tx: u32) -> Vec<OpRecord> {
        std::mem::take(&mut *self.slots[tx as usize].lock())
    }

    /// Clear every slot. Called once per epoch boundary as a defensive
    /// sweep even though a well-behaved caller always empties its own log
    /// via `take` at `leave` time.
    pub(crate) fn clear_all(&self) {
        for slot in &self.slots {
            slot.lock().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_take_preserves_order() {
        let table = LogTable::new();
        table.push(0, OpRecord::Alloc { seg_id: 2 });
        table.push(0, OpRecord::Write { seg_id: 2, offset: 0, len: 8 });

        let records = table.take(0);
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], OpRecord::Alloc { seg_id: 2 }));
        assert!(matches!(records[1], OpRecord::Write { seg_id: 2, offset: 0, len: 8 }));
    }

    #[test]
    fn take_empties_the_slot() {
        let table = LogTable::new();
        table.push(1, OpRecord::Free { seg_id: 3 });
        let _ = table.take(1);
        assert!(table.take(1).is_empty());
    }

    #[test]
    fn slots_are_independent() {
        let table = LogTable::new();
        table.push(0, OpRecord::Alloc { seg_id: 1 });
        assert!(table.take(1).is_empty());
        assert_eq!(table.take(0).len(), 1);
    }

    #[test]
    fn clear_all_empties_every_slot() {
        let table = LogTable::new();
        table.push(0, OpRecord::Alloc { seg_id: 1 });
        table.push(5, OpRecord::Free { seg_id: 2 });
        table.clear_all();
        assert!(table.take(0).is_empty());
        assert!(table.take(5).is_empty());
    }
}
