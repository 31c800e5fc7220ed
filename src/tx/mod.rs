mod error;
mod lock;
mod wal;

pub use error::{TxError, TxResult};
pub use lock::{LockManager, LockType};
pub use wal::{WalManager, WalRecord};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::file::PageId;

/// Transaction ID type
pub type TransactionId = u32;

/// Lifecycle of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

#[derive(Debug)]
pub struct Transaction {
    pub id: TransactionId,
    pub state: TransactionState,
}

struct TxTable {
    transactions: HashMap<TransactionId, Transaction>,
    next_tid: TransactionId,
}

/// Coordinates transaction lifecycles: owns the transaction table, the
/// lock manager and the WAL. Lifecycle records reach the log, and are
/// flushed, before the corresponding call returns.
pub struct TransactionManager {
    state: Mutex<TxTable>,
    locks: LockManager,
    wal: WalManager,
}

impl TransactionManager {
    /// Create a manager logging to `log_path`. Opening parses any existing
    /// log; records are not replayed.
    pub fn open<P: AsRef<Path>>(log_path: P) -> TxResult<Self> {
        Ok(Self {
            state: Mutex::new(TxTable {
                transactions: HashMap::new(),
                next_tid: 1,
            }),
            locks: LockManager::new(),
            wal: WalManager::open(log_path)?,
        })
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Start a transaction: allocate the next id and log `BEGIN`.
    pub fn begin(&self) -> TxResult<TransactionId> {
        let mut state = self.state.lock().expect("transaction table poisoned");
        let tid = state.next_tid;
        state.next_tid += 1;
        state.transactions.insert(
            tid,
            Transaction {
                id: tid,
                state: TransactionState::Active,
            },
        );
        self.wal.log_begin(tid)?;
        Ok(tid)
    }

    /// Commit: release the transaction's locks, mark it committed and log
    /// `COMMIT`.
    pub fn commit(&self, tid: TransactionId) -> TxResult<()> {
        self.finish(tid, TransactionState::Committed)
    }

    /// Abort: release the transaction's locks, mark it aborted and log
    /// `ABORT`.
    pub fn abort(&self, tid: TransactionId) -> TxResult<()> {
        self.finish(tid, TransactionState::Aborted)
    }

    fn finish(&self, tid: TransactionId, target: TransactionState) -> TxResult<()> {
        let mut state = self.state.lock().expect("transaction table poisoned");
        let tx = state
            .transactions
            .get_mut(&tid)
            .ok_or(TxError::UnknownTransaction(tid))?;
        if tx.state != TransactionState::Active {
            return Err(TxError::NotActive(tid));
        }
        tx.state = target;

        self.locks.release_all_locks(tid);
        match target {
            TransactionState::Committed => self.wal.log_commit(tid)?,
            _ => self.wal.log_abort(tid)?,
        }
        Ok(())
    }

    /// Append a `CHECKPOINT` record.
    pub fn checkpoint(&self) -> TxResult<()> {
        self.wal.log_checkpoint()
    }

    pub fn acquire_lock(&self, page_id: PageId, lock_type: LockType, tid: TransactionId) -> bool {
        self.locks.acquire_lock(page_id, lock_type, tid)
    }

    pub fn release_lock(&self, page_id: PageId, tid: TransactionId) {
        self.locks.release_lock(page_id, tid)
    }

    pub fn is_active(&self, tid: TransactionId) -> bool {
        self.state_of(tid) == Some(TransactionState::Active)
    }

    pub fn state_of(&self, tid: TransactionId) -> Option<TransactionState> {
        let state = self.state.lock().expect("transaction table poisoned");
        state.transactions.get(&tid).map(|tx| tx.state)
    }

    pub fn active_count(&self) -> usize {
        let state = self.state.lock().expect("transaction table poisoned");
        state
            .transactions
            .values()
            .filter(|tx| tx.state == TransactionState::Active)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TransactionManager) {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = TransactionManager::open(temp_dir.path().join("test.db.log")).unwrap();
        (temp_dir, manager)
    }

    #[test]
    fn test_begin_assigns_increasing_ids() {
        let (_temp_dir, manager) = setup();
        assert_eq!(manager.begin().unwrap(), 1);
        assert_eq!(manager.begin().unwrap(), 2);
        assert_eq!(manager.active_count(), 2);
    }

    #[test]
    fn test_commit_lifecycle_and_wal_framing() {
        let (_temp_dir, manager) = setup();

        let tid = manager.begin().unwrap();
        assert!(manager.is_active(tid));

        manager.commit(tid).unwrap();
        assert!(!manager.is_active(tid));
        assert_eq!(manager.state_of(tid), Some(TransactionState::Committed));

        let records = manager.wal().scan().unwrap();
        assert_eq!(records, vec![WalRecord::Begin(tid), WalRecord::Commit(tid)]);
    }

    #[test]
    fn test_abort_lifecycle() {
        let (_temp_dir, manager) = setup();

        let tid = manager.begin().unwrap();
        manager.abort(tid).unwrap();
        assert_eq!(manager.state_of(tid), Some(TransactionState::Aborted));
        assert_eq!(manager.active_count(), 0);

        let records = manager.wal().scan().unwrap();
        assert_eq!(records, vec![WalRecord::Begin(tid), WalRecord::Abort(tid)]);
    }

    #[test]
    fn test_finish_requires_active_transaction() {
        let (_temp_dir, manager) = setup();

        assert!(matches!(
            manager.commit(42),
            Err(TxError::UnknownTransaction(42))
        ));

        let tid = manager.begin().unwrap();
        manager.commit(tid).unwrap();
        assert!(matches!(manager.commit(tid), Err(TxError::NotActive(_))));
        assert!(matches!(manager.abort(tid), Err(TxError::NotActive(_))));
    }

    #[test]
    fn test_commit_releases_locks() {
        let (_temp_dir, manager) = setup();

        let tid = manager.begin().unwrap();
        assert!(manager.acquire_lock(1, LockType::Exclusive, tid));
        assert!(manager.acquire_lock(2, LockType::Shared, tid));
        assert_eq!(manager.locks().locked_pages(tid), vec![1, 2]);

        manager.commit(tid).unwrap();
        assert!(manager.locks().locked_pages(tid).is_empty());

        let other = manager.begin().unwrap();
        assert!(manager.acquire_lock(1, LockType::Exclusive, other));
    }

    #[test]
    fn test_checkpoint_record() {
        let (_temp_dir, manager) = setup();
        manager.checkpoint().unwrap();
        assert_eq!(manager.wal().scan().unwrap(), vec![WalRecord::Checkpoint]);
    }
}
