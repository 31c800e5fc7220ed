use std::collections::HashMap;
use std::sync::Mutex;

use crate::file::PageId;

use super::TransactionId;

/// Lock modes on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockType {
    /// Compatible with other shared locks
    Shared,
    /// Conflicts with any other lock
    Exclusive,
}

#[derive(Debug, Clone)]
struct LockRequest {
    lock_type: LockType,
    tid: TransactionId,
    granted: bool,
}

/// Page-level shared/exclusive lock table.
///
/// Degenerate by design: a conflicting request is queued ungranted and
/// `acquire_lock` simply returns `false`; there is no wait/wake mechanism,
/// so callers must treat a refusal as theirs to retry. This cannot
/// serialize concurrent writers on its own — the engine above runs one
/// transaction at a time.
pub struct LockManager {
    table: Mutex<HashMap<PageId, Vec<LockRequest>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Try to lock `page_id` for `tid`. Returns whether the lock is held
    /// after the call. A transaction holding SHARED is upgraded to
    /// EXCLUSIVE when no other transaction holds the page.
    pub fn acquire_lock(&self, page_id: PageId, lock_type: LockType, tid: TransactionId) -> bool {
        let mut table = self.table.lock().expect("lock table poisoned");
        let requests = table.entry(page_id).or_default();

        if let Some(pos) = requests.iter().position(|r| r.tid == tid) {
            if requests[pos].lock_type == LockType::Shared
                && lock_type == LockType::Exclusive
                && requests[pos].granted
            {
                let other_holder = requests.iter().any(|r| r.granted && r.tid != tid);
                if !other_holder {
                    requests[pos].lock_type = LockType::Exclusive;
                    return true;
                }
                return false;
            }
            return requests[pos].granted;
        }

        let conflict = requests.iter().any(|r| {
            r.granted && (lock_type == LockType::Exclusive || r.lock_type == LockType::Exclusive)
        });

        requests.push(LockRequest {
            lock_type,
            tid,
            granted: !conflict,
        });
        !conflict
    }

    /// Drop every request `tid` holds on `page_id`.
    pub fn release_lock(&self, page_id: PageId, tid: TransactionId) {
        let mut table = self.table.lock().expect("lock table poisoned");
        if let Some(requests) = table.get_mut(&page_id) {
            requests.retain(|r| r.tid != tid);
            if requests.is_empty() {
                table.remove(&page_id);
            }
        }
    }

    /// Drop every request owned by `tid`, on every page.
    pub fn release_all_locks(&self, tid: TransactionId) {
        let mut table = self.table.lock().expect("lock table poisoned");
        table.retain(|_, requests| {
            requests.retain(|r| r.tid != tid);
            !requests.is_empty()
        });
    }

    pub fn has_lock(&self, page_id: PageId, tid: TransactionId) -> bool {
        let table = self.table.lock().expect("lock table poisoned");
        table
            .get(&page_id)
            .is_some_and(|requests| requests.iter().any(|r| r.tid == tid && r.granted))
    }

    /// Pages on which `tid` holds a granted lock, sorted.
    pub fn locked_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock().expect("lock table poisoned");
        let mut pages: Vec<PageId> = table
            .iter()
            .filter(|(_, requests)| requests.iter().any(|r| r.tid == tid && r.granted))
            .map(|(&page_id, _)| page_id)
            .collect();
        pages.sort();
        pages
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_locks_are_compatible() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Shared, 1));
        assert!(locks.acquire_lock(1, LockType::Shared, 2));
        assert!(locks.has_lock(1, 1));
        assert!(locks.has_lock(1, 2));
    }

    #[test]
    fn test_exclusive_conflicts_with_shared() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Shared, 1));
        assert!(!locks.acquire_lock(1, LockType::Exclusive, 2));
        assert!(!locks.has_lock(1, 2));
    }

    #[test]
    fn test_shared_conflicts_with_exclusive() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Exclusive, 1));
        assert!(!locks.acquire_lock(1, LockType::Shared, 2));
    }

    #[test]
    fn test_reacquire_reports_granted_state() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Shared, 1));
        assert!(locks.acquire_lock(1, LockType::Shared, 1));

        assert!(locks.acquire_lock(2, LockType::Exclusive, 1));
        assert!(!locks.acquire_lock(2, LockType::Exclusive, 2));
        // The queued, ungranted request stays refused
        assert!(!locks.acquire_lock(2, LockType::Exclusive, 2));
    }

    #[test]
    fn test_upgrade_when_sole_holder() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Shared, 1));
        assert!(locks.acquire_lock(1, LockType::Exclusive, 1));

        // Now exclusive: another shared request must be refused
        assert!(!locks.acquire_lock(1, LockType::Shared, 2));
    }

    #[test]
    fn test_upgrade_refused_with_other_holder() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Shared, 1));
        assert!(locks.acquire_lock(1, LockType::Shared, 2));
        assert!(!locks.acquire_lock(1, LockType::Exclusive, 1));
        // The shared lock is still held
        assert!(locks.has_lock(1, 1));
    }

    #[test]
    fn test_release_lock() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Exclusive, 1));
        locks.release_lock(1, 1);
        assert!(!locks.has_lock(1, 1));
        assert!(locks.acquire_lock(1, LockType::Exclusive, 2));
    }

    #[test]
    fn test_release_all_locks() {
        let locks = LockManager::new();
        assert!(locks.acquire_lock(1, LockType::Shared, 1));
        assert!(locks.acquire_lock(2, LockType::Exclusive, 1));
        assert!(locks.acquire_lock(3, LockType::Shared, 2));
        assert_eq!(locks.locked_pages(1), vec![1, 2]);

        locks.release_all_locks(1);
        assert!(locks.locked_pages(1).is_empty());
        // Other transactions keep their locks
        assert_eq!(locks.locked_pages(2), vec![3]);
        // The released pages are free again
        assert!(locks.acquire_lock(2, LockType::Exclusive, 2));
    }
}
