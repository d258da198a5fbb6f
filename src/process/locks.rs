use std::collections::HashMap;
use std::sync::{Arc, Mutex as TableMutex, MutexGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = HashMap<String, Arc<Mutex<()>>>;

/// Per-process mutual exclusion for read-modify-write cycles.
/// Distinct process ids never contend with each other.
#[derive(Debug, Default)]
pub struct ProcessLocks {
    locks: Arc<TableMutex<LockTable>>,
}

/// Held for the duration of one read-modify-write on a process.
/// Dropping the last guard for an id removes its table entry.
#[derive(Debug)]
pub struct ProcessLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    process_id: String,
    lock: Arc<Mutex<()>>,
    table: Arc<TableMutex<LockTable>>,
}

fn lock_table(table: &TableMutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProcessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, process_id: &str) -> ProcessLockGuard {
        let lock = lock_table(&self.locks)
            .entry(process_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;

        ProcessLockGuard {
            guard: Some(guard),
            process_id: process_id.to_string(),
            lock,
            table: self.locks.clone(),
        }
    }

    /// Drop entries nobody is holding or waiting on
    pub fn prune(&self) -> usize {
        let mut locks = lock_table(&self.locks);
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        lock_table(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ProcessLockGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = lock_table(&self.table);
        // the table and this guard are the only owners: nobody else is waiting
        let idle = locks
            .get(&self.process_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(&self.lock) == 2);
        if idle {
            locks.remove(&self.process_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_process_is_serialized() {
        let locks = Arc::new(ProcessLocks::new());
        let guard = locks.acquire("p1").await;

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire("p1").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_processes_do_not_contend() {
        let locks = ProcessLocks::new();
        let _a = locks.acquire("p1").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("p2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_leave_the_table() {
        let locks = ProcessLocks::new();
        for i in 0..100 {
            let _g = locks.acquire(&format!("p{i}")).await;
        }
        assert!(locks.is_empty());

        let held = locks.acquire("p1").await;
        assert_eq!(locks.len(), 1);
        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_someone_waits() {
        let locks = Arc::new(ProcessLocks::new());
        let first = locks.acquire("p1").await;

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire("p1").await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        let third = tokio::time::timeout(Duration::from_millis(10), locks.acquire("p1")).await;
        assert!(third.is_err());

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_prune_idle_locks() {
        let locks = ProcessLocks::new();
        let _held = locks.acquire("p2").await;
        assert_eq!(locks.prune(), 0);
        assert_eq!(locks.len(), 1);
    }
}
