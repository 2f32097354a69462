//! Per-thread async locks
//!
//! [`ThreadLocks`] hands out one async mutex per conversation thread so that operations on
//! the same thread run one at a time while different threads never contend. An entry lives
//! only while somebody holds or waits for it: the last [`ThreadGuard`] to be released
//! removes it from the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<Mutex<()>>>;

/// Map of per-thread async locks
#[derive(Debug, Default)]
pub struct ThreadLocks {
    map: SyncMutex<LockMap>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread_id`
    pub async fn acquire(&self, thread_id: &str) -> ThreadGuard<'_> {
        let lock = {
            let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = lock.clone().lock_owned().await;
        ThreadGuard {
            locks: self,
            thread_id: thread_id.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// Number of threads currently held or awaited
    pub fn len(&self) -> usize {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one thread, released on drop
#[derive(Debug)]
pub struct ThreadGuard<'a> {
    locks: &'a ThreadLocks,
    thread_id: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ThreadGuard<'_> {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut map = self.locks.map.lock().unwrap_or_else(PoisonError::into_inner);
        // Two references left: the map entry and ours. Waiters hold their own clones.
        let idle = map
            .get(&self.thread_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(entry) == 2);
        if idle {
            map.remove(&self.thread_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_dropped_after_release() {
        let locks = ThreadLocks::new();
        {
            let guard = locks.acquire("t1").await;
            assert_eq!(guard.thread_id(), "t1");
            let _other = locks.acquire("t2").await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());

        for _ in 0..3 {
            let _guard = locks.acquire("t1").await;
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_kept_while_another_task_waits() {
        let locks = Arc::new(ThreadLocks::new());
        let first = locks.acquire("shared").await;

        let waiter = tokio::spawn({
            let locks = locks.clone();
            async move {
                let _guard = locks.acquire("shared").await;
                locks.len()
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        assert_eq!(waiter.await.unwrap(), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_thread_is_exclusive() {
        let locks = Arc::new(ThreadLocks::new());
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let _guard = locks.acquire("t").await;
                    let inside = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    assert_eq!(inside, 0);
                    tokio::task::yield_now().await;
                    counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(locks.is_empty());
    }
}
