//! Per-session critical sections.
//!
//! Mutations of one interaction are serialized so two participants writing
//! at once cannot interleave a stale read-modify-write. Different sessions
//! never contend. Entries are dropped once no task holds or awaits them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Keyed async mutexes, one per session ID.
#[derive(Debug, Default, Clone)]
pub struct SessionLocks {
    locks: Arc<LockMap>,
}

/// Held for the duration of one session mutation.
#[derive(Debug)]
pub struct SessionGuard {
    key: String,
    locks: Arc<LockMap>,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let mutex = Arc::clone(
            self.locks
                .entry(session_id.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = mutex.lock_owned().await;
        SessionGuard {
            key: session_id.to_owned(),
            locks: Arc::clone(&self.locks),
            _guard: guard,
        }
    }

    /// Sessions with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no session is locked or awaited.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // map + this guard are the only holders when nobody is waiting
        let _ = self
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn entry_is_dropped_after_release() {
        let locks = SessionLocks::new();
        {
            let _guard = locks.lock("int_1").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn same_session_is_serialized() {
        let locks = SessionLocks::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = locks.lock("int_1").await;
        let waiter = {
            let locks = locks.clone();
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let _guard = locks.lock("int_1").await;
                log.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        log.lock().push("first");
        drop(first);
        waiter.await.unwrap();

        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_sessions_do_not_contend() {
        let locks = SessionLocks::new();
        let _a = locks.lock("int_1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("int_2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
