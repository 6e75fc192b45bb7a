use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// In-process async locks keyed by order (or manual receivable) id.
#[derive(Clone, Debug, Default)]
pub struct LedgerLocks {
    locks: Arc<LockMap>,
}

impl LedgerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`; released when the guard drops.
    pub async fn acquire(&self, key: Uuid) -> LedgerGuard {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        LedgerGuard {
            guard: Some(lock.lock_owned().await),
            key,
            locks: Arc::clone(&self.locks),
        }
    }
}

/// Holds one key of [`LedgerLocks`]. The key's entry is evicted once
/// nobody holds or waits for it.
#[derive(Debug)]
pub struct LedgerGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: Uuid,
    locks: Arc<LockMap>,
}

impl Drop for LedgerGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are taken under the shard lock, so a count of one means
        // no other task can still reach this mutex.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = LedgerLocks::new();
        let key = Uuid::new_v4();
        let guard = locks.acquire(key).await;

        let contender = locks.clone();
        let pending = tokio::spawn(async move {
            contender.acquire(key).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = LedgerLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let _b = locks.acquire(Uuid::new_v4()).await;
        assert_eq!(locks.locks.len(), 2);
    }

    #[tokio::test]
    async fn released_keys_are_evicted() {
        let locks = LedgerLocks::new();
        for _ in 0..100 {
            let _guard = locks.acquire(Uuid::new_v4()).await;
        }
        assert!(locks.locks.is_empty());
    }

    #[tokio::test]
    async fn waiting_keys_survive_the_first_release() {
        let locks = LedgerLocks::new();
        let key = Uuid::new_v4();
        let guard = locks.acquire(key).await;

        let contender = locks.clone();
        let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire(key).await;
            acquired_tx.send(()).unwrap();
            release_rx.await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        acquired_rx.await.unwrap();
        assert!(locks.locks.contains_key(&key));

        release_tx.send(()).unwrap();
        waiter.await.unwrap();
        assert!(locks.locks.is_empty());
    }
}
