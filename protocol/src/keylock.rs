//! # Per-Key Spend Lock
//!
//! Serializes transaction construction per pk-hash. Two tasks spending from
//! the same key run one after the other; tasks spending from different keys
//! never wait on each other.
//!
//! ## Design
//!
//! - The lock table is a `DashMap<PkHash, Arc<tokio::sync::Mutex<()>>>`.
//!   Entries are created on first use and never removed, so the mutex a
//!   waiter is queued on is always the one the next acquirer will see.
//! - `acquire` returns a [`KeyGuard`] that owns the mutex guard. Release is
//!   the guard's `Drop`: early `?` returns, panics, and cancelled futures
//!   all unlock.
//! - The map shard lock is held only long enough to clone the `Arc`; the
//!   wait happens on the per-key mutex.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::crypto::keys::PkHash;

/// Table of per-key mutual exclusion locks.
#[derive(Debug, Default)]
pub struct KeyLock {
    locks: DashMap<PkHash, Arc<Mutex<()>>>,
}

impl KeyLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, pk_hash: &PkHash) -> Arc<Mutex<()>> {
        self.locks
            .entry(*pk_hash)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Waits until no other holder has the lock for `pk_hash`, then takes it.
    ///
    /// Waiters are served in FIFO order. There is no timeout; wrap the call
    /// in `tokio::time::timeout` if one is needed.
    pub async fn acquire(&self, pk_hash: PkHash) -> KeyGuard {
        let mutex = self.mutex_for(&pk_hash);
        let guard = mutex.lock_owned().await;
        trace!(%pk_hash, "key lock acquired");
        KeyGuard {
            pk_hash,
            _guard: guard,
        }
    }

    /// Takes the lock only if it is free right now.
    pub fn try_acquire(&self, pk_hash: PkHash) -> Option<KeyGuard> {
        let mutex = self.mutex_for(&pk_hash);
        let guard = mutex.try_lock_owned().ok()?;
        Some(KeyGuard {
            pk_hash,
            _guard: guard,
        })
    }

    /// Whether some holder currently has the lock for `pk_hash`.
    pub fn is_locked(&self, pk_hash: &PkHash) -> bool {
        match self.locks.get(pk_hash) {
            Some(mutex) => mutex.try_lock().is_err(),
            None => false,
        }
    }

    /// Number of keys that have ever been locked.
    pub fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive hold on one key's lock. Dropping it releases the lock.
pub struct KeyGuard {
    pk_hash: PkHash,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn pk_hash(&self) -> PkHash {
        self.pk_hash
    }

    /// Releases the lock. Equivalent to dropping the guard.
    pub fn release(self) {
        trace!(pk_hash = %self.pk_hash, "key lock released");
    }
}

impl fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard")
            .field("pk_hash", &self.pk_hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(n: u8) -> PkHash {
        PkHash::from_bytes([n; 20])
    }

    #[tokio::test]
    async fn second_acquirer_waits_for_release() {
        let lock = KeyLock::new();
        let guard = lock.acquire(key(1)).await;
        assert!(lock.is_locked(&key(1)));

        let blocked = tokio::time::timeout(Duration::from_millis(50), lock.acquire(key(1))).await;
        assert!(blocked.is_err());

        guard.release();
        assert!(!lock.is_locked(&key(1)));
        let _again = lock.acquire(key(1)).await;
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let lock = KeyLock::new();
        let _a = lock.acquire(key(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(50), lock.acquire(key(2))).await;
        assert!(b.is_ok());
        assert_eq!(lock.tracked_keys(), 2);
    }

    #[tokio::test]
    async fn lock_is_keyed_by_value() {
        let lock = KeyLock::new();
        let _held = lock.acquire(PkHash::from_bytes([7u8; 20])).await;
        assert!(lock.try_acquire(PkHash::from_bytes([7u8; 20])).is_none());
        assert_eq!(lock.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn error_path_releases() {
        async fn failing(lock: &KeyLock) -> Result<(), &'static str> {
            let _guard = lock.acquire(key(3)).await;
            Err::<(), _>("boom")?;
            Ok(())
        }

        let lock = KeyLock::new();
        assert!(failing(&lock).await.is_err());
        assert!(!lock.is_locked(&key(3)));
    }

    #[tokio::test]
    async fn cancelled_holder_releases() {
        let lock = Arc::new(KeyLock::new());
        let held = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                let _guard = lock.acquire(key(4)).await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        };
        while !lock.is_locked(&key(4)) {
            tokio::task::yield_now().await;
        }
        held.abort();
        let _ = held.await;
        assert!(lock.try_acquire(key(4)).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn holders_never_overlap() {
        let lock = Arc::new(KeyLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _guard = lock.acquire(key(5)).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
