//! Named TTL locks for cross-request mutual exclusion
//!
//! Advisory locks keyed by string, used to serialize order creation,
//! order state transitions and webhook settlement. Every lock carries a
//! TTL so a crashed holder can never deadlock the key: once the TTL
//! elapses the entry may be taken over by the next waiter. A guard only
//! releases the entry if its fencing token still owns it, so a takeover
//! victim cannot free the new holder's lock on drop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use uuid::Uuid;

/// Polling interval while waiting for a held lock
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum LockError {
    /// The wait budget elapsed before the lock could be acquired
    #[error("timed out waiting for lock '{key}'")]
    Timeout { key: String },
}

#[derive(Debug, Clone)]
struct LockEntry {
    token: Uuid,
    expires_at: Instant,
}

/// In-process named lock table
#[derive(Debug, Default)]
pub struct LockCoordinator {
    entries: DashMap<String, LockEntry>,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Acquire `key` within `wait`, holding it for at most `ttl`.
    ///
    /// Returns a guard that releases the lock on drop. An entry whose
    /// TTL has elapsed is treated as abandoned and taken over.
    pub async fn acquire(
        self: &Arc<Self>,
        key: &str,
        ttl: Duration,
        wait: Duration,
    ) -> Result<LockGuard, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(token) = self.try_acquire(key, ttl) {
                return Ok(LockGuard {
                    coordinator: Arc::clone(self),
                    key: key.to_string(),
                    token,
                });
            }
            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    key: key.to_string(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Single attempt; returns the fencing token on success
    fn try_acquire(&self, key: &str, ttl: Duration) -> Option<Uuid> {
        let now = Instant::now();
        let token = Uuid::new_v4();
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(LockEntry {
                    token,
                    expires_at: now + ttl,
                });
                Some(token)
            }
            Entry::Occupied(mut held) => {
                if held.get().expires_at <= now {
                    // Holder overran its TTL, take the key over
                    tracing::warn!(key, "lock expired, taking over");
                    held.insert(LockEntry {
                        token,
                        expires_at: now + ttl,
                    });
                    Some(token)
                } else {
                    None
                }
            }
        }
    }

    /// Release only if `token` still owns the entry
    fn release(&self, key: &str, token: Uuid) {
        self.entries.remove_if(key, |_, entry| entry.token == token);
    }

    /// Whether the key is currently held (unexpired)
    pub fn is_held(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|e| e.expires_at > Instant::now())
            .unwrap_or(false)
    }
}

/// RAII handle for an acquired lock
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockGuard {
    coordinator: Arc<LockCoordinator>,
    key: String,
    token: Uuid,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.coordinator.release(&self.key, self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> Arc<LockCoordinator> {
        Arc::new(LockCoordinator::new())
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let locks = coordinator();
        let guard = locks
            .acquire("a", Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(locks.is_held("a"));
        drop(guard);
        assert!(!locks.is_held("a"));
    }

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let locks = coordinator();
        let _guard = locks
            .acquire("a", Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();
        let err = locks
            .acquire("a", Duration::from_secs(5), Duration::from_millis(120))
            .await;
        assert!(matches!(err, Err(LockError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_independent_keys_do_not_block() {
        let locks = coordinator();
        let _a = locks
            .acquire("a", Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();
        let b = locks
            .acquire("b", Duration::from_secs(5), Duration::from_millis(10))
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let locks = coordinator();
        let stale = locks
            .acquire("a", Duration::from_millis(20), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // TTL elapsed: a new waiter may take the key
        let fresh = locks
            .acquire("a", Duration::from_secs(5), Duration::from_millis(200))
            .await
            .unwrap();
        assert!(locks.is_held("a"));

        // The overrun holder's drop must not free the new holder's lock
        drop(stale);
        assert!(locks.is_held("a"));
        drop(fresh);
        assert!(!locks.is_held("a"));
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let locks = coordinator();
        let guard = locks
            .acquire("a", Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();

        let locks2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            locks2
                .acquire("a", Duration::from_secs(5), Duration::from_secs(2))
                .await
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        drop(guard);

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }
}
