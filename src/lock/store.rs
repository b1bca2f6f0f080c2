//! Key/value backend for distributed-style account locks
//!
//! A lock is an entry `key -> token` with a time-to-live. Acquisition is an
//! atomic set-if-absent; release is an atomic compare-and-delete on the
//! token, so a holder whose lease expired can never remove a lock that has
//! since been granted to someone else.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Failures reported by a lock backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockStoreError {
    /// The backend could not be reached
    #[error("lock store connection failed: {message}")]
    Connection { message: String },

    /// The backend answered with an error
    #[error("lock store command failed: {message}")]
    Command { message: String },
}

/// Atomic primitives a lock backend must provide
///
/// Implementations must be safe to share between tasks. Both operations
/// must be atomic with respect to each other for the same key.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Store `token` under `key` for `ttl` unless a live entry exists
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The entry was created; the caller now holds the lock
    /// * `Ok(false)` - Another live entry holds the key
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError>;

    /// Delete `key` only if it still maps to `token`
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The entry was removed
    /// * `Ok(false)` - The key is absent, expired, or owned by another token
    async fn delete(&self, key: &str, token: &str) -> Result<bool, LockStoreError>;
}

#[derive(Debug, Clone)]
struct LockEntry {
    token: String,
    expires_at: Instant,
}

impl LockEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local lock backend
///
/// Expiry uses `tokio::time::Instant`, so paused-clock tests can advance
/// past a lease without sleeping. Expired entries are dropped lazily on the
/// next access to the same key.
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    entries: DashMap<String, LockEntry>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live entry exists for `key`
    pub fn is_locked(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|entry| entry.is_live(now))
            .unwrap_or(false)
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        let now = Instant::now();
        self.entries
            .remove_if(key, |_, entry| !entry.is_live(now));

        let mut created = false;
        self.entries.entry(key.to_string()).or_insert_with(|| {
            created = true;
            LockEntry {
                token: token.to_string(),
                expires_at: now + ttl,
            }
        });
        Ok(created)
    }

    async fn delete(&self, key: &str, token: &str) -> Result<bool, LockStoreError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.token == token && entry.is_live(now));
        Ok(removed.is_some())
    }
}
