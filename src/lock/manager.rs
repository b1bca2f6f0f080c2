//! Per-account lock acquisition and release
//!
//! `LockManager` turns the two atomic primitives of a [`LockStore`] into a
//! mutual-exclusion lock with bounded waiting.
//!
//! # Acquisition
//!
//! Each attempt is a single `set_if_absent` carrying a fresh owner token and
//! the hold timeout as TTL. A busy key is retried after `retry_interval`
//! until either the acquire deadline passes or the attempt budget
//! (`acquire_timeout / retry_interval + 1`) is spent; the caller then gets
//! `LockTimeout`. Store failures are not retried: a failed or slow store
//! call yields `LockUnavailable` at once.
//!
//! # Release
//!
//! Release is a compare-and-delete on the owner token and never fails. A
//! lock that already expired, or that now belongs to someone else, is left
//! alone and logged.

use super::store::LockStore;
use crate::config::LockConfig;
use crate::types::{AccountError, AccountNumber};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Proof of lock ownership
///
/// Returned by [`LockManager::acquire`] and consumed by
/// [`LockManager::release`], so a handle can be released at most once.
#[derive(Debug)]
pub struct LockHandle {
    key: String,
    token: String,
    acquired_at: Instant,
}

impl LockHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Time elapsed since the lock was granted
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// Lock manager over a shared [`LockStore`]
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    config: LockConfig,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire the lock for an account with the configured timeouts
    ///
    /// # Errors
    ///
    /// * `LockTimeout` - The lock stayed busy for the whole acquire timeout
    /// * `LockUnavailable` - The lock store failed or did not answer in time
    pub async fn acquire(&self, account_number: &AccountNumber) -> Result<LockHandle, AccountError> {
        self.acquire_with(
            account_number.as_str(),
            self.config.acquire_timeout,
            self.config.hold_timeout,
        )
        .await
    }

    /// Acquire the lock for `key` with explicit timeouts
    ///
    /// # Arguments
    ///
    /// * `key` - The lock key
    /// * `acquire_timeout` - Maximum time spent waiting for a busy lock
    /// * `hold_timeout` - Lease after which the store drops the lock
    ///
    /// # Errors
    ///
    /// Same as [`LockManager::acquire`].
    pub async fn acquire_with(
        &self,
        key: &str,
        acquire_timeout: Duration,
        hold_timeout: Duration,
    ) -> Result<LockHandle, AccountError> {
        let token = Uuid::new_v4().to_string();
        let started = Instant::now();
        let deadline = started + acquire_timeout;
        let max_attempts = self.config.max_attempts(acquire_timeout);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let call = self.store.set_if_absent(key, &token, hold_timeout);
            let acquired = match timeout(self.config.store_call_timeout, call).await {
                Ok(Ok(acquired)) => acquired,
                Ok(Err(e)) => {
                    warn!(key, error = %e, "Lock store failed during acquire");
                    return Err(AccountError::lock_unavailable(key, &e.to_string()));
                }
                Err(_) => {
                    let limit_ms = self.config.store_call_timeout.as_millis();
                    warn!(key, limit_ms = limit_ms as u64, "Lock store call timed out");
                    return Err(AccountError::lock_unavailable(
                        key,
                        &format!("store call exceeded {}ms", limit_ms),
                    ));
                }
            };

            if acquired {
                debug!(key, attempts, "Lock acquired");
                return Ok(LockHandle {
                    key: key.to_string(),
                    token,
                    acquired_at: Instant::now(),
                });
            }

            let now = Instant::now();
            if attempts >= max_attempts || now >= deadline {
                let waited_ms = now.duration_since(started).as_millis() as u64;
                warn!(key, attempts, waited_ms, "Lock acquire timed out");
                return Err(AccountError::lock_timeout(key, waited_ms));
            }

            sleep(self.config.retry_interval.min(deadline - now)).await;
        }
    }

    /// Release a lock
    ///
    /// Never fails. Problems are logged and swallowed; an unreleased lock
    /// expires after its hold timeout.
    pub async fn release(&self, handle: LockHandle) {
        self.release_held(&handle).await;
    }

    /// Release a lock while the caller keeps the handle
    ///
    /// The delete is token-checked, so a handle released again after this
    /// returns only logs a warning.
    pub(crate) async fn release_held(&self, handle: &LockHandle) {
        let held_ms = handle.held_for().as_millis() as u64;
        if handle.held_for() > self.config.hold_timeout {
            warn!(
                key = handle.key(),
                held_ms, "Lock held past its lease; it may have been granted to another holder"
            );
        }

        let call = self.store.delete(handle.key(), handle.token());
        match timeout(self.config.store_call_timeout, call).await {
            Ok(Ok(true)) => debug!(key = handle.key(), held_ms, "Lock released"),
            Ok(Ok(false)) => warn!(
                key = handle.key(),
                held_ms, "Lock already expired or owned by another holder"
            ),
            Ok(Err(e)) => warn!(key = handle.key(), error = %e, "Failed to release lock"),
            Err(_) => warn!(key = handle.key(), "Lock release timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::store::InMemoryLockStore;
    use crate::lock::testing::{FailingLockStore, HangingLockStore};

    fn account_number() -> AccountNumber {
        AccountNumber::parse("1000000000").unwrap()
    }

    fn manager_with(store: Arc<dyn LockStore>) -> LockManager {
        LockManager::new(store, LockConfig::default())
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = Arc::new(InMemoryLockStore::new());
        let manager = manager_with(store.clone());

        let handle = manager.acquire(&account_number()).await.unwrap();
        assert_eq!(handle.key(), "1000000000");
        assert!(store.is_locked("1000000000"));

        manager.release(handle).await;
        assert!(!store.is_locked("1000000000"));
    }

    #[tokio::test]
    async fn test_handles_carry_distinct_tokens() {
        let manager = manager_with(Arc::new(InMemoryLockStore::new()));

        let first = manager.acquire(&account_number()).await.unwrap();
        let first_token = first.token().to_string();
        manager.release(first).await;
        let second = manager.acquire(&account_number()).await.unwrap();

        assert_ne!(first_token, second.token());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_lock_times_out() {
        let manager = manager_with(Arc::new(InMemoryLockStore::new()));
        let _held = manager.acquire(&account_number()).await.unwrap();

        let started = Instant::now();
        let result = manager.acquire(&account_number()).await;

        assert!(matches!(result, Err(AccountError::LockTimeout { .. })));
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_millis(1_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_gets_lock_after_release() {
        let manager = manager_with(Arc::new(InMemoryLockStore::new()));
        let held = manager.acquire(&account_number()).await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire(&account_number()).await })
        };

        sleep(Duration::from_millis(200)).await;
        manager.release(held).await;

        let handle = waiter.await.unwrap().unwrap();
        assert_eq!(handle.key(), "1000000000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_can_be_taken_over() {
        let store = Arc::new(InMemoryLockStore::new());
        let manager = manager_with(store.clone());
        let stale = manager
            .acquire_with("1000000000", Duration::from_secs(1), Duration::from_millis(300))
            .await
            .unwrap();

        let fresh = manager.acquire(&account_number()).await.unwrap();
        assert!(fresh.held_for() < Duration::from_secs(1));

        // The stale holder must not delete the new lock
        manager.release(stale).await;
        assert!(store.is_locked("1000000000"));

        manager.release(fresh).await;
        assert!(!store.is_locked("1000000000"));
    }

    #[tokio::test]
    async fn test_zero_acquire_timeout_tries_once() {
        let manager = manager_with(Arc::new(InMemoryLockStore::new()));
        let _held = manager.acquire(&account_number()).await.unwrap();

        let result = manager
            .acquire_with("1000000000", Duration::ZERO, Duration::from_secs(15))
            .await;
        assert!(matches!(result, Err(AccountError::LockTimeout { .. })));
    }

    #[tokio::test]
    async fn test_failing_store_is_unavailable_not_timeout() {
        let manager = manager_with(Arc::new(FailingLockStore));

        let result = manager.acquire(&account_number()).await;
        assert!(matches!(result, Err(AccountError::LockUnavailable { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_store_is_unavailable() {
        let manager = manager_with(Arc::new(HangingLockStore));

        let started = Instant::now();
        let result = manager.acquire(&account_number()).await;

        assert!(matches!(result, Err(AccountError::LockUnavailable { .. })));
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_release_never_fails_on_store_error() {
        let store = Arc::new(InMemoryLockStore::new());
        let manager = manager_with(store);
        let handle = manager.acquire(&account_number()).await.unwrap();

        let broken = manager_with(Arc::new(FailingLockStore));
        broken.release(handle).await;
    }
}
