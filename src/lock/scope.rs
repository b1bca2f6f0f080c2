//! Lock-scoped execution
//!
//! `LockScope` runs an async body while holding the lock of the account the
//! request targets. The lock is released on every exit path:
//!
//! - normal return and `Err` return
//! - panic inside the body (caught, lock released, panic resumed)
//! - cancellation (the future is dropped mid-flight; a drop guard spawns
//!   the release on the current tokio runtime)
//!
//! The key is derived before any acquisition attempt, so a malformed
//! request fails with `InvalidRequest` without touching the lock store.

use super::manager::{LockHandle, LockManager};
use crate::types::{AccountError, AccountNumber, LockKeySource};
use futures::FutureExt;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use tracing::warn;

/// Runs bodies under per-account locks
#[derive(Debug, Clone)]
pub struct LockScope {
    manager: LockManager,
}

impl LockScope {
    pub fn new(manager: LockManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &LockManager {
        &self.manager
    }

    /// Run `body` while holding the lock of the request's account
    ///
    /// # Arguments
    ///
    /// * `request` - Payload whose account number is the lock key
    /// * `body` - Receives the validated account number
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - The account number is blank or malformed
    /// * `LockTimeout` / `LockUnavailable` - The lock was not obtained; the
    ///   body did not run
    /// * Any error returned by `body`
    pub async fn with_lock<R, F, Fut, T>(&self, request: &R, body: F) -> Result<T, AccountError>
    where
        R: LockKeySource + ?Sized,
        F: FnOnce(AccountNumber) -> Fut,
        Fut: Future<Output = Result<T, AccountError>>,
    {
        let key = request.lock_key()?;
        self.with_key(key, body).await
    }

    /// Run `body` while holding the lock for an already validated key
    pub async fn with_key<F, Fut, T>(&self, key: AccountNumber, body: F) -> Result<T, AccountError>
    where
        F: FnOnce(AccountNumber) -> Fut,
        Fut: Future<Output = Result<T, AccountError>>,
    {
        let handle = self.manager.acquire(&key).await?;
        let mut guard = LockGuard::new(self.manager.clone(), handle);

        let outcome = AssertUnwindSafe(async move { body(key).await })
            .catch_unwind()
            .await;

        // The guard keeps the handle until the delete returns, so dropping
        // this future mid-release still releases the lock
        if let Some(handle) = guard.handle() {
            self.manager.release_held(handle).await;
        }
        guard.disarm();

        match outcome {
            Ok(result) => result,
            Err(panic) => resume_unwind(panic),
        }
    }
}

/// Releases the lock if the scope is dropped before it could release
struct LockGuard {
    manager: LockManager,
    handle: Option<LockHandle>,
}

impl LockGuard {
    fn new(manager: LockManager, handle: LockHandle) -> Self {
        Self {
            manager,
            handle: Some(handle),
        }
    }

    fn handle(&self) -> Option<&LockHandle> {
        self.handle.as_ref()
    }

    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let manager = self.manager.clone();
                runtime.spawn(async move { manager.release(handle).await });
            }
            Err(_) => warn!(
                key = handle.key(),
                "No runtime to release lock; it will expire after its lease"
            ),
        }
    }
}
