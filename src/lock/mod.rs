//! Per-account mutual exclusion
//!
//! - `store` - Lock backend trait and the in-memory TTL implementation
//! - `manager` - Acquire with bounded backoff, idempotent release
//! - `scope` - Run a body under a lock with release on every exit path

pub mod manager;
pub mod scope;
pub mod store;

pub use manager::{LockHandle, LockManager};
pub use scope::LockScope;
pub use store::{InMemoryLockStore, LockStore, LockStoreError};
