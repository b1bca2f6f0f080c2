//! Account Balance Engine Library
//! # Overview
//!
//! This library serialises balance-affecting operations per account and
//! applies them through a small set of business rules.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, Transaction, requests, errors)
//! - [`lock`] - Per-account locks:
//!   - [`lock::store`] - Lock backend with set-if-absent and compare-and-delete
//!   - [`lock::manager`] - Acquire with bounded backoff, idempotent release
//!   - [`lock::scope`] - Run a body under a lock, release on every exit path
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Use/cancel validation and state transitions
//!   - [`core::service`] - Lock-scoped operations exposed to callers
//!   - [`core::batch_processor`] - Account-partitioned batch replay
//! - [`config`] - Lock, engine and batch settings
//! - [`io`], [`strategy`], [`cli`] - CSV replay driver
//!
//! # Operations
//!
//! - **Use**: Debit an account on behalf of its owner
//! - **Cancel**: Credit back the exact amount of an earlier transaction
//! - **Query**: Look up a transaction by id (no lock)
//!
//! Every accepted use or cancel appends one SUCCESS record. A rejected one
//! appends a FAILURE record, written while the lock is still held.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod lock;
pub mod strategy;
pub mod types;

pub use config::{BatchConfig, CancelPolicy, EngineConfig, LockConfig};
pub use core::{
    AccountStore, InMemoryAccountStore, InMemoryTransactionStore, InMemoryUserStore,
    TransactionEngine, TransactionService, TransactionStore, UserStore,
};
pub use lock::{InMemoryLockStore, LockManager, LockScope, LockStore};
pub use types::{
    Account, AccountError, AccountNumber, CancelBalanceRequest, ErrorCode, ErrorResponse,
    Transaction, TransactionDto, TransactionId, UseBalanceRequest,
};
