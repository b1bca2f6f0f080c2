//! Core business logic module
//!
//! This module contains the balance processing components:
//! - `traits` - Store abstractions consumed by the engine
//! - `account_store` - In-memory user and account storage
//! - `transaction_store` - In-memory append-only transaction log
//! - `engine` - Use/cancel validation and state transitions
//! - `service` - Lock-scoped operations and failure records
//! - `batch_processor` - Account-partitioned batch replay

pub mod account_store;
pub mod batch_processor;
pub mod engine;
pub mod service;
pub mod traits;
pub mod transaction_store;

pub use account_store::{InMemoryAccountStore, InMemoryUserStore};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::TransactionEngine;
pub use service::TransactionService;
pub use traits::{AccountStore, TransactionStore, UserStore};
pub use transaction_store::InMemoryTransactionStore;
