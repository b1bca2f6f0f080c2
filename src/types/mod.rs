//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account, account number and user types
//! - `transaction`: Transaction records, identifiers and the caller-facing DTO
//! - `request`: Lock-scoped request payloads
//! - `error`: Error types and stable error codes

pub mod account;
pub mod error;
pub mod request;
pub mod transaction;

pub use account::{Account, AccountNumber, AccountStatus, Amount, User, UserId};
pub use error::{AccountError, ErrorCategory, ErrorCode, ErrorResponse};
pub use request::{CancelBalanceRequest, LockKeySource, UseBalanceRequest};
pub use transaction::{
    Transaction, TransactionDto, TransactionId, TransactionResult, TransactionType,
    MAX_USE_AMOUNT, MIN_USE_AMOUNT,
};
