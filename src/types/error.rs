//! Error types for the account balance engine
//!
//! This module defines every error a lock-scoped operation can surface.
//! Each error carries a stable [`ErrorCode`] for the response layer and a
//! human-readable message built from its context fields.
//!
//! # Error Categories
//!
//! - **NotFound**: user, account or transaction absent
//! - **Conflict**: ownership mismatch, closed account, insufficient balance,
//!   amount out of bounds, cancel mismatches, malformed requests
//! - **Concurrency**: lock timeout, lock store unavailable (retryable)
//! - **Internal**: arithmetic overflow, store or I/O failures

use super::account::{AccountNumber, Amount, UserId};
use super::transaction::TransactionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for the account balance engine
///
/// Business variants (NotFound and Conflict) are expected outcomes and are
/// always surfaced to the caller. Concurrency variants mean nothing was
/// touched and the caller may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// No user with the given id
    #[error("User {user_id} not found")]
    UserNotFound { user_id: UserId },

    /// No account with the given number
    #[error("Account {account_number} not found")]
    AccountNotFound { account_number: String },

    /// No transaction with the given id
    #[error("Transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    /// The account is owned by a different user
    #[error("Account {account_number} is not owned by user {user_id}")]
    OwnershipMismatch {
        account_number: String,
        user_id: UserId,
    },

    /// The account has been closed
    #[error("Account {account_number} is already closed")]
    AccountClosed { account_number: String },

    /// The requested use exceeds the balance
    #[error("Insufficient balance on account {account_number}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_number: String,
        balance: Amount,
        requested: Amount,
    },

    /// The requested use is below the minimum
    #[error("Amount {amount} is below the minimum of {min}")]
    AmountTooSmall { amount: Amount, min: Amount },

    /// The requested use is at or above the maximum
    #[error("Amount {amount} must be less than {max}")]
    AmountTooLarge { amount: Amount, max: Amount },

    /// A cancel must request exactly the original amount
    #[error("Cancel amount {requested} does not match amount {original} of transaction {transaction_id}")]
    CancelAmountMismatch {
        transaction_id: String,
        original: Amount,
        requested: Amount,
    },

    /// Strict cancel: the transaction belongs to another account
    #[error("Transaction {transaction_id} belongs to account {expected}, not {actual}")]
    TransactionAccountMismatch {
        transaction_id: String,
        expected: String,
        actual: String,
    },

    /// Strict cancel: only successful uses can be cancelled
    #[error("Transaction {transaction_id} is not a successful use and cannot be cancelled")]
    TransactionNotCancellable { transaction_id: String },

    /// Strict cancel: the transaction was cancelled before
    #[error("Transaction {transaction_id} has already been cancelled")]
    TransactionAlreadyCancelled { transaction_id: String },

    /// The request payload violates the operation contract
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Another holder kept the account lock past the acquire timeout
    #[error("Lock for account {key} was not acquired within {waited_ms}ms")]
    LockTimeout { key: String, waited_ms: u64 },

    /// The lock store could not be reached or failed
    #[error("Lock store unavailable for account {key}: {reason}")]
    LockUnavailable { key: String, reason: String },

    /// A balance would overflow
    #[error("Arithmetic overflow in {operation} on account {account_number}")]
    ArithmeticOverflow {
        operation: String,
        account_number: String,
    },

    /// Unexpected store or I/O failure
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Stable, machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UserNotFound,
    AccountNotFound,
    TransactionNotFound,
    UserAccountUnMatch,
    AccountAlreadyUnregistered,
    AmountExceedBalance,
    AmountTooSmall,
    AmountTooBig,
    CancelAmountUnMatch,
    TransactionAccountUnMatch,
    TransactionNotCancellable,
    TransactionAlreadyCancelled,
    InvalidRequest,
    AccountTransactionLock,
    LockUnavailable,
    InternalServerError,
}

impl ErrorCode {
    /// The code as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::AccountNotFound => "ACCOUNT_NOT_FOUND",
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ErrorCode::UserAccountUnMatch => "USER_ACCOUNT_UN_MATCH",
            ErrorCode::AccountAlreadyUnregistered => "ACCOUNT_ALREADY_UNREGISTERED",
            ErrorCode::AmountExceedBalance => "AMOUNT_EXCEED_BALANCE",
            ErrorCode::AmountTooSmall => "AMOUNT_TOO_SMALL",
            ErrorCode::AmountTooBig => "AMOUNT_TOO_BIG",
            ErrorCode::CancelAmountUnMatch => "CANCEL_AMOUNT_UN_MATCH",
            ErrorCode::TransactionAccountUnMatch => "TRANSACTION_ACCOUNT_UN_MATCH",
            ErrorCode::TransactionNotCancellable => "TRANSACTION_NOT_CANCELLABLE",
            ErrorCode::TransactionAlreadyCancelled => "TRANSACTION_ALREADY_CANCELLED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::AccountTransactionLock => "ACCOUNT_TRANSACTION_LOCK",
            ErrorCode::LockUnavailable => "LOCK_UNAVAILABLE",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Generic description, used when a message must not leak details
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::AccountNotFound => "Account not found",
            ErrorCode::TransactionNotFound => "Transaction not found",
            ErrorCode::UserAccountUnMatch => "User and account owner do not match",
            ErrorCode::AccountAlreadyUnregistered => "Account is already unregistered",
            ErrorCode::AmountExceedBalance => "Amount exceeds the account balance",
            ErrorCode::AmountTooSmall => "Amount is too small",
            ErrorCode::AmountTooBig => "Amount is too big",
            ErrorCode::CancelAmountUnMatch => "Cancel amount must equal the original amount",
            ErrorCode::TransactionAccountUnMatch => "Transaction does not belong to the account",
            ErrorCode::TransactionNotCancellable => "Transaction cannot be cancelled",
            ErrorCode::TransactionAlreadyCancelled => "Transaction has already been cancelled",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::AccountTransactionLock => "Account is in use by another transaction",
            ErrorCode::LockUnavailable => "Lock service is unavailable",
            ErrorCode::InternalServerError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification driving propagation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Concurrency,
    Internal,
}

/// Structured error body for a response translation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
}

impl From<&AccountError> for ErrorResponse {
    fn from(error: &AccountError) -> Self {
        let code = error.code();
        // Internal details stay in the logs
        let error_message = match error.category() {
            ErrorCategory::Internal => code.description().to_string(),
            _ => error.to_string(),
        };
        ErrorResponse {
            error_code: code,
            error_message,
        }
    }
}

impl AccountError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AccountError::UserNotFound { .. } => ErrorCode::UserNotFound,
            AccountError::AccountNotFound { .. } => ErrorCode::AccountNotFound,
            AccountError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            AccountError::OwnershipMismatch { .. } => ErrorCode::UserAccountUnMatch,
            AccountError::AccountClosed { .. } => ErrorCode::AccountAlreadyUnregistered,
            AccountError::InsufficientBalance { .. } => ErrorCode::AmountExceedBalance,
            AccountError::AmountTooSmall { .. } => ErrorCode::AmountTooSmall,
            AccountError::AmountTooLarge { .. } => ErrorCode::AmountTooBig,
            AccountError::CancelAmountMismatch { .. } => ErrorCode::CancelAmountUnMatch,
            AccountError::TransactionAccountMismatch { .. } => {
                ErrorCode::TransactionAccountUnMatch
            }
            AccountError::TransactionNotCancellable { .. } => ErrorCode::TransactionNotCancellable,
            AccountError::TransactionAlreadyCancelled { .. } => {
                ErrorCode::TransactionAlreadyCancelled
            }
            AccountError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            AccountError::LockTimeout { .. } => ErrorCode::AccountTransactionLock,
            AccountError::LockUnavailable { .. } => ErrorCode::LockUnavailable,
            AccountError::ArithmeticOverflow { .. } | AccountError::Internal { .. } => {
                ErrorCode::InternalServerError
            }
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AccountError::UserNotFound { .. }
            | AccountError::AccountNotFound { .. }
            | AccountError::TransactionNotFound { .. } => ErrorCategory::NotFound,
            AccountError::LockTimeout { .. } | AccountError::LockUnavailable { .. } => {
                ErrorCategory::Concurrency
            }
            AccountError::ArithmeticOverflow { .. } | AccountError::Internal { .. } => {
                ErrorCategory::Internal
            }
            _ => ErrorCategory::Conflict,
        }
    }

    /// Whether this is an expected business outcome (NotFound or Conflict)
    pub fn is_business(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::NotFound | ErrorCategory::Conflict
        )
    }

    /// Whether a higher layer may retry the whole operation
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Concurrency
    }
}

// Conversion from io::Error to AccountError
impl From<std::io::Error> for AccountError {
    fn from(error: std::io::Error) -> Self {
        AccountError::Internal {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl AccountError {
    /// Create a UserNotFound error
    pub fn user_not_found(user_id: UserId) -> Self {
        AccountError::UserNotFound { user_id }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account_number: &AccountNumber) -> Self {
        AccountError::AccountNotFound {
            account_number: account_number.to_string(),
        }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(transaction_id: &TransactionId) -> Self {
        AccountError::TransactionNotFound {
            transaction_id: transaction_id.to_string(),
        }
    }

    /// Create an OwnershipMismatch error
    pub fn ownership_mismatch(account_number: &AccountNumber, user_id: UserId) -> Self {
        AccountError::OwnershipMismatch {
            account_number: account_number.to_string(),
            user_id,
        }
    }

    /// Create an AccountClosed error
    pub fn account_closed(account_number: &AccountNumber) -> Self {
        AccountError::AccountClosed {
            account_number: account_number.to_string(),
        }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(
        account_number: &AccountNumber,
        balance: Amount,
        requested: Amount,
    ) -> Self {
        AccountError::InsufficientBalance {
            account_number: account_number.to_string(),
            balance,
            requested,
        }
    }

    /// Create a CancelAmountMismatch error
    pub fn cancel_amount_mismatch(
        transaction_id: &TransactionId,
        original: Amount,
        requested: Amount,
    ) -> Self {
        AccountError::CancelAmountMismatch {
            transaction_id: transaction_id.to_string(),
            original,
            requested,
        }
    }

    /// Create a TransactionAccountMismatch error
    pub fn transaction_account_mismatch(
        transaction_id: &TransactionId,
        expected: &AccountNumber,
        actual: &AccountNumber,
    ) -> Self {
        AccountError::TransactionAccountMismatch {
            transaction_id: transaction_id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a TransactionNotCancellable error
    pub fn transaction_not_cancellable(transaction_id: &TransactionId) -> Self {
        AccountError::TransactionNotCancellable {
            transaction_id: transaction_id.to_string(),
        }
    }

    /// Create a TransactionAlreadyCancelled error
    pub fn transaction_already_cancelled(transaction_id: &TransactionId) -> Self {
        AccountError::TransactionAlreadyCancelled {
            transaction_id: transaction_id.to_string(),
        }
    }

    /// Create an InvalidRequest error
    pub fn invalid_request(message: &str) -> Self {
        AccountError::InvalidRequest {
            message: message.to_string(),
        }
    }

    /// Create a LockTimeout error
    pub fn lock_timeout(key: &str, waited_ms: u64) -> Self {
        AccountError::LockTimeout {
            key: key.to_string(),
            waited_ms,
        }
    }

    /// Create a LockUnavailable error
    pub fn lock_unavailable(key: &str, reason: &str) -> Self {
        AccountError::LockUnavailable {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account_number: &AccountNumber) -> Self {
        AccountError::ArithmeticOverflow {
            operation: operation.to_string(),
            account_number: account_number.to_string(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: &str) -> Self {
        AccountError::Internal {
            message: message.to_string(),
        }
    }
}
