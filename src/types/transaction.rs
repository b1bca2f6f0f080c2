//! Transaction-related types for the account balance engine
//!
//! This module defines the immutable transaction record appended for every
//! use/cancel attempt, its identifier, and the snapshot DTO returned to callers.

use super::account::{Account, AccountNumber, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Smallest amount a use may debit (inclusive)
pub const MIN_USE_AMOUNT: Amount = 10;

/// Upper bound on a single use (exclusive)
pub const MAX_USE_AMOUNT: Amount = 100_000_000;

/// Opaque transaction identifier
///
/// Generated ids are 32 lowercase hex characters with no embedded meaning.
/// Ids supplied by callers for lookups are not validated; an unknown id is
/// simply not found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a fresh random transaction id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Balance-affecting operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Debit the account
    Use,
    /// Credit back a previous use
    Cancel,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Use => f.write_str("USE"),
            TransactionType::Cancel => f.write_str("CANCEL"),
        }
    }
}

/// Outcome recorded on a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionResult {
    /// The operation was accepted and the balance changed
    Success,
    /// The operation was rejected; audit-only, the balance did not change
    Failure,
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionResult::Success => f.write_str("SUCCESS"),
            TransactionResult::Failure => f.write_str("FAILURE"),
        }
    }
}

/// Immutable audit record of one use/cancel attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,

    pub transaction_type: TransactionType,

    pub result: TransactionResult,

    /// The account this transaction affected
    pub account_number: AccountNumber,

    /// Requested amount (positive)
    pub amount: Amount,

    /// Account balance right after the operation
    ///
    /// On a FAILURE record this is the unchanged balance.
    pub balance_snapshot: Amount,

    /// For cancels, the transaction being cancelled
    pub original_transaction_id: Option<TransactionId>,

    pub transacted_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a new record against the current state of `account`
    ///
    /// The id and timestamp are generated here, so every call yields a
    /// distinct record.
    pub fn record(
        transaction_type: TransactionType,
        result: TransactionResult,
        account: &Account,
        amount: Amount,
        original_transaction_id: Option<TransactionId>,
    ) -> Self {
        Transaction {
            transaction_id: TransactionId::generate(),
            transaction_type,
            result,
            account_number: account.account_number.clone(),
            amount,
            balance_snapshot: account.balance,
            original_transaction_id,
            transacted_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == TransactionResult::Success
    }
}

/// Transaction snapshot handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDto {
    pub account_number: AccountNumber,
    pub transaction_type: TransactionType,
    pub transaction_result: TransactionResult,
    pub transaction_id: TransactionId,
    pub amount: Amount,
    pub transacted_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionDto {
    fn from(tx: &Transaction) -> Self {
        TransactionDto {
            account_number: tx.account_number.clone(),
            transaction_type: tx.transaction_type,
            transaction_result: tx.result,
            transaction_id: tx.transaction_id.clone(),
            amount: tx.amount,
            transacted_at: tx.transacted_at,
        }
    }
}

impl From<Transaction> for TransactionDto {
    fn from(tx: Transaction) -> Self {
        TransactionDto::from(&tx)
    }
}
