//! Core traits for user, account and transaction storage
//!
//! The engine only talks to these traits, so a persistent backend can be
//! swapped in without touching the business rules. Every method returns a
//! `Result` so backends with real I/O can surface failures as
//! `AccountError::Internal`.

use crate::types::{Account, AccountError, AccountNumber, Transaction, TransactionId, User, UserId};

/// Read access to users
pub trait UserStore: Send + Sync {
    /// Look up a user by id
    fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, AccountError>;
}

/// Read and write access to accounts
///
/// Callers mutate accounts only while holding the account's lock, so
/// `save` is a plain last-writer-wins upsert.
pub trait AccountStore: Send + Sync {
    /// Look up an account by number
    fn find_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Option<Account>, AccountError>;

    /// Insert or replace an account
    fn save(&self, account: Account) -> Result<(), AccountError>;
}

/// Append-only transaction log
pub trait TransactionStore: Send + Sync {
    /// Look up a transaction by id
    fn find_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Transaction>, AccountError>;

    /// Append a new transaction
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a transaction with the same id already exists;
    /// records are never overwritten.
    fn save(&self, transaction: Transaction) -> Result<(), AccountError>;

    /// All transactions for an account, in append order
    fn find_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Vec<Transaction>, AccountError>;
}
