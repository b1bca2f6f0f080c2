//! Lock-scoped balance operations
//!
//! `TransactionService` is what callers use. It wraps every balance-affecting
//! call to [`TransactionEngine`] in the account's lock and turns results into
//! [`TransactionDto`]s.
//!
//! # Failure records
//!
//! When the engine rejects a use or cancel with a business error (NotFound
//! or Conflict category), the service appends a FAILURE record while it still
//! holds the lock, then returns the original error. Writing that record is
//! best effort: if it fails, the problem is logged and the caller still gets
//! the original error. Internal errors propagate without a record.
//!
//! Lock errors (`LockTimeout`, `LockUnavailable`) happen before the body runs,
//! so nothing is read or written.

use std::sync::Arc;
use std::time::Duration;

use super::engine::TransactionEngine;
use super::traits::{AccountStore, TransactionStore, UserStore};
use crate::config::EngineConfig;
use crate::lock::{LockManager, LockScope, LockStore};
use crate::types::{
    AccountError, AccountNumber, Amount, CancelBalanceRequest, TransactionDto, TransactionId,
    TransactionType, UseBalanceRequest,
};
use tracing::warn;

/// Entry point for use, cancel and query operations
#[derive(Debug, Clone)]
pub struct TransactionService {
    engine: TransactionEngine,
    scope: LockScope,
    /// Pause inside the locked region of every use
    use_delay: Duration,
}

impl TransactionService {
    /// Create a service; a `use_delay` that could outlast the lock lease is
    /// clamped
    pub fn new(engine: TransactionEngine, scope: LockScope, use_delay: Duration) -> Self {
        let use_delay = scope.manager().config().bound_use_delay(use_delay);
        Self {
            engine,
            scope,
            use_delay,
        }
    }

    /// Wire a service from stores and configuration
    pub fn from_config(
        users: Arc<dyn UserStore>,
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        lock_store: Arc<dyn LockStore>,
        config: &EngineConfig,
    ) -> Self {
        let engine = TransactionEngine::new(users, accounts, transactions, config.cancel_policy);
        let scope = LockScope::new(LockManager::new(lock_store, config.lock.clone()));
        Self::new(engine, scope, config.use_delay)
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    pub fn scope(&self) -> &LockScope {
        &self.scope
    }

    /// Use balance under the account lock
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - The account number is blank or malformed
    /// * `LockTimeout` / `LockUnavailable` - Nothing was touched
    /// * Any rejection of [`TransactionEngine::use_balance`]; a FAILURE record
    ///   has been appended if the account exists
    pub async fn use_balance(
        &self,
        request: &UseBalanceRequest,
    ) -> Result<TransactionDto, AccountError> {
        self.scope
            .with_lock(request, |account_number| async move {
                if !self.use_delay.is_zero() {
                    tokio::time::sleep(self.use_delay).await;
                }

                self.engine
                    .use_balance(request.user_id, &account_number, request.amount)
                    .map(TransactionDto::from)
                    .map_err(|e| {
                        self.save_failure(
                            TransactionType::Use,
                            &account_number,
                            request.amount,
                            None,
                            e,
                        )
                    })
            })
            .await
    }

    /// Cancel a previous use under the account lock
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - The transaction id is blank, or the account
    ///   number is blank or malformed
    /// * `LockTimeout` / `LockUnavailable` - Nothing was touched
    /// * Any rejection of [`TransactionEngine::cancel_balance`]; a FAILURE
    ///   record has been appended if the account exists
    pub async fn cancel_balance(
        &self,
        request: &CancelBalanceRequest,
    ) -> Result<TransactionDto, AccountError> {
        let transaction_id = parse_transaction_id(&request.transaction_id)?;

        self.scope
            .with_lock(request, |account_number| async move {
                self.engine
                    .cancel_balance(&transaction_id, &account_number, request.amount)
                    .map(TransactionDto::from)
                    .map_err(|e| {
                        self.save_failure(
                            TransactionType::Cancel,
                            &account_number,
                            request.amount,
                            Some(transaction_id.clone()),
                            e,
                        )
                    })
            })
            .await
    }

    /// Look up a transaction; no lock is taken
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - The id is blank
    /// * `TransactionNotFound` - No record has this id
    pub fn query_transaction(&self, transaction_id: &str) -> Result<TransactionDto, AccountError> {
        let transaction_id = parse_transaction_id(transaction_id)?;
        self.engine
            .query_transaction(&transaction_id)
            .map(TransactionDto::from)
    }

    /// Append a FAILURE record for a business rejection, then hand the error back
    fn save_failure(
        &self,
        transaction_type: TransactionType,
        account_number: &AccountNumber,
        amount: Amount,
        original_transaction_id: Option<TransactionId>,
        cause: AccountError,
    ) -> AccountError {
        if !cause.is_business() {
            return cause;
        }

        match self.engine.record_failure(
            transaction_type,
            account_number,
            amount,
            original_transaction_id,
        ) {
            Ok(Some(record)) => warn!(
                account = %account_number,
                operation = %transaction_type,
                error_code = %cause.code(),
                failure_transaction_id = %record.transaction_id,
                "Operation rejected: {}", cause
            ),
            Ok(None) => warn!(
                account = %account_number,
                operation = %transaction_type,
                error_code = %cause.code(),
                "Operation rejected for unknown account: {}", cause
            ),
            Err(e) => warn!(
                account = %account_number,
                operation = %transaction_type,
                error = %e,
                "Failed to record rejected operation: {}", cause
            ),
        }
        cause
    }
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, AccountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AccountError::invalid_request("transaction id is missing"));
    }
    Ok(TransactionId::new(trimmed))
}
