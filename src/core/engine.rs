//! Balance transaction engine
//!
//! `TransactionEngine` holds the business rules for using and cancelling
//! balance. It validates a request, mutates the account and appends the
//! resulting SUCCESS record, or returns the first rule that failed.
//!
//! # Architecture
//!
//! ```text
//! TransactionEngine
//!     ├── Arc<dyn UserStore>         (user lookup)
//!     ├── Arc<dyn AccountStore>      (account state)
//!     ├── Arc<dyn TransactionStore>  (append-only history)
//!     └── CancelPolicy               (lenient or strict cancel checks)
//! ```
//!
//! # Thread Safety
//!
//! The engine is synchronous and stateless apart from its stores. It performs
//! read-modify-write on accounts, so `use_balance` and `cancel_balance` must
//! run under the account's lock (see [`crate::lock::LockScope`]).
//!
//! The engine never writes FAILURE records on its own. The caller decides,
//! while still holding the lock, whether to call [`TransactionEngine::record_failure`].

use std::sync::Arc;

use super::traits::{AccountStore, TransactionStore, UserStore};
use crate::config::CancelPolicy;
use crate::types::{
    Account, AccountError, AccountNumber, Amount, Transaction, TransactionId, TransactionResult,
    TransactionType, UserId, MAX_USE_AMOUNT, MIN_USE_AMOUNT,
};
use tracing::{error, info};

/// Validates and applies use/cancel operations
#[derive(Clone)]
pub struct TransactionEngine {
    users: Arc<dyn UserStore>,
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
    policy: CancelPolicy,
}

impl std::fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TransactionEngine {
    /// Create a new TransactionEngine
    ///
    /// # Arguments
    ///
    /// * `users` - User lookup
    /// * `accounts` - Account state storage
    /// * `transactions` - Transaction history storage
    /// * `policy` - Which checks a cancel must pass
    pub fn new(
        users: Arc<dyn UserStore>,
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        policy: CancelPolicy,
    ) -> Self {
        Self {
            users,
            accounts,
            transactions,
            policy,
        }
    }

    pub fn policy(&self) -> CancelPolicy {
        self.policy
    }

    /// Debit `amount` from an account on behalf of its owner
    ///
    /// Checks run in this order and the first failure wins:
    /// 1. the user exists
    /// 2. the account exists
    /// 3. the user owns the account
    /// 4. the account is active
    /// 5. the balance covers the amount (spending the whole balance is allowed)
    /// 6. the amount is at least [`MIN_USE_AMOUNT`]
    /// 7. the amount is below [`MAX_USE_AMOUNT`]
    ///
    /// # Returns
    ///
    /// The appended USE/SUCCESS record, whose snapshot is the new balance.
    ///
    /// # Errors
    ///
    /// The error of the first failing check. Nothing is mutated in that case.
    /// Store failures surface as `Internal`.
    pub fn use_balance(
        &self,
        user_id: UserId,
        account_number: &AccountNumber,
        amount: Amount,
    ) -> Result<Transaction, AccountError> {
        let user = self
            .users
            .find_by_id(user_id)?
            .ok_or_else(|| AccountError::user_not_found(user_id))?;
        let account = self.find_account(account_number)?;

        if account.user_id != user.id {
            return Err(AccountError::ownership_mismatch(account_number, user.id));
        }
        if !account.is_active() {
            return Err(AccountError::account_closed(account_number));
        }
        if account.balance < amount {
            return Err(AccountError::insufficient_balance(
                account_number,
                account.balance,
                amount,
            ));
        }
        if amount < MIN_USE_AMOUNT {
            return Err(AccountError::AmountTooSmall {
                amount,
                min: MIN_USE_AMOUNT,
            });
        }
        if amount >= MAX_USE_AMOUNT {
            return Err(AccountError::AmountTooLarge {
                amount,
                max: MAX_USE_AMOUNT,
            });
        }

        let mut updated = account.clone();
        updated.use_balance(amount)?;

        let record = Transaction::record(
            TransactionType::Use,
            TransactionResult::Success,
            &updated,
            amount,
            None,
        );
        let record = self.commit(account, updated, record)?;

        info!(
            account = %account_number,
            transaction_id = %record.transaction_id,
            amount,
            balance = record.balance_snapshot,
            "Balance used"
        );
        Ok(record)
    }

    /// Credit back a previous transaction
    ///
    /// Base checks, in order:
    /// 1. the transaction exists
    /// 2. the account exists
    /// 3. the amount equals the original amount
    ///
    /// With [`CancelPolicy::Strict`] three more follow:
    /// 4. the original belongs to this account
    /// 5. the original is a successful use
    /// 6. the original has not been cancelled before
    ///
    /// # Returns
    ///
    /// The appended CANCEL/SUCCESS record, referencing the original.
    ///
    /// # Errors
    ///
    /// The error of the first failing check, or `ArithmeticOverflow` if the
    /// credit does not fit. Nothing is mutated in either case.
    pub fn cancel_balance(
        &self,
        transaction_id: &TransactionId,
        account_number: &AccountNumber,
        amount: Amount,
    ) -> Result<Transaction, AccountError> {
        let original = self
            .transactions
            .find_by_transaction_id(transaction_id)?
            .ok_or_else(|| AccountError::transaction_not_found(transaction_id))?;
        let account = self.find_account(account_number)?;

        if original.amount != amount {
            return Err(AccountError::cancel_amount_mismatch(
                transaction_id,
                original.amount,
                amount,
            ));
        }

        if self.policy == CancelPolicy::Strict {
            self.check_strict_cancel(&original, account_number)?;
        }

        let mut updated = account.clone();
        updated.cancel_balance(amount)?;

        let record = Transaction::record(
            TransactionType::Cancel,
            TransactionResult::Success,
            &updated,
            amount,
            Some(transaction_id.clone()),
        );
        let record = self.commit(account, updated, record)?;

        info!(
            account = %account_number,
            transaction_id = %record.transaction_id,
            original_transaction_id = %transaction_id,
            amount,
            balance = record.balance_snapshot,
            "Balance use cancelled"
        );
        Ok(record)
    }

    /// Look up a transaction by id
    ///
    /// Read-only; does not need the account lock.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` if no record has this id.
    pub fn query_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Transaction, AccountError> {
        self.transactions
            .find_by_transaction_id(transaction_id)?
            .ok_or_else(|| AccountError::transaction_not_found(transaction_id))
    }

    /// Append a FAILURE record for a rejected use or cancel
    ///
    /// The snapshot is the account's unchanged balance.
    ///
    /// # Arguments
    ///
    /// * `transaction_type` - The operation that was rejected
    /// * `account_number` - The account the operation targeted
    /// * `amount` - The requested amount
    /// * `original_transaction_id` - For cancels, the id the caller asked to cancel
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The FAILURE record was appended
    /// * `Ok(None)` - The account does not exist, so there is nothing to reference
    pub fn record_failure(
        &self,
        transaction_type: TransactionType,
        account_number: &AccountNumber,
        amount: Amount,
        original_transaction_id: Option<TransactionId>,
    ) -> Result<Option<Transaction>, AccountError> {
        let Some(account) = self.accounts.find_by_account_number(account_number)? else {
            return Ok(None);
        };

        let record = Transaction::record(
            transaction_type,
            TransactionResult::Failure,
            &account,
            amount,
            original_transaction_id,
        );
        self.transactions.save(record.clone())?;
        Ok(Some(record))
    }

    fn find_account(&self, account_number: &AccountNumber) -> Result<Account, AccountError> {
        self.accounts
            .find_by_account_number(account_number)?
            .ok_or_else(|| AccountError::account_not_found(account_number))
    }

    fn check_strict_cancel(
        &self,
        original: &Transaction,
        account_number: &AccountNumber,
    ) -> Result<(), AccountError> {
        let original_id = &original.transaction_id;

        if &original.account_number != account_number {
            return Err(AccountError::transaction_account_mismatch(
                original_id,
                &original.account_number,
                account_number,
            ));
        }
        if original.transaction_type != TransactionType::Use || !original.is_success() {
            return Err(AccountError::transaction_not_cancellable(original_id));
        }

        let already_cancelled = self
            .transactions
            .find_by_account_number(account_number)?
            .iter()
            .any(|tx| {
                tx.transaction_type == TransactionType::Cancel
                    && tx.is_success()
                    && tx.original_transaction_id.as_ref() == Some(original_id)
            });
        if already_cancelled {
            return Err(AccountError::transaction_already_cancelled(original_id));
        }
        Ok(())
    }

    /// Persist the updated account and append its record
    ///
    /// If the append fails the previous account state is written back.
    fn commit(
        &self,
        previous: Account,
        updated: Account,
        record: Transaction,
    ) -> Result<Transaction, AccountError> {
        self.accounts.save(updated)?;

        if let Err(e) = self.transactions.save(record.clone()) {
            let account_number = previous.account_number.clone();
            if let Err(restore) = self.accounts.save(previous) {
                error!(
                    account = %account_number,
                    error = %restore,
                    "Failed to restore account after transaction append failed"
                );
            }
            return Err(e);
        }
        Ok(record)
    }
}
