//! Thread-safe append-only transaction log
//!
//! This module provides `InMemoryTransactionStore`, the default backend for
//! the [`TransactionStore`] trait.
//!
//! # Design
//!
//! Records live in a `DashMap` keyed by transaction id. A second `DashMap`
//! keeps, per account, the ids in the order they were appended, which backs
//! `find_by_account_number` and the strict-cancel duplicate check.
//!
//! Records are immutable once appended. A save with an id that already
//! exists is rejected instead of overwriting.

use super::traits::TransactionStore;
use crate::types::{AccountError, AccountNumber, Transaction, TransactionId};
use dashmap::DashMap;

/// Concurrent in-memory transaction log
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    transactions: DashMap<TransactionId, Transaction>,

    /// Transaction ids per account, in append order
    by_account: DashMap<AccountNumber, Vec<TransactionId>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn find_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Transaction>, AccountError> {
        Ok(self
            .transactions
            .get(transaction_id)
            .map(|entry| entry.value().clone()))
    }

    fn save(&self, transaction: Transaction) -> Result<(), AccountError> {
        let transaction_id = transaction.transaction_id.clone();
        let account_number = transaction.account_number.clone();

        let mut inserted = false;
        self.transactions
            .entry(transaction_id.clone())
            .or_insert_with(|| {
                inserted = true;
                transaction
            });
        if !inserted {
            return Err(AccountError::internal(&format!(
                "transaction {} already exists",
                transaction_id
            )));
        }

        self.by_account
            .entry(account_number)
            .or_default()
            .push(transaction_id);
        Ok(())
    }

    fn find_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Vec<Transaction>, AccountError> {
        let ids = match self.by_account.get(account_number) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };

        Ok(ids
            .iter()
            .filter_map(|id| self.transactions.get(id).map(|entry| entry.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, TransactionResult, TransactionType};

    fn account(number: &str) -> Account {
        Account::new(AccountNumber::parse(number).unwrap(), 1, 10_000)
    }

    fn use_record(account: &Account, amount: u64) -> Transaction {
        Transaction::record(
            TransactionType::Use,
            TransactionResult::Success,
            account,
            amount,
            None,
        )
    }

    #[test]
    fn test_save_and_find() {
        let store = InMemoryTransactionStore::new();
        let tx = use_record(&account("1000000000"), 900);
        let id = tx.transaction_id.clone();

        store.save(tx.clone()).unwrap();

        assert_eq!(store.find_by_transaction_id(&id).unwrap(), Some(tx));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_unknown_id_returns_none() {
        let store = InMemoryTransactionStore::new();
        let result = store
            .find_by_transaction_id(&TransactionId::new("missing"))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let store = InMemoryTransactionStore::new();
        let tx = use_record(&account("1000000000"), 900);

        store.save(tx.clone()).unwrap();
        let mut duplicate = tx.clone();
        duplicate.amount = 1;

        let result = store.save(duplicate);
        assert!(matches!(result, Err(AccountError::Internal { .. })));

        let stored = store
            .find_by_transaction_id(&tx.transaction_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.amount, 900);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_by_account_keeps_append_order() {
        let store = InMemoryTransactionStore::new();
        let first = account("1000000000");
        let other = account("1000000001");

        let a = use_record(&first, 100);
        let b = use_record(&other, 200);
        let c = use_record(&first, 300);
        store.save(a.clone()).unwrap();
        store.save(b).unwrap();
        store.save(c.clone()).unwrap();

        let records = store
            .find_by_account_number(&first.account_number)
            .unwrap();
        let ids: Vec<_> = records.into_iter().map(|t| t.transaction_id).collect();
        assert_eq!(ids, vec![a.transaction_id, c.transaction_id]);
    }

    #[test]
    fn test_find_by_account_without_records() {
        let store = InMemoryTransactionStore::new();
        let records = store
            .find_by_account_number(&AccountNumber::parse("1000000000").unwrap())
            .unwrap();
        assert!(records.is_empty());
    }
}
