//! Thread-safe in-memory user and account storage
//!
//! This module provides `InMemoryUserStore` and `InMemoryAccountStore`, the
//! default backends for the [`UserStore`] and [`AccountStore`] traits.
//!
//! # Design
//!
//! Both stores use `DashMap` (a concurrent HashMap) with fine-grained,
//! sharded locking. Reads hand out clones, so no shard lock is held while the
//! engine works on an account.
//!
//! # Thread Safety
//!
//! DashMap only protects individual map operations. A read-modify-write of
//! an account is only safe while the caller holds the account lock from
//! [`crate::lock::LockManager`].

use super::traits::{AccountStore, UserStore};
use crate::types::{Account, AccountError, AccountNumber, User, UserId};
use dashmap::DashMap;

/// Concurrent user registry
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<UserId, User>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, replacing any previous user with the same id
    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, AccountError> {
        Ok(self.users.get(&user_id).map(|entry| entry.value().clone()))
    }
}

/// Concurrent account storage keyed by account number
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    /// Account state by account number
    ///
    /// DashMap shards the map internally, so lookups for different accounts
    /// don't contend on a global lock.
    accounts: DashMap<AccountNumber, Account>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account, replacing any previous one with the same number
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.account_number.clone(), account);
    }

    /// Get all accounts ordered by account number
    ///
    /// # Thread Safety
    ///
    /// The returned vector is a snapshot; accounts may change right after
    /// this method returns.
    pub fn get_all_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn find_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Option<Account>, AccountError> {
        Ok(self
            .accounts
            .get(account_number)
            .map(|entry| entry.value().clone()))
    }

    fn save(&self, account: Account) -> Result<(), AccountError> {
        self.accounts.insert(account.account_number.clone(), account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn number(value: &str) -> AccountNumber {
        AccountNumber::parse(value).unwrap()
    }

    #[test]
    fn test_find_user() {
        let store = InMemoryUserStore::new();
        store.insert(User::new(1, "Pororo"));

        let user = store.find_by_id(1).unwrap().unwrap();
        assert_eq!(user.name, "Pororo");
        assert!(store.find_by_id(2).unwrap().is_none());
    }

    #[test]
    fn test_find_account_returns_none_for_unknown_number() {
        let store = InMemoryAccountStore::new();
        assert!(store
            .find_by_account_number(&number("1000000000"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_replaces_existing_account() {
        let store = InMemoryAccountStore::new();
        let mut account = Account::new(number("1000000000"), 1, 10_000);
        store.insert(account.clone());

        account.use_balance(900).unwrap();
        store.save(account).unwrap();

        let stored = store
            .find_by_account_number(&number("1000000000"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.balance, 9_100);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_returns_snapshot() {
        let store = InMemoryAccountStore::new();
        store.insert(Account::new(number("1000000000"), 1, 10_000));

        let mut snapshot = store
            .find_by_account_number(&number("1000000000"))
            .unwrap()
            .unwrap();
        snapshot.use_balance(1_000).unwrap();

        let stored = store
            .find_by_account_number(&number("1000000000"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.balance, 10_000);
    }

    #[test]
    fn test_get_all_accounts_sorted() {
        let store = InMemoryAccountStore::new();
        store.insert(Account::new(number("1000000002"), 1, 0));
        store.insert(Account::new(number("1000000000"), 1, 0));
        store.insert(Account::new(number("1000000001"), 2, 0));

        let numbers: Vec<String> = store
            .get_all_accounts()
            .into_iter()
            .map(|a| a.account_number.to_string())
            .collect();
        assert_eq!(numbers, vec!["1000000000", "1000000001", "1000000002"]);
    }

    #[test]
    fn test_concurrent_saves_to_different_accounts() {
        let store = Arc::new(InMemoryAccountStore::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let account = Account::new(number(&format!("{:010}", i)), i, i * 100);
                store.save(account).unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 10);
        let account = store
            .find_by_account_number(&number("0000000007"))
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, 700);
    }
}
