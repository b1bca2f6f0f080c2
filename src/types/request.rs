//! Request payloads for lock-scoped operations
//!
//! Requests carry the raw account number exactly as the caller supplied it.
//! It is validated once, when the lock key is derived, so a malformed or
//! missing number is rejected before any lock is requested.

use super::account::{AccountNumber, Amount, UserId};
use super::error::AccountError;
use serde::{Deserialize, Serialize};

/// A request that targets exactly one account
pub trait LockKeySource {
    /// The account number field as supplied by the caller
    fn account_number_field(&self) -> &str;

    /// Derive the lock key from the request payload
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the field is blank or malformed.
    fn lock_key(&self) -> Result<AccountNumber, AccountError> {
        AccountNumber::parse(self.account_number_field())
    }
}

/// Debit `amount` from `account_number` on behalf of `user_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseBalanceRequest {
    pub user_id: UserId,
    pub account_number: String,
    pub amount: Amount,
}

impl UseBalanceRequest {
    pub fn new(user_id: UserId, account_number: impl Into<String>, amount: Amount) -> Self {
        Self {
            user_id,
            account_number: account_number.into(),
            amount,
        }
    }
}

impl LockKeySource for UseBalanceRequest {
    fn account_number_field(&self) -> &str {
        &self.account_number
    }
}

/// Credit back `amount` of transaction `transaction_id` to `account_number`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelBalanceRequest {
    pub transaction_id: String,
    pub account_number: String,
    pub amount: Amount,
}

impl CancelBalanceRequest {
    pub fn new(
        transaction_id: impl Into<String>,
        account_number: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            account_number: account_number.into(),
            amount,
        }
    }
}

impl LockKeySource for CancelBalanceRequest {
    fn account_number_field(&self) -> &str {
        &self.account_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_use_request_lock_key() {
        let request = UseBalanceRequest::new(1, "1000000000", 1_000);
        assert_eq!(request.lock_key().unwrap().as_str(), "1000000000");
    }

    #[test]
    fn test_cancel_request_lock_key() {
        let request = CancelBalanceRequest::new("tx", "1000000012", 200);
        assert_eq!(request.lock_key().unwrap().as_str(), "1000000012");
    }

    #[rstest]
    #[case::missing("")]
    #[case::short("54321")]
    #[case::letters("abcdefghij")]
    fn test_malformed_lock_key_is_invalid_request(#[case] raw: &str) {
        let request = UseBalanceRequest::new(123, raw, 1_000);
        assert!(matches!(
            request.lock_key(),
            Err(AccountError::InvalidRequest { .. })
        ));
    }
}
