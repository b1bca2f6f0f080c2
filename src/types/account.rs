//! Account-related types for the account balance engine
//!
//! This module defines the Account structure, its validated account number,
//! and the user that owns it. Accounts are created and closed outside this
//! crate; the engine only reads them and adjusts their balance.

use super::error::AccountError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User identifier
pub type UserId = u64;

/// Monetary value in the smallest currency unit
///
/// Unsigned so that a balance can never be negative by construction.
pub type Amount = u64;

/// Number of digits in every account number
pub const ACCOUNT_NUMBER_LEN: usize = 10;

/// Fixed-width numeric account number
///
/// Always exactly [`ACCOUNT_NUMBER_LEN`] ASCII digits. This is also the lock
/// key used to serialise operations on the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Parse and validate an account number
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidRequest` if the value is blank, has the
    /// wrong length, or contains anything other than ASCII digits.
    pub fn parse(value: &str) -> Result<Self, AccountError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AccountError::invalid_request("account number is missing"));
        }
        if value.len() != ACCOUNT_NUMBER_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccountError::invalid_request(&format!(
                "account number '{}' must be exactly {} digits",
                value, ACCOUNT_NUMBER_LEN
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.0
    }
}

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    /// The account accepts balance operations
    Active,
    /// The account has been unregistered and rejects new uses
    Closed,
}

impl FromStr for AccountStatus {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(AccountStatus::Active),
            "CLOSED" => Ok(AccountStatus::Closed),
            other => Err(AccountError::invalid_request(&format!(
                "unknown account status '{}'",
                other
            ))),
        }
    }
}

/// Owner of one or more accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Account state
///
/// Owned by the account subsystem. The engine works on a copy for the
/// duration of one lock-protected operation and writes it back through the
/// account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account number (also the lock key)
    pub account_number: AccountNumber,

    /// The user that owns this account
    pub user_id: UserId,

    /// Whether the account is still in use
    pub status: AccountStatus,

    /// Current balance in the smallest currency unit
    pub balance: Amount,

    pub registered_at: DateTime<Utc>,

    /// Set when the account is closed
    pub unregistered_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new active account registered now
    ///
    /// # Arguments
    ///
    /// * `account_number` - The account number
    /// * `user_id` - The owning user
    /// * `balance` - The opening balance
    pub fn new(account_number: AccountNumber, user_id: UserId, balance: Amount) -> Self {
        Account {
            account_number,
            user_id,
            status: AccountStatus::Active,
            balance,
            registered_at: Utc::now(),
            unregistered_at: None,
        }
    }

    /// Return a closed copy of this account
    pub fn closed(mut self) -> Self {
        self.status = AccountStatus::Closed;
        self.unregistered_at = Some(Utc::now());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Debit the balance
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if `amount` exceeds the balance; the
    /// balance is left untouched in that case.
    pub fn use_balance(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.balance = self.balance.checked_sub(amount).ok_or_else(|| {
            AccountError::insufficient_balance(&self.account_number, self.balance, amount)
        })?;
        Ok(())
    }

    /// Credit the balance
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the balance would not fit in an
    /// [`Amount`]; the balance is left untouched in that case.
    pub fn cancel_balance(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| AccountError::arithmetic_overflow("cancel", &self.account_number))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn number(value: &str) -> AccountNumber {
        AccountNumber::parse(value).unwrap()
    }

    #[rstest]
    #[case::plain("1000000000")]
    #[case::surrounding_whitespace(" 1000000012 ")]
    fn test_account_number_accepts_ten_digits(#[case] raw: &str) {
        let parsed = AccountNumber::parse(raw).unwrap();
        assert_eq!(parsed.as_str(), raw.trim());
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::too_short("54321")]
    #[case::too_long("10000000000")]
    #[case::not_numeric("10000000a0")]
    fn test_account_number_rejects_malformed(#[case] raw: &str) {
        let result = AccountNumber::parse(raw);
        assert!(matches!(result, Err(AccountError::InvalidRequest { .. })));
    }

    #[derive(Debug, Deserialize)]
    struct AccountRow {
        account: AccountNumber,
    }

    fn deserialize_row(data: &str) -> Result<AccountRow, csv::Error> {
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        reader.deserialize().next().unwrap()
    }

    #[test]
    fn test_account_number_deserialize_validates() {
        let row = deserialize_row("account\n1000000000\n").unwrap();
        assert_eq!(row.account, number("1000000000"));
    }

    #[test]
    fn test_account_number_deserialize_rejects_malformed() {
        assert!(deserialize_row("account\n12345\n").is_err());
    }

    #[rstest]
    #[case("ACTIVE", AccountStatus::Active)]
    #[case("closed", AccountStatus::Closed)]
    fn test_account_status_from_str(#[case] raw: &str, #[case] expected: AccountStatus) {
        assert_eq!(raw.parse::<AccountStatus>().unwrap(), expected);
    }

    #[test]
    fn test_new_account_is_active() {
        let account = Account::new(number("1000000000"), 1, 10_000);
        assert!(account.is_active());
        assert_eq!(account.balance, 10_000);
        assert!(account.unregistered_at.is_none());
    }

    #[test]
    fn test_closed_account_records_unregistration() {
        let account = Account::new(number("1000000000"), 1, 0).closed();
        assert_eq!(account.status, AccountStatus::Closed);
        assert!(account.unregistered_at.is_some());
    }

    #[test]
    fn test_use_balance_debits() {
        let mut account = Account::new(number("1000000000"), 1, 10_000);
        account.use_balance(900).unwrap();
        assert_eq!(account.balance, 9_100);
    }

    #[test]
    fn test_use_balance_allows_exact_balance() {
        let mut account = Account::new(number("1000000000"), 1, 900);
        account.use_balance(900).unwrap();
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_use_balance_insufficient_leaves_balance() {
        let mut account = Account::new(number("1000000000"), 1, 900);
        let result = account.use_balance(1_000);
        assert!(matches!(
            result,
            Err(AccountError::InsufficientBalance {
                balance: 900,
                requested: 1_000,
                ..
            })
        ));
        assert_eq!(account.balance, 900);
    }

    #[test]
    fn test_cancel_balance_credits() {
        let mut account = Account::new(number("1000000000"), 1, 9_100);
        account.cancel_balance(900).unwrap();
        assert_eq!(account.balance, 10_000);
    }

    #[test]
    fn test_cancel_balance_overflow() {
        let mut account = Account::new(number("1000000000"), 1, Amount::MAX);
        let result = account.cancel_balance(1);
        assert!(matches!(result, Err(AccountError::ArithmeticOverflow { .. })));
        assert_eq!(account.balance, Amount::MAX);
    }
}
