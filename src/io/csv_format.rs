//! CSV format handling for account seeds, operations and results
//!
//! This module centralizes all CSV format concerns, providing:
//! - `AccountRow` for the accounts seed file (`user,name,account,status,balance`)
//! - `CsvOperation` and its conversion to an [`OperationRecord`]
//!   (`op,user,account,tx,amount`)
//! - `ResultWriter` for the per-operation result file
//!
//! # Labels
//!
//! The `tx` column of a `use` row names the transaction about to be created,
//! because its real id is only generated at append time. `cancel` and
//! `query` rows refer back to that label; a value that is not a known label
//! is used as a literal transaction id.

use crate::core::batch_processor::ProcessingResult;
use crate::types::{Account, AccountNumber, AccountStatus, Amount, ErrorResponse, User, UserId};
use serde::Deserialize;
use std::io::{Read, Write};

/// One row of the accounts seed file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountRow {
    pub user: UserId,
    pub name: String,
    pub account: AccountNumber,
    pub status: String,
    pub balance: Amount,
}

/// Read users and accounts from the seed file
///
/// A user appearing on several rows is returned once.
///
/// # Errors
///
/// Returns an error naming the offending row if a row cannot be parsed or
/// has an unknown status. The seed must be fully valid.
pub fn read_accounts_csv<R: Read>(input: R) -> Result<(Vec<User>, Vec<Account>), String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut users: Vec<User> = Vec::new();
    let mut accounts = Vec::new();

    for (index, row) in reader.deserialize::<AccountRow>().enumerate() {
        let row = row.map_err(|e| format!("Invalid account row {}: {}", index + 1, e))?;
        let status: AccountStatus = row
            .status
            .parse()
            .map_err(|e| format!("Invalid account row {}: {}", index + 1, e))?;

        if !users.iter().any(|u| u.id == row.user) {
            users.push(User::new(row.user, row.name));
        }

        let account = Account::new(row.account, row.user, row.balance);
        accounts.push(match status {
            AccountStatus::Active => account,
            AccountStatus::Closed => account.closed(),
        });
    }

    Ok((users, accounts))
}

/// Raw operation row
///
/// Every column but `op` is optional; which ones are required depends on
/// the operation.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvOperation {
    pub op: String,
    pub user: Option<UserId>,
    pub account: Option<String>,
    pub tx: Option<String>,
    pub amount: Option<Amount>,
}

/// A validated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Use { user_id: UserId, amount: Amount },
    Cancel { amount: Amount },
    Query,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Use { .. } => "use",
            Operation::Cancel { .. } => "cancel",
            Operation::Query => "query",
        }
    }

    pub fn amount(&self) -> Option<Amount> {
        match self {
            Operation::Use { amount, .. } | Operation::Cancel { amount } => Some(*amount),
            Operation::Query => None,
        }
    }
}

/// An operation ready for replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    /// 1-based position of the row in the operations file
    pub line: usize,
    pub operation: Operation,
    /// Account number as written; validated when the lock key is derived
    pub account: String,
    /// Transaction label or literal id from the `tx` column
    pub label: Option<String>,
}

/// Convert a CsvOperation to an OperationRecord
///
/// Checks that the columns the operation needs are present. Account numbers
/// are not validated here.
///
/// # Returns
///
/// * `Ok(OperationRecord)` - Successfully converted record
/// * `Err(String)` - Error message describing the conversion failure
pub fn convert_csv_operation(csv: CsvOperation, line: usize) -> Result<OperationRecord, String> {
    let label = csv.tx.filter(|tx| !tx.trim().is_empty());
    let account = csv.account.unwrap_or_default();

    let operation = match csv.op.to_lowercase().as_str() {
        "use" => Operation::Use {
            user_id: csv
                .user
                .ok_or_else(|| format!("use on line {} requires a user", line))?,
            amount: csv
                .amount
                .ok_or_else(|| format!("use on line {} requires an amount", line))?,
        },
        "cancel" => {
            if label.is_none() {
                return Err(format!("cancel on line {} requires a tx", line));
            }
            Operation::Cancel {
                amount: csv
                    .amount
                    .ok_or_else(|| format!("cancel on line {} requires an amount", line))?,
            }
        }
        "query" => {
            if label.is_none() {
                return Err(format!("query on line {} requires a tx", line));
            }
            Operation::Query
        }
        _ => {
            return Err(format!(
                "Invalid operation: '{}' on line {}",
                csv.op, line
            ))
        }
    };

    Ok(OperationRecord {
        line,
        operation,
        account,
        label,
    })
}

const RESULT_HEADER: [&str; 11] = [
    "line",
    "op",
    "label",
    "account",
    "transaction_type",
    "transaction_result",
    "transaction_id",
    "amount",
    "transacted_at",
    "error_code",
    "error_message",
];

/// Streams operation results as CSV
///
/// The header is written on creation. Each batch is written sorted by line;
/// batches arrive in file order, so the whole output is sorted by line.
pub struct ResultWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResultWriter<W> {
    /// Create a writer and emit the header
    pub fn new(output: W) -> Result<Self, String> {
        let mut writer = csv::Writer::from_writer(output);
        writer
            .write_record(RESULT_HEADER)
            .map_err(|e| format!("Failed to write CSV header: {}", e))?;
        Ok(Self { writer })
    }

    /// Write one batch of results ordered by line
    pub fn write_batch(&mut self, mut results: Vec<ProcessingResult>) -> Result<(), String> {
        results.sort_by_key(|result| result.record.line);
        for result in &results {
            self.writer
                .write_record(result_row(result))
                .map_err(|e| format!("Failed to write CSV record: {}", e))?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), String> {
        self.writer
            .flush()
            .map_err(|e| format!("Failed to flush CSV writer: {}", e))
    }
}

fn result_row(result: &ProcessingResult) -> Vec<String> {
    let record = &result.record;
    let mut row = vec![
        record.line.to_string(),
        record.operation.name().to_string(),
        record.label.clone().unwrap_or_default(),
    ];

    match &result.result {
        Ok(dto) => row.extend([
            dto.account_number.to_string(),
            dto.transaction_type.to_string(),
            dto.transaction_result.to_string(),
            dto.transaction_id.to_string(),
            dto.amount.to_string(),
            dto.transacted_at.to_rfc3339(),
            String::new(),
            String::new(),
        ]),
        Err(error) => {
            let response = ErrorResponse::from(error);
            row.extend([
                record.account.trim().to_string(),
                String::new(),
                String::new(),
                String::new(),
                record
                    .operation
                    .amount()
                    .map(|a| a.to_string())
                    .unwrap_or_default(),
                String::new(),
                response.error_code.to_string(),
                response.error_message,
            ]);
        }
    }
    row
}
