//! Batch replay with account-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which replays batches of
//! operations against a [`TransactionService`] with accounts processed
//! concurrently and each account's operations kept in file order.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     ├── Arc<TransactionService>                 (lock-scoped operations)
//!     ├── Arc<DashMap<String, TransactionId>>     (tx labels → generated ids)
//!     └── Arc<Semaphore>                          (bounds concurrent accounts)
//! ```
//!
//! Partitioning only decides scheduling. Correctness between concurrent
//! operations on one account comes from the account lock, not from the
//! partitioning. Rows that reference another account's label wait for all
//! partitions, so label resolution does not depend on task scheduling.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::service::TransactionService;
use crate::io::csv_format::{Operation, OperationRecord};
use crate::types::{
    AccountError, CancelBalanceRequest, TransactionDto, TransactionId, UseBalanceRequest,
};
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::error;

/// Result of replaying a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The operation that was replayed
    pub record: OperationRecord,

    /// The transaction snapshot or the error
    pub result: Result<TransactionDto, AccountError>,
}

/// Operations of one batch grouped for scheduling
#[derive(Debug, Default)]
pub struct Partitions {
    /// Operations per account number, in file order
    pub by_account: HashMap<String, Vec<OperationRecord>>,

    /// Replayed after the account partitions, in file order: queries without
    /// an account, and cancels or queries naming a label that a use on
    /// another account of the same batch binds
    pub follow_up: Vec<OperationRecord>,
}

/// Batch processor with account-based partitioning
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    service: Arc<TransactionService>,

    /// Labels bound by successful uses
    labels: Arc<DashMap<String, TransactionId>>,

    /// Limits how many account partitions run at once
    limiter: Arc<Semaphore>,
}

impl BatchProcessor {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `service` - Shared service that performs the operations
    /// * `max_concurrent` - Maximum number of accounts processed at once
    pub fn new(service: Arc<TransactionService>, max_concurrent: usize) -> Self {
        Self {
            service,
            labels: Arc::new(DashMap::new()),
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Partition a batch by account number
    ///
    /// # Guarantees
    ///
    /// - Each operation appears in exactly one partition
    /// - Operations for each account keep their original order
    /// - Queries with a blank account go to `follow_up`
    /// - A cancel or query whose label is bound by a use on a different
    ///   account in this batch goes to `follow_up`, so it always sees that
    ///   binding
    pub fn partition_by_account(&self, batch: Vec<OperationRecord>) -> Partitions {
        let mut bound_on: HashMap<&str, HashSet<&str>> = HashMap::new();
        for record in &batch {
            if let (Operation::Use { .. }, Some(label)) = (&record.operation, &record.label) {
                bound_on
                    .entry(label.as_str())
                    .or_default()
                    .insert(record.account.trim());
            }
        }

        let mut follow_up_lines = HashSet::new();
        for record in &batch {
            let account = record.account.trim();
            let crosses_accounts = match (&record.operation, &record.label) {
                (Operation::Use { .. }, _) | (_, None) => false,
                (_, Some(label)) => bound_on
                    .get(label.as_str())
                    .is_some_and(|accounts| accounts.iter().any(|a| *a != account)),
            };
            let unscoped = record.operation == Operation::Query && account.is_empty();
            if crosses_accounts || unscoped {
                follow_up_lines.insert(record.line);
            }
        }

        let mut partitions = Partitions::default();
        for record in batch {
            if follow_up_lines.contains(&record.line) {
                partitions.follow_up.push(record);
            } else {
                partitions
                    .by_account
                    .entry(record.account.trim().to_string())
                    .or_default()
                    .push(record);
            }
        }

        partitions
    }

    /// Replay one account's operations sequentially
    pub async fn process_account_operations(
        &self,
        operations: Vec<OperationRecord>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(operations.len());
        for record in operations {
            results.push(self.process_operation(record).await);
        }
        results
    }

    /// Replay a single operation
    pub async fn process_operation(&self, record: OperationRecord) -> ProcessingResult {
        let result = match record.operation {
            Operation::Use { user_id, amount } => {
                let request = UseBalanceRequest::new(user_id, record.account.as_str(), amount);
                let result = self.service.use_balance(&request).await;
                if let (Ok(dto), Some(label)) = (&result, &record.label) {
                    self.labels
                        .insert(label.clone(), dto.transaction_id.clone());
                }
                result
            }
            Operation::Cancel { amount } => {
                let transaction_id = self.resolve(record.label.as_deref());
                let request =
                    CancelBalanceRequest::new(transaction_id, record.account.as_str(), amount);
                self.service.cancel_balance(&request).await
            }
            Operation::Query => {
                let transaction_id = self.resolve(record.label.as_deref());
                self.service.query_transaction(&transaction_id)
            }
        };

        ProcessingResult { record, result }
    }

    /// Replay a batch
    ///
    /// 1. Partition the batch by account
    /// 2. Spawn one task per account, at most `max_concurrent` running
    /// 3. Wait for all of them
    /// 4. Replay the follow-up operations
    ///
    /// # Returns
    ///
    /// One result per operation, in no particular order. Operations of a
    /// task that panicked are missing and the panic is logged.
    pub async fn process_batch(&self, batch: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        let partitions = self.partition_by_account(batch);

        let mut tasks = Vec::with_capacity(partitions.by_account.len());
        for (_account, operations) in partitions.by_account {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = Arc::clone(&processor.limiter).acquire_owned().await.ok();
                processor.process_account_operations(operations).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(account_results) => results.extend(account_results),
                Err(e) => error!("Account task panicked: {:?}", e),
            }
        }

        results.extend(self.process_account_operations(partitions.follow_up).await);
        results
    }

    /// Map a label to the id it was bound to, or use it as a literal id
    fn resolve(&self, label: Option<&str>) -> String {
        match label {
            Some(label) => self
                .labels
                .get(label)
                .map(|id| id.to_string())
                .unwrap_or_else(|| label.to_string()),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::account_store::{InMemoryAccountStore, InMemoryUserStore};
    use crate::core::traits::AccountStore;
    use crate::core::transaction_store::InMemoryTransactionStore;
    use crate::lock::InMemoryLockStore;
    use crate::types::{Account, AccountNumber, ErrorCode, TransactionType, User};

    fn processor() -> (BatchProcessor, Arc<InMemoryAccountStore>) {
        let users = Arc::new(InMemoryUserStore::new());
        users.insert(User::new(1, "Pororo"));
        let accounts = Arc::new(InMemoryAccountStore::new());
        for number in ["1000000000", "1000000001"] {
            accounts.insert(Account::new(AccountNumber::parse(number).unwrap(), 1, 10_000));
        }
        let service = TransactionService::from_config(
            users,
            accounts.clone(),
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(InMemoryLockStore::new()),
            &EngineConfig::default(),
        );
        (BatchProcessor::new(Arc::new(service), 4), accounts)
    }

    fn record(line: usize, operation: Operation, account: &str, label: Option<&str>) -> OperationRecord {
        OperationRecord {
            line,
            operation,
            account: account.to_string(),
            label: label.map(str::to_string),
        }
    }

    fn balance(accounts: &InMemoryAccountStore, number: &str) -> u64 {
        accounts
            .find_by_account_number(&AccountNumber::parse(number).unwrap())
            .unwrap()
            .unwrap()
            .balance
    }

    #[test]
    fn test_partition_by_account() {
        let (processor, _) = processor();
        let batch = vec![
            record(1, Operation::Use { user_id: 1, amount: 10 }, "1000000000", None),
            record(2, Operation::Use { user_id: 1, amount: 20 }, "1000000001", None),
            record(3, Operation::Cancel { amount: 10 }, "1000000000", Some("a")),
            record(4, Operation::Query, "", Some("a")),
            record(5, Operation::Use { user_id: 1, amount: 30 }, "", None),
        ];

        let partitions = processor.partition_by_account(batch);

        assert_eq!(partitions.by_account.len(), 3);
        let first: Vec<usize> = partitions.by_account["1000000000"]
            .iter()
            .map(|r| r.line)
            .collect();
        assert_eq!(first, vec![1, 3]);
        assert_eq!(partitions.by_account[""].len(), 1);
        assert_eq!(partitions.follow_up.len(), 1);
        assert_eq!(partitions.follow_up[0].line, 4);
    }

    #[test]
    fn test_cross_account_label_goes_to_follow_up() {
        let (processor, _) = processor();
        let batch = vec![
            record(1, Operation::Use { user_id: 1, amount: 10 }, "1000000000", Some("a")),
            record(2, Operation::Use { user_id: 1, amount: 20 }, "1000000001", Some("b")),
            record(3, Operation::Cancel { amount: 10 }, "1000000000", Some("a")),
            record(4, Operation::Cancel { amount: 20 }, "1000000000", Some("b")),
            record(5, Operation::Query, "1000000000", Some("b")),
            record(6, Operation::Cancel { amount: 5 }, "1000000001", Some("unbound")),
        ];

        let partitions = processor.partition_by_account(batch);

        let lines = |account: &str| -> Vec<usize> {
            partitions.by_account[account].iter().map(|r| r.line).collect()
        };
        assert_eq!(lines("1000000000"), vec![1, 3]);
        assert_eq!(lines("1000000001"), vec![2, 6]);
        let follow_up: Vec<usize> = partitions.follow_up.iter().map(|r| r.line).collect();
        assert_eq!(follow_up, vec![4, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cross_account_cancel_resolves_on_every_run() {
        for _ in 0..20 {
            let (processor, _) = processor();
            let batch = vec![
                record(1, Operation::Use { user_id: 1, amount: 900 }, "1000000000", Some("a")),
                record(2, Operation::Use { user_id: 1, amount: 500 }, "1000000001", Some("b")),
                record(3, Operation::Cancel { amount: 500 }, "1000000000", Some("b")),
            ];

            let mut results = processor.process_batch(batch).await;
            results.sort_by_key(|r| r.record.line);

            let used = results[1].result.as_ref().unwrap();
            let cancelled = results[2].result.as_ref().unwrap();
            assert_eq!(cancelled.transaction_type, TransactionType::Cancel);
            assert_eq!(cancelled.account_number.as_str(), "1000000000");
            assert_ne!(cancelled.transaction_id, used.transaction_id);
        }
    }

    #[tokio::test]
    async fn test_process_batch_resolves_labels() {
        let (processor, accounts) = processor();
        let batch = vec![
            record(1, Operation::Use { user_id: 1, amount: 900 }, "1000000000", Some("a")),
            record(2, Operation::Cancel { amount: 900 }, "1000000000", Some("a")),
            record(3, Operation::Query, "", Some("a")),
        ];

        let mut results = processor.process_batch(batch).await;
        results.sort_by_key(|r| r.record.line);

        let used = results[0].result.as_ref().unwrap();
        let cancelled = results[1].result.as_ref().unwrap();
        let queried = results[2].result.as_ref().unwrap();
        assert_eq!(cancelled.transaction_type, TransactionType::Cancel);
        assert_eq!(queried.transaction_id, used.transaction_id);
        assert_eq!(balance(&accounts, "1000000000"), 10_000);
    }

    #[tokio::test]
    async fn test_unknown_label_is_used_literally() {
        let (processor, _) = processor();

        let result = processor
            .process_operation(record(1, Operation::Query, "", Some("nope")))
            .await;

        assert_eq!(result.result.unwrap_err().code(), ErrorCode::TransactionNotFound);
    }

    #[tokio::test]
    async fn test_failed_use_does_not_bind_label() {
        let (processor, _) = processor();
        processor
            .process_operation(record(
                1,
                Operation::Use { user_id: 1, amount: 5 },
                "1000000000",
                Some("a"),
            ))
            .await;

        let result = processor
            .process_operation(record(2, Operation::Cancel { amount: 5 }, "1000000000", Some("a")))
            .await;

        assert_eq!(result.result.unwrap_err().code(), ErrorCode::TransactionNotFound);
    }

    #[tokio::test]
    async fn test_process_batch_keeps_per_account_order() {
        let (processor, accounts) = processor();
        let batch = vec![
            record(1, Operation::Use { user_id: 1, amount: 6_000 }, "1000000000", None),
            record(2, Operation::Use { user_id: 1, amount: 3_000 }, "1000000001", None),
            record(3, Operation::Use { user_id: 1, amount: 6_000 }, "1000000000", None),
            record(4, Operation::Use { user_id: 1, amount: 3_000 }, "1000000001", None),
        ];

        let mut results = processor.process_batch(batch).await;
        results.sort_by_key(|r| r.record.line);

        assert!(results[0].result.is_ok());
        assert!(results[1].result.is_ok());
        assert_eq!(
            results[2].result.as_ref().unwrap_err().code(),
            ErrorCode::AmountExceedBalance
        );
        assert!(results[3].result.is_ok());
        assert_eq!(balance(&accounts, "1000000000"), 4_000);
        assert_eq!(balance(&accounts, "1000000001"), 4_000);
    }

    #[tokio::test]
    async fn test_malformed_account_is_invalid_request() {
        let (processor, _) = processor();

        let result = processor
            .process_operation(record(1, Operation::Use { user_id: 1, amount: 900 }, "54321", None))
            .await;

        assert_eq!(result.result.unwrap_err().code(), ErrorCode::InvalidRequest);
    }
}
