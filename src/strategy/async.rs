//! Asynchronous batch replay strategy
//!
//! This module provides the multi-threaded implementation of the
//! ProcessingStrategy trait. It seeds in-memory stores from the accounts
//! file and replays the operations file in batches.
//!
//! # Architecture
//!
//! ```text
//! AsyncReplayStrategy
//!     ├── EngineConfig (lock, use_delay, cancel_policy, batch)
//!     ├── read_accounts_csv (seed users and accounts)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (account partitioning + task spawning)
//!     └── TransactionService (lock-scoped operations)
//!         ├── LockScope → LockManager → InMemoryLockStore
//!         └── TransactionEngine → in-memory user/account/transaction stores
//! ```
//!
//! Batches are replayed one after another so an account's operations keep
//! their file order across batch boundaries; within a batch, accounts run
//! in parallel.

use crate::config::EngineConfig;
use crate::core::{
    BatchProcessor, InMemoryAccountStore, InMemoryTransactionStore, InMemoryUserStore,
    TransactionService,
};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::{read_accounts_csv, ResultWriter};
use crate::lock::InMemoryLockStore;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Asynchronous batch replay strategy
///
/// # Configuration
///
/// - `batch.batch_size`: Number of operations per batch (default: 1000)
/// - `batch.max_concurrent`: Worker threads and concurrent accounts (default: CPU cores)
/// - `lock`, `use_delay`, `cancel_policy`: passed through to the service
#[derive(Debug, Clone)]
pub struct AsyncReplayStrategy {
    config: EngineConfig,
    accounts_path: PathBuf,
}

impl AsyncReplayStrategy {
    /// Create a new AsyncReplayStrategy
    ///
    /// # Arguments
    ///
    /// * `config` - Engine and batch configuration
    /// * `accounts_path` - Seed file with users and accounts
    pub fn new(config: EngineConfig, accounts_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            accounts_path: accounts_path.into(),
        }
    }
}

impl ProcessingStrategy for AsyncReplayStrategy {
    /// Replay the operations file and write one result row per operation
    ///
    /// 1. Seeds user and account stores from the accounts file
    /// 2. Creates a tokio multi-threaded runtime
    /// 3. Reads operations in batches using AsyncReader
    /// 4. Replays each batch and waits for it before reading the next
    /// 5. Writes each batch's results, ordered by line
    ///
    /// # Error Handling
    ///
    /// Fatal errors (unreadable files, invalid seed, output failures) are
    /// returned immediately. Rejected operations are reported in the output.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let seed = std::fs::File::open(&self.accounts_path).map_err(|e| {
            format!(
                "Failed to open accounts file '{}': {}",
                self.accounts_path.display(),
                e
            )
        })?;
        let (users, accounts) = read_accounts_csv(seed)?;

        let user_store = Arc::new(InMemoryUserStore::new());
        for user in users {
            user_store.insert(user);
        }
        let account_store = Arc::new(InMemoryAccountStore::new());
        for account in accounts {
            account_store.insert(account);
        }
        info!(
            users = user_store.len(),
            accounts = account_store.len(),
            "Seeded stores"
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.batch.max_concurrent.max(1))
            .enable_time()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let transaction_store = Arc::new(InMemoryTransactionStore::new());
            let service = TransactionService::from_config(
                user_store,
                account_store,
                transaction_store.clone(),
                Arc::new(InMemoryLockStore::new()),
                &self.config,
            );
            let processor =
                BatchProcessor::new(Arc::new(service), self.config.batch.max_concurrent);

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);
            let mut writer = ResultWriter::new(output)?;

            let mut succeeded = 0usize;
            let mut rejected = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                let ok = results.iter().filter(|r| r.result.is_ok()).count();
                succeeded += ok;
                rejected += results.len() - ok;
                writer.write_batch(results)?;
            }
            writer.flush()?;

            info!(
                lines = reader.lines_read(),
                succeeded,
                rejected,
                transactions = transaction_store.len(),
                "Replay finished"
            );
            Ok(())
        })
    }
}
