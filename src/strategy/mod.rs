//! Processing strategy module for operation replay
//!
//! Defines the Strategy pattern for the complete replay pipeline, from
//! reading the operations file to writing one result row per operation.

use crate::config::EngineConfig;
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod r#async;

pub use self::r#async::AsyncReplayStrategy;

/// Processing strategy trait for complete replay pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Replay operations from `input_path` and write results to `output`
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the file was replayed; rejected operations are reported
    ///   in the output, not as an error
    /// * `Err(String)` if a fatal error occurred (file not found, I/O error,
    ///   invalid seed data)
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create the replay strategy for a configuration
///
/// # Arguments
///
/// * `config` - Engine and batch configuration
/// * `accounts_path` - Seed file with users and accounts
pub fn create_strategy(
    config: EngineConfig,
    accounts_path: impl Into<PathBuf>,
) -> Box<dyn ProcessingStrategy> {
    Box::new(AsyncReplayStrategy::new(config, accounts_path))
}
