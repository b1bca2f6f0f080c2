use crate::config::{BatchConfig, CancelPolicy, EngineConfig, LockConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Replay balance operations against per-account locked accounts
#[derive(Parser, Debug)]
#[command(name = "account-balance-engine")]
#[command(about = "Replay balance use/cancel operations under per-account locks", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing operation records
    #[arg(value_name = "OPERATIONS", help = "Path to the operations CSV file")]
    pub input_file: PathBuf,

    /// Seed file with users and accounts
    #[arg(
        long = "accounts",
        value_name = "ACCOUNTS",
        help = "Path to the accounts CSV file (user,name,account,status,balance)"
    )]
    pub accounts_file: PathBuf,

    #[arg(
        long = "acquire-timeout-ms",
        value_name = "MS",
        help = "How long to wait for a busy account lock (default: 1000)"
    )]
    pub acquire_timeout_ms: Option<u64>,

    #[arg(
        long = "hold-timeout-ms",
        value_name = "MS",
        help = "Lease after which an account lock expires (default: 15000)"
    )]
    pub hold_timeout_ms: Option<u64>,

    #[arg(
        long = "retry-interval-ms",
        value_name = "MS",
        help = "Pause between lock attempts (default: 50)"
    )]
    pub retry_interval_ms: Option<u64>,

    #[arg(
        long = "use-delay-ms",
        value_name = "MS",
        default_value_t = 0,
        help = "Pause inside the lock on every use, to make contention visible"
    )]
    pub use_delay_ms: u64,

    /// Reject cancels of foreign, non-use or already cancelled transactions
    #[arg(long = "strict-cancel")]
    pub strict_cancel: bool,

    /// Number of operations per batch
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of accounts processed concurrently
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of accounts processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long = "json-logs")]
    pub json_logs: bool,
}

impl CliArgs {
    /// Create an EngineConfig from CLI arguments
    ///
    /// Unset options keep their defaults; zero values fall back to defaults
    /// with a warning. A use delay of half the hold timeout or more is
    /// clamped.
    pub fn to_engine_config(&self) -> EngineConfig {
        let lock_default = LockConfig::default();
        let lock = LockConfig::new(
            self.acquire_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(lock_default.acquire_timeout),
            self.hold_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(lock_default.hold_timeout),
            self.retry_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(lock_default.retry_interval),
            lock_default.store_call_timeout,
        );

        let batch_default = BatchConfig::default();
        let batch = BatchConfig::new(
            self.batch_size.unwrap_or(batch_default.batch_size),
            self.max_concurrent.unwrap_or(batch_default.max_concurrent),
        );

        let cancel_policy = if self.strict_cancel {
            CancelPolicy::Strict
        } else {
            CancelPolicy::Lenient
        };

        EngineConfig::new(
            lock,
            Duration::from_millis(self.use_delay_ms),
            cancel_policy,
            batch,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BASE: [&str; 4] = ["program", "--accounts", "accounts.csv", "ops.csv"];

    fn parse(extra: &[&str]) -> CliArgs {
        let mut args: Vec<&str> = BASE.to_vec();
        args.extend_from_slice(extra);
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_required_arguments() {
        let parsed = parse(&[]);
        assert_eq!(parsed.input_file, PathBuf::from("ops.csv"));
        assert_eq!(parsed.accounts_file, PathBuf::from("accounts.csv"));
        assert!(!parsed.strict_cancel);
        assert!(!parsed.json_logs);
    }

    #[test]
    fn test_defaults_produce_default_config() {
        let config = parse(&[]).to_engine_config();
        assert_eq!(config, EngineConfig::default());
    }

    #[rstest]
    #[case::acquire(&["--acquire-timeout-ms", "250"], Duration::from_millis(250), Duration::from_secs(15), Duration::from_millis(50))]
    #[case::hold(&["--hold-timeout-ms", "3000"], Duration::from_secs(1), Duration::from_secs(3), Duration::from_millis(50))]
    #[case::retry(&["--retry-interval-ms", "10"], Duration::from_secs(1), Duration::from_secs(15), Duration::from_millis(10))]
    #[case::zero_falls_back(&["--acquire-timeout-ms", "0", "--retry-interval-ms", "0"], Duration::from_secs(1), Duration::from_secs(15), Duration::from_millis(50))]
    fn test_lock_options(
        #[case] extra: &[&str],
        #[case] acquire: Duration,
        #[case] hold: Duration,
        #[case] retry: Duration,
    ) {
        let config = parse(extra).to_engine_config();
        assert_eq!(config.lock.acquire_timeout, acquire);
        assert_eq!(config.lock.hold_timeout, hold);
        assert_eq!(config.lock.retry_interval, retry);
    }

    #[rstest]
    #[case::all_defaults(&[], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["--batch-size", "2000"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["--max-concurrent", "8"], 1000, 8)]
    #[case::zero_batch_size(&["--batch-size", "0"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["--max-concurrent", "0"], 1000, num_cpus::get())]
    fn test_batch_options(
        #[case] extra: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = parse(extra).to_engine_config();
        assert_eq!(config.batch.batch_size, expected_batch_size);
        assert_eq!(config.batch.max_concurrent, expected_max_concurrent);
    }

    #[test]
    fn test_engine_options() {
        let config = parse(&["--strict-cancel", "--use-delay-ms", "5000"]).to_engine_config();
        assert_eq!(config.cancel_policy, CancelPolicy::Strict);
        assert_eq!(config.use_delay, Duration::from_secs(5));
    }

    #[rstest]
    #[case::default_lease(&["--use-delay-ms", "20000"], Duration::from_millis(7_500))]
    #[case::short_lease(&["--hold-timeout-ms", "1000", "--use-delay-ms", "900"], Duration::from_millis(500))]
    #[case::within_lease(&["--hold-timeout-ms", "1000", "--use-delay-ms", "200"], Duration::from_millis(200))]
    fn test_use_delay_clamped_below_lease(#[case] extra: &[&str], #[case] expected: Duration) {
        let config = parse(extra).to_engine_config();
        assert_eq!(config.use_delay, expected);
        assert!(config.use_delay < config.lock.hold_timeout);
    }

    #[rstest]
    #[case::missing_input(&["program", "--accounts", "accounts.csv"])]
    #[case::missing_accounts(&["program", "ops.csv"])]
    #[case::invalid_number(&["program", "--accounts", "a.csv", "--batch-size", "many", "ops.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
