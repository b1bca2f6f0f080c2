//! Account Balance Engine CLI
//!
//! Replays balance operations from a CSV file against accounts seeded from
//! another CSV file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv operations.csv > results.csv
//! cargo run -- --accounts accounts.csv --strict-cancel operations.csv > results.csv
//! cargo run -- --accounts accounts.csv --use-delay-ms 200 --json-logs operations.csv > results.csv
//! ```
//!
//! One result row per operation goes to stdout; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success (rejected operations are reported in the output)
//! - 1: Error (missing arguments, file not found, invalid seed, etc.)

use account_balance_engine::cli;
use account_balance_engine::strategy;
use std::process;

fn main() {
    let args = cli::parse_args();

    if let Err(e) = cli::init_logging(args.json_logs) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let strategy = strategy::create_strategy(args.to_engine_config(), &args.accounts_file);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
