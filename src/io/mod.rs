//! I/O module
//!
//! Handles CSV parsing and output for the replay driver.
//!
//! # Components
//!
//! - `csv_format` - Seed, operation and result formats
//! - `async_reader` - Asynchronous operation reader with batch reading interface

pub mod async_reader;
pub mod csv_format;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_csv_operation, read_accounts_csv, CsvOperation, Operation, OperationRecord,
    ResultWriter,
};
