//! Asynchronous CSV reader for operation files
//!
//! Provides batch reading over operation records from a CSV file, with
//! constant memory use regardless of file size.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of OperationRecords
//!                  ↓
//!           csv_format module
//!           (CsvOperation, convert_csv_operation)
//! ```

use crate::io::csv_format::{convert_csv_operation, CsvOperation, OperationRecord};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Numbers every data row from 1, counting rows that fail to parse, so a
/// result line always points at the row it came from.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    lines_read: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            lines_read: 0,
        }
    }

    /// Read a batch of operation records
    ///
    /// Reads up to `batch_size` rows. Rows that cannot be parsed or
    /// converted are logged and skipped, but still consume a line number.
    ///
    /// # Returns
    ///
    /// The successfully converted records of this batch. An empty vector
    /// means the end of the file was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<OperationRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvOperation>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => {
                    self.lines_read += 1;
                    match convert_csv_operation(csv_record, self.lines_read) {
                        Ok(record) => batch.push(record),
                        Err(e) => warn!(line = self.lines_read, "Record conversion error: {}", e),
                    }
                }
                Some(Err(e)) => {
                    self.lines_read += 1;
                    warn!(line = self.lines_read, "CSV parse error: {}", e);
                }
                None => break,
            }
        }

        batch
    }

    /// Number of data rows consumed so far
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }
}
