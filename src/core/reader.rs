use crate::core::record::Record;
use crate::error::BatchError;

/// Represents the result of reading a record from the reader.
///
/// This type is a specialized `Result` that can be:
/// - `Ok(Some(record))` when a record is successfully read
/// - `Ok(None)` when there are no more records to read (end of stream)
/// - `Err(BatchError)` when an error occurs during reading
pub type ReaderResult<I> = Result<Option<Record<I>>, BatchError>;

/// A trait for reading records from a data source.
///
/// Readers are stateful: the engine calls [`open`](RecordReader::open)
/// exactly once before the first read and [`close`](RecordReader::close)
/// exactly once after the run loop terminates, on success and on failure
/// alike. A read failure is fatal to the current run, unlike processor
/// errors which are budgeted against the error threshold.
///
/// Readers create the records they emit and assign header numbers from
/// their own counter, starting at 1.
pub trait RecordReader<I>: Send {
    /// Prepares the source. May fail, which is fatal before the loop starts.
    fn open(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Reads the next record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` when a record is successfully read
    /// - `Ok(None)` once the source is exhausted
    /// - `Err(BatchError)` when an error occurs during reading
    fn read_record(&mut self) -> ReaderResult<I>;

    /// Releases the source. Must be idempotent and best-effort: close
    /// failures are logged and recorded as the last error of the run but
    /// never change its terminal status.
    fn close(&mut self) -> Result<(), BatchError> {
        Ok(())
    }
}
