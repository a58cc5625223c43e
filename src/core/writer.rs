use crate::core::record::Batch;
use crate::error::BatchError;

/// Represents the result of writing a batch of records.
pub type WriterResult = Result<(), BatchError>;

/// A trait for writing records to a data sink.
///
/// [`open`](RecordWriter::open) and [`close`](RecordWriter::close) follow
/// the same lifecycle as the reader: once each per run, on every exit path.
pub trait RecordWriter<O>: Send {
    /// Prepares the sink. May fail, which is fatal before the loop starts.
    fn open(&mut self) -> WriterResult {
        Ok(())
    }

    /// Writes the whole batch or fails for the whole batch; atomicity is
    /// the writer's responsibility if advertised. The engine only calls
    /// this with non-empty batches.
    ///
    /// A failure is recoverable through batch scanning when enabled,
    /// otherwise it is fatal to the run.
    fn write_records(&mut self, batch: &Batch<O>) -> WriterResult;

    /// Releases the sink. Best-effort, like the reader's close.
    fn close(&mut self) -> WriterResult {
        Ok(())
    }
}
