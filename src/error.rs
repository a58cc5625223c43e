use thiserror::Error;

/// Batch error
///
/// Each failure kind of the engine has its own variant, so callers can tell
/// a fatal reader failure apart from a budgeted processing error or a
/// recoverable write failure.
#[derive(Error, Debug, Clone)]
pub enum BatchError {
    /// The record reader failed to open, read or close.
    #[error("record reader: {0}")]
    RecordReader(String),

    /// A processor in the pipeline failed on a record.
    #[error("record processor: {0}")]
    RecordProcessor(String),

    /// The record writer failed to open, write or close.
    #[error("record writer: {0}")]
    RecordWriter(String),

    /// The cumulative processing error budget of the run is exhausted.
    #[error("error threshold exceeded after {0} errors")]
    ErrorThresholdExceeded(usize),
}
