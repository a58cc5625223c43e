use std::sync::{Arc, Mutex};
use std::vec;

use crate::core::reader::{ReaderResult, RecordReader};
use crate::core::record::{Batch, Header, Record};
use crate::core::writer::{RecordWriter, WriterResult};
use crate::error::BatchError;

const IN_MEMORY_SOURCE: &str = "in-memory collection";

/// Reads records from an in-memory collection, numbering them from 1.
pub struct IterableRecordReader<P> {
    items: vec::IntoIter<P>,
    current: usize,
}

impl<P> IterableRecordReader<P> {
    pub fn new(items: impl IntoIterator<Item = P>) -> Self {
        Self {
            items: items.into_iter().collect::<Vec<_>>().into_iter(),
            current: 0,
        }
    }
}

impl<P: Send> RecordReader<P> for IterableRecordReader<P> {
    fn read_record(&mut self) -> ReaderResult<P> {
        Ok(self.items.next().map(|payload| {
            self.current += 1;
            Record::new(Header::new(self.current, IN_MEMORY_SOURCE), payload)
        }))
    }
}

/// Shared handle on the records collected by a [`CollectingRecordWriter`].
pub type CollectedRecords<P> = Arc<Mutex<Vec<Record<P>>>>;

/// Appends written records to a shared vector, preserving write order.
///
/// The caller keeps a clone of the sink to observe the output after the
/// job consumed the writer.
pub struct CollectingRecordWriter<P> {
    sink: CollectedRecords<P>,
}

impl<P> CollectingRecordWriter<P> {
    pub fn new(sink: CollectedRecords<P>) -> Self {
        Self { sink }
    }
}

impl<P: Clone + Send> RecordWriter<P> for CollectingRecordWriter<P> {
    fn write_records(&mut self, batch: &Batch<P>) -> WriterResult {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| BatchError::RecordWriter("records sink is poisoned".to_string()))?;
        for record in batch {
            sink.push(record.clone());
        }
        Ok(())
    }
}
