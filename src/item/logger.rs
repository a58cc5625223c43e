use std::fmt::Debug;

use log::info;

use crate::core::record::Batch;
use crate::core::writer::{RecordWriter, WriterResult};

/// Writes every record to the log at info level.
#[derive(Debug, Default)]
pub struct LoggerWriter;

impl<P> RecordWriter<P> for LoggerWriter
where
    P: Debug,
{
    fn write_records(&mut self, batch: &Batch<P>) -> WriterResult {
        for record in batch {
            info!("{}: {:?}", record.header(), record.payload());
        }
        Ok(())
    }
}
