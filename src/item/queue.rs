//! Queue bridging reader and writers.
//!
//! Jobs hand records to each other through work queues: an upstream job
//! writes records to one or more queues, downstream jobs read them with a
//! poll timeout. Producers signal completion by ceasing to enqueue;
//! consumers detect termination when a poll times out on an empty queue.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::error;

use crate::core::reader::{ReaderResult, RecordReader};
use crate::core::record::{Batch, Record};
use crate::core::writer::{RecordWriter, WriterResult};
use crate::error::BatchError;

/// Reads records from a work queue fed by another job.
///
/// A poll that times out, or a queue whose producers are all gone, is
/// reported as the end of the stream. Records pass through with the
/// headers their original reader assigned.
pub struct BlockingQueueRecordReader<P> {
    queue: Receiver<Record<P>>,
    timeout: Duration,
}

impl<P> BlockingQueueRecordReader<P> {
    pub fn new(queue: Receiver<Record<P>>, timeout: Duration) -> Self {
        Self { queue, timeout }
    }
}

impl<P: Send> RecordReader<P> for BlockingQueueRecordReader<P> {
    fn read_record(&mut self) -> ReaderResult<P> {
        match self.queue.recv_timeout(self.timeout) {
            Ok(record) => Ok(Some(record)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

/// Writes every record to a single work queue with a blocking put.
pub struct BlockingQueueRecordWriter<P> {
    queue: Sender<Record<P>>,
}

impl<P> BlockingQueueRecordWriter<P> {
    pub fn new(queue: Sender<Record<P>>) -> Self {
        Self { queue }
    }
}

impl<P: Clone + Send> RecordWriter<P> for BlockingQueueRecordWriter<P> {
    fn write_records(&mut self, batch: &Batch<P>) -> WriterResult {
        for record in batch {
            self.queue
                .send(record.clone())
                .map_err(|_| BatchError::RecordWriter("work queue is disconnected".to_string()))?;
        }
        Ok(())
    }
}

/// Decides whether a record belongs to a route.
pub trait Predicate<P>: Send {
    fn matches(&self, record: &Record<P>) -> bool;
}

/// Plain functions and closures can serve as predicates.
impl<P, F> Predicate<P> for F
where
    F: Fn(&Record<P>) -> bool + Send,
{
    fn matches(&self, record: &Record<P>) -> bool {
        self(record)
    }
}

/// Routes each record to the queue of the first matching predicate, in
/// route registration order.
///
/// Records matching no route are dropped, and the batch write reports a
/// writer error once every routable record has been delivered. The
/// routing table is fixed at construction; assemble it with
/// [`ContentBasedBlockingQueueRecordWriterBuilder`].
pub struct ContentBasedBlockingQueueRecordWriter<P> {
    routes: Vec<(Box<dyn Predicate<P>>, Sender<Record<P>>)>,
}

impl<P> ContentBasedBlockingQueueRecordWriter<P> {
    pub fn new(routes: Vec<(Box<dyn Predicate<P>>, Sender<Record<P>>)>) -> Self {
        Self { routes }
    }
}

impl<P: Clone + Send> RecordWriter<P> for ContentBasedBlockingQueueRecordWriter<P> {
    fn write_records(&mut self, batch: &Batch<P>) -> WriterResult {
        let mut unroutable = Vec::new();
        for record in batch {
            match self
                .routes
                .iter()
                .find(|(predicate, _)| predicate.matches(record))
            {
                Some((_, queue)) => queue.send(record.clone()).map_err(|_| {
                    BatchError::RecordWriter("work queue is disconnected".to_string())
                })?,
                None => {
                    error!("No matching queue for {}, dropping it", record.header());
                    unroutable.push(record.header().number());
                }
            }
        }
        if unroutable.is_empty() {
            Ok(())
        } else {
            Err(BatchError::RecordWriter(format!(
                "no matching queue for records {unroutable:?}, dropped"
            )))
        }
    }
}

/// Assembles the routing table of a
/// [`ContentBasedBlockingQueueRecordWriter`].
pub struct ContentBasedBlockingQueueRecordWriterBuilder<P> {
    routes: Vec<(Box<dyn Predicate<P>>, Sender<Record<P>>)>,
    pending: Option<Box<dyn Predicate<P>>>,
}

impl<P: 'static> ContentBasedBlockingQueueRecordWriterBuilder<P> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            pending: None,
        }
    }

    /// Starts a route for records matching `predicate`.
    pub fn when(mut self, predicate: impl Predicate<P> + 'static) -> Self {
        self.pending = Some(Box::new(predicate));
        self
    }

    /// Finishes the pending route, sending its records to `queue`.
    ///
    /// # Panics
    ///
    /// Panics when no `when` predicate is pending.
    pub fn write_to(mut self, queue: Sender<Record<P>>) -> Self {
        let predicate = self
            .pending
            .take()
            .expect("write_to must follow a when(predicate) call");
        self.routes.push((predicate, queue));
        self
    }

    /// Adds a catch-all route for records matching none of the previous
    /// ones, and builds the writer.
    pub fn otherwise(mut self, queue: Sender<Record<P>>) -> ContentBasedBlockingQueueRecordWriter<P> {
        self.routes
            .push((Box::new(|_: &Record<P>| true), queue));
        self.build()
    }

    pub fn build(self) -> ContentBasedBlockingQueueRecordWriter<P> {
        ContentBasedBlockingQueueRecordWriter {
            routes: self.routes,
        }
    }
}

impl<P: 'static> Default for ContentBasedBlockingQueueRecordWriterBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}
