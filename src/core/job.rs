//! The read-process-write pipeline engine.
//!
//! A [`BatchJob`] executes a linear state machine on a single thread:
//! open the reader and writer, accumulate records into batches while
//! running them through the processor chain, hand each batch to the
//! writer, then tear everything down. All concurrency lives in the
//! [executor](crate::core::executor); all failure lands in the
//! [report](crate::core::report::JobReport), never in a panic or an error
//! escaping the run.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::build_name;
use crate::core::listener::{
    BatchListener, CompositeBatchListener, CompositeJobListener, CompositePipelineListener,
    CompositeRecordReaderListener, CompositeRecordWriterListener, JobListener, PipelineDecision,
    PipelineListener, RecordReaderListener, RecordWriterListener,
};
use crate::core::monitor::{JobMonitor, NoOpJobMonitor};
use crate::core::processor::{ChainOutcome, CompositeRecordProcessor, RecordProcessor};
use crate::core::reader::{ReaderResult, RecordReader};
use crate::core::record::{Batch, Record};
use crate::core::report::{JobReport, JobStatus};
use crate::core::writer::{RecordWriter, WriterResult};
use crate::error::BatchError;

/// Configuration of a job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobParameters {
    batch_size: usize,
    error_threshold: usize,
    monitoring: bool,
    batch_scanning: bool,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            batch_size: 1,
            error_threshold: usize::MAX,
            monitoring: false,
            batch_scanning: false,
        }
    }
}

impl JobParameters {
    /// Number of records accumulated per write cycle. At least 1.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Cumulative processing errors tolerated before the run aborts.
    /// `usize::MAX` stands for an unlimited budget.
    pub fn error_threshold(&self) -> usize {
        self.error_threshold
    }

    /// Whether the monitor sink is notified on report changes.
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Whether a rejected batch is re-attempted record by record.
    pub fn is_batch_scanning_enabled(&self) -> bool {
        self.batch_scanning
    }

    pub(crate) fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size;
    }

    pub(crate) fn set_error_threshold(&mut self, error_threshold: usize) {
        self.error_threshold = error_threshold;
    }

    pub(crate) fn set_monitoring(&mut self, monitoring: bool) {
        self.monitoring = monitoring;
    }

    pub(crate) fn set_batch_scanning(&mut self, batch_scanning: bool) {
        self.batch_scanning = batch_scanning;
    }
}

/// Tracks whether the reader may still produce records.
///
/// Flips to false exactly once per run, when the reader first reports the
/// end of its stream. The partial batch in flight at that point is still
/// processed and written before the run loop exits.
#[derive(Debug)]
pub struct RecordTracker {
    more_records: bool,
}

impl RecordTracker {
    pub fn new() -> Self {
        Self { more_records: true }
    }

    pub fn more_records(&self) -> bool {
        self.more_records
    }

    pub fn no_more_records(&mut self) {
        self.more_records = false;
    }
}

impl Default for RecordTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation token shared between a job and its submitters.
///
/// The engine checks the token once per batch boundary: an in-flight
/// read, process or write runs to completion, then the job transitions to
/// [`JobStatus::Aborted`] through the regular teardown path.
#[derive(Debug, Clone, Default)]
pub struct Interruption {
    interrupted: Arc<AtomicBool>,
}

impl Interruption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals the job to stop at its next batch boundary.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }
}

/// A runnable batch job.
pub trait Job: Send {
    /// The job name, as set by the builder.
    fn name(&self) -> &str;

    /// The cancellation token of this job.
    fn interruption(&self) -> Interruption;

    /// Executes the job to completion and returns its report.
    ///
    /// Never fails: every outcome, fatal errors included, is reflected in
    /// the returned report.
    fn run(&mut self) -> JobReport;
}

/// Implementation of the read-process-write job pattern.
///
/// Assembled by a [`JobBuilder`](crate::core::builder::JobBuilder); `I` is
/// the payload type emitted by the reader and `O` the one accepted by the
/// writer. Between the two, the processor chain is free to go through any
/// intermediate payload types.
pub struct BatchJob<I, O> {
    id: Uuid,
    name: String,
    reader: Box<dyn RecordReader<I>>,
    writer: Box<dyn RecordWriter<O>>,
    processors: CompositeRecordProcessor,
    job_listener: CompositeJobListener,
    batch_listener: CompositeBatchListener<O>,
    reader_listener: CompositeRecordReaderListener<I>,
    writer_listener: CompositeRecordWriterListener<O>,
    pipeline_listener: CompositePipelineListener,
    monitor: Box<dyn JobMonitor>,
    parameters: JobParameters,
    report: JobReport,
    tracker: RecordTracker,
    interruption: Interruption,
}

impl<I, O> BatchJob<I, O>
where
    I: Any + Send,
    O: Any + Send,
{
    pub(crate) fn new(parameters: JobParameters) -> Self {
        let name = build_name();
        Self {
            id: Uuid::new_v4(),
            report: JobReport::new(name.clone(), parameters.clone()),
            name,
            reader: Box::new(NoOpRecordReader),
            writer: Box::new(NoOpRecordWriter),
            processors: CompositeRecordProcessor::new(),
            job_listener: CompositeJobListener::new(),
            batch_listener: CompositeBatchListener::new(),
            reader_listener: CompositeRecordReaderListener::new(),
            writer_listener: CompositeRecordWriterListener::new(),
            pipeline_listener: CompositePipelineListener::new(),
            monitor: Box::new(NoOpJobMonitor),
            parameters,
            tracker: RecordTracker::new(),
            interruption: Interruption::new(),
        }
    }

    /// The cancellation token of this job.
    pub fn interruption(&self) -> Interruption {
        self.interruption.clone()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.report.set_job_name(name.clone());
        self.name = name;
    }

    pub(crate) fn set_reader(&mut self, reader: Box<dyn RecordReader<I>>) {
        self.reader = reader;
    }

    pub(crate) fn set_writer(&mut self, writer: Box<dyn RecordWriter<O>>) {
        self.writer = writer;
    }

    pub(crate) fn set_monitor(&mut self, monitor: Box<dyn JobMonitor>) {
        self.monitor = monitor;
    }

    pub(crate) fn add_processor<A, B, P>(&mut self, processor: P)
    where
        A: Any + Send,
        B: Any + Send,
        P: RecordProcessor<A, B> + 'static,
    {
        self.processors.add_processor(processor);
    }

    pub(crate) fn add_job_listener<L: JobListener + 'static>(&mut self, listener: L) {
        self.job_listener.add_listener(listener);
    }

    pub(crate) fn add_batch_listener<L: BatchListener<O> + 'static>(&mut self, listener: L) {
        self.batch_listener.add_listener(listener);
    }

    pub(crate) fn add_reader_listener<L: RecordReaderListener<I> + 'static>(
        &mut self,
        listener: L,
    ) {
        self.reader_listener.add_listener(listener);
    }

    pub(crate) fn add_writer_listener<L: RecordWriterListener<O> + 'static>(
        &mut self,
        listener: L,
    ) {
        self.writer_listener.add_listener(listener);
    }

    pub(crate) fn add_pipeline_listener<L: PipelineListener + 'static>(&mut self, listener: L) {
        self.pipeline_listener.add_listener(listener);
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut JobParameters {
        &mut self.parameters
    }

    fn start(&mut self) {
        info!("Start of job '{}', id: {}", self.name, self.id);
        self.set_status(JobStatus::Starting);
        self.report.set_parameters(self.parameters.clone());
        self.job_listener.before_job(&self.parameters);
        self.tracker = RecordTracker::new();
        self.report
            .metrics_mut()
            .set_start_time(OffsetDateTime::now_utc());
        debug!("Batch size: {}", self.parameters.batch_size());
        debug!(
            "Error threshold: {}",
            format_error_threshold(self.parameters.error_threshold())
        );
        debug!("Monitoring: {}", self.parameters.is_monitoring());
        debug!(
            "Batch scanning: {}",
            self.parameters.is_batch_scanning_enabled()
        );
        if self.parameters.is_monitoring() {
            self.monitor.register(&self.report);
        }
    }

    fn execute(&mut self) -> Result<(), BatchError> {
        self.open_reader()?;
        self.open_writer()?;
        self.set_status(JobStatus::Started);
        while self.tracker.more_records() && !self.interruption.is_interrupted() {
            let batch = self.read_and_process_batch()?;
            self.write_batch(batch)?;
        }
        self.set_status(JobStatus::Stopping);
        Ok(())
    }

    fn open_reader(&mut self) -> Result<(), BatchError> {
        debug!("Opening record reader");
        self.reader.open().map_err(|err| {
            error!("Unable to open record reader: {err}");
            err
        })
    }

    fn open_writer(&mut self) -> Result<(), BatchError> {
        debug!("Opening record writer");
        self.writer.open().map_err(|err| {
            error!("Unable to open record writer: {err}");
            err
        })
    }

    fn set_status(&mut self, status: JobStatus) {
        if self.interruption.is_interrupted() {
            info!("Job '{}' has been interrupted, aborting execution", self.name);
        }
        info!("Job '{}' {}", self.name, status);
        self.report.set_status(status);
    }

    fn read_and_process_batch(&mut self) -> Result<Batch<O>, BatchError> {
        let mut batch = Batch::with_capacity(self.parameters.batch_size());
        self.batch_listener.before_batch_reading();
        for _ in 0..self.parameters.batch_size() {
            match self.read_record()? {
                Some(record) => {
                    self.report.metrics_mut().increment_read_count();
                    self.process_record(record, &mut batch)?;
                }
                None => {
                    debug!("No more records");
                    self.tracker.no_more_records();
                    break;
                }
            }
        }
        self.batch_listener.after_batch_processing(&batch);
        Ok(batch)
    }

    fn read_record(&mut self) -> ReaderResult<I> {
        debug!("Reading next record");
        self.reader_listener.before_record_reading();
        match self.reader.read_record() {
            Ok(record) => {
                self.reader_listener.after_record_reading(record.as_ref());
                Ok(record)
            }
            Err(err) => {
                self.reader_listener.on_record_reading_exception(&err);
                error!("Unable to read next record: {err}");
                Err(err)
            }
        }
    }

    fn process_record(&mut self, record: Record<I>, batch: &mut Batch<O>) -> Result<(), BatchError> {
        debug!("Processing {}", record.header());
        self.notify_job_update();
        let record = match self.pipeline_listener.before_record_processing(record.erase()) {
            PipelineDecision::Proceed(record) => record,
            PipelineDecision::Filter(record) => {
                debug!("{} has been filtered before processing", record.header());
                self.report.metrics_mut().increment_filter_count();
                self.pipeline_listener.after_record_processing(&record, None);
                return Ok(());
            }
        };
        match self.processors.process_record(&record) {
            Ok(ChainOutcome::Processed(payload)) => {
                let output = Record::new(record.header().clone(), payload);
                self.pipeline_listener
                    .after_record_processing(&record, Some(&output));
                batch.add_record(output.downcast::<O>());
                Ok(())
            }
            Ok(ChainOutcome::Identity) => {
                self.pipeline_listener
                    .after_record_processing(&record, Some(&record));
                batch.add_record(record.downcast::<O>());
                Ok(())
            }
            Ok(ChainOutcome::Filtered) => {
                debug!("{} has been filtered", record.header());
                self.report.metrics_mut().increment_filter_count();
                self.pipeline_listener.after_record_processing(&record, None);
                Ok(())
            }
            Err(err) => {
                error!("Unable to process {}: {err}", record.header());
                self.pipeline_listener
                    .on_record_processing_exception(&record, &err);
                self.report.metrics_mut().increment_error_count();
                self.report.set_last_error(err);
                let error_count = self.report.metrics().error_count();
                if error_count > self.parameters.error_threshold() {
                    error!("Error threshold exceeded, aborting execution");
                    return Err(BatchError::ErrorThresholdExceeded(error_count));
                }
                Ok(())
            }
        }
    }

    fn write_batch(&mut self, batch: Batch<O>) -> Result<(), BatchError> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!("Writing batch of {} records", batch.len());
        self.writer_listener.before_record_writing(&batch);
        match self.writer.write_records(&batch) {
            Ok(()) => {
                self.writer_listener.after_record_writing(&batch);
                self.batch_listener.after_batch_writing(&batch);
                self.report.metrics_mut().increment_write_count(batch.len());
                Ok(())
            }
            Err(err) => {
                self.writer_listener.on_record_writing_exception(&batch, &err);
                self.batch_listener.on_batch_writing_exception(&batch, &err);
                self.report.set_last_error(err.clone());
                if self.parameters.is_batch_scanning_enabled() {
                    self.scan(batch);
                    Ok(())
                } else {
                    error!("Unable to write records: {err}");
                    Err(err)
                }
            }
        }
    }

    /// Re-attempts every record of a rejected batch as a singleton write,
    /// so one poison record does not discard its neighbours. Non-transactional
    /// writers may have flushed a prefix of the batch already; a rollback
    /// hook in `on_batch_writing_exception` can compensate.
    fn scan(&mut self, batch: Batch<O>) {
        debug!("Scanning the rejected batch record by record");
        for mut record in batch {
            record.header_mut().set_scanned(true);
            let singleton = Batch::from_record(record);
            self.writer_listener.before_record_writing(&singleton);
            match self.writer.write_records(&singleton) {
                Ok(()) => {
                    self.writer_listener.after_record_writing(&singleton);
                    self.report
                        .metrics_mut()
                        .increment_write_count(singleton.len());
                }
                Err(err) => {
                    self.writer_listener
                        .on_record_writing_exception(&singleton, &err);
                    self.report.metrics_mut().increment_error_count();
                    self.report.set_last_error(err);
                }
            }
        }
        debug!("End of batch scanning");
    }

    fn teardown(&mut self) {
        let status = if self.interruption.is_interrupted() {
            JobStatus::Aborted
        } else {
            JobStatus::Completed
        };
        self.finish(status);
    }

    fn fail(&mut self, err: BatchError) {
        self.report.set_last_error(err);
        self.finish(JobStatus::Failed);
    }

    fn finish(&mut self, status: JobStatus) {
        self.report.set_status(status);
        self.report
            .metrics_mut()
            .set_end_time(OffsetDateTime::now_utc());
        info!(
            "Job '{}' finished with status {} in {}ms",
            self.name,
            status,
            self.report
                .metrics()
                .duration()
                .map(|duration| duration.whole_milliseconds())
                .unwrap_or_default()
        );
        self.notify_job_update();
        self.job_listener.after_job(&self.report);
    }

    fn close_reader(&mut self) {
        debug!("Closing record reader");
        if let Err(err) = self.reader.close() {
            error!("Unable to close record reader: {err}");
            self.report.set_last_error(err);
        }
    }

    fn close_writer(&mut self) {
        debug!("Closing record writer");
        if let Err(err) = self.writer.close() {
            error!("Unable to close record writer: {err}");
            self.report.set_last_error(err);
        }
    }

    fn notify_job_update(&self) {
        if self.parameters.is_monitoring() {
            self.monitor.notify_job_report_update(&self.report);
        }
    }
}

impl<I, O> Job for BatchJob<I, O>
where
    I: Any + Send,
    O: Any + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn interruption(&self) -> Interruption {
        self.interruption.clone()
    }

    fn run(&mut self) -> JobReport {
        self.start();
        match self.execute() {
            Ok(()) => {
                self.close_reader();
                self.close_writer();
                self.teardown();
            }
            Err(err) => {
                self.fail(err);
                self.close_reader();
                self.close_writer();
            }
        }
        self.report.clone()
    }
}

fn format_error_threshold(error_threshold: usize) -> String {
    if error_threshold == usize::MAX {
        "unlimited".to_string()
    } else {
        error_threshold.to_string()
    }
}

/// Reader installed when the builder gets none: the stream is immediately
/// at its end.
struct NoOpRecordReader;

impl<I> RecordReader<I> for NoOpRecordReader {
    fn read_record(&mut self) -> ReaderResult<I> {
        Ok(None)
    }
}

/// Writer installed when the builder gets none: records are discarded.
struct NoOpRecordWriter;

impl<O> RecordWriter<O> for NoOpRecordWriter {
    fn write_records(&mut self, _batch: &Batch<O>) -> WriterResult {
        Ok(())
    }
}
