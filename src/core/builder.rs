//! Declarative assembly of batch jobs.

use std::any::Any;

use crate::core::job::{BatchJob, Interruption, JobParameters};
use crate::core::listener::{
    BatchListener, JobListener, PipelineListener, RecordReaderListener, RecordWriterListener,
};
use crate::core::monitor::JobMonitor;
use crate::core::processor::RecordProcessor;
use crate::core::reader::RecordReader;
use crate::core::writer::RecordWriter;

/// Batch job builder. This is the main entry point to configure batch jobs.
///
/// `I` is the payload type read from the source and `O` the one written to
/// the sink. Every configuration method returns the builder, so a job is
/// assembled as one chained expression:
///
/// ```
/// use batchflow::core::builder::JobBuilder;
/// use batchflow::core::job::Job;
/// use batchflow::core::processor::ProcessorResult;
/// use batchflow::item::logger::LoggerWriter;
/// use batchflow::item::memory::IterableRecordReader;
///
/// let mut job = JobBuilder::<i64, i64>::new()
///     .named("tournament")
///     .reader(IterableRecordReader::new(vec![3i64, 1, 4, 1, 5]))
///     .filter(|score: &i64| -> ProcessorResult<i64> {
///         Ok((*score > 1).then_some(*score))
///     })
///     .writer(LoggerWriter)
///     .batch_size(2)
///     .build();
///
/// let report = job.run();
/// assert_eq!(report.metrics().write_count(), 3);
/// assert_eq!(report.metrics().filter_count(), 2);
/// ```
pub struct JobBuilder<I, O> {
    job: BatchJob<I, O>,
}

impl<I, O> JobBuilder<I, O>
where
    I: Any + Send,
    O: Any + Send,
{
    pub fn new() -> Self {
        Self {
            job: BatchJob::new(JobParameters::default()),
        }
    }

    /// The cancellation token of the job under construction, so listeners
    /// or other collaborators can be wired to it before `build`.
    pub fn interruption(&self) -> Interruption {
        self.job.interruption()
    }

    /// Sets the job name. Unnamed jobs get a random one.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.job.set_name(name.into());
        self
    }

    /// Registers the record reader. Without one, the job reads an empty
    /// stream.
    pub fn reader(mut self, reader: impl RecordReader<I> + 'static) -> Self {
        self.job.set_reader(Box::new(reader));
        self
    }

    /// Registers the record writer. Without one, records are discarded.
    pub fn writer(mut self, writer: impl RecordWriter<O> + 'static) -> Self {
        self.job.set_writer(Box::new(writer));
        self
    }

    /// Appends a processor to the pipeline. Stages run in registration
    /// order; the payload type produced by each stage must match the input
    /// type of the next one.
    pub fn processor<A, B>(mut self, processor: impl RecordProcessor<A, B> + 'static) -> Self
    where
        A: Any + Send,
        B: Any + Send,
    {
        self.job.add_processor(processor);
        self
    }

    /// Appends a payload-preserving filtering stage.
    pub fn filter<A>(self, filter: impl RecordProcessor<A, A> + 'static) -> Self
    where
        A: Any + Send,
    {
        self.processor(filter)
    }

    /// Appends a payload-preserving validation stage.
    pub fn validator<A>(self, validator: impl RecordProcessor<A, A> + 'static) -> Self
    where
        A: Any + Send,
    {
        self.processor(validator)
    }

    /// Appends a mapping stage.
    pub fn mapper<A, B>(self, mapper: impl RecordProcessor<A, B> + 'static) -> Self
    where
        A: Any + Send,
        B: Any + Send,
    {
        self.processor(mapper)
    }

    /// Appends a marshalling stage.
    pub fn marshaller<A, B>(self, marshaller: impl RecordProcessor<A, B> + 'static) -> Self
    where
        A: Any + Send,
        B: Any + Send,
    {
        self.processor(marshaller)
    }

    /// Sets the number of records per write cycle.
    ///
    /// # Panics
    ///
    /// Panics when `batch_size` is zero.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size >= 1, "batch size must be >= 1");
        self.job.parameters_mut().set_batch_size(batch_size);
        self
    }

    /// Sets the budget of processing errors tolerated before the job
    /// aborts. Unlimited by default.
    pub fn error_threshold(mut self, error_threshold: usize) -> Self {
        self.job.parameters_mut().set_error_threshold(error_threshold);
        self
    }

    /// Activates monitor notifications on report changes.
    pub fn enable_monitoring(mut self, monitoring: bool) -> Self {
        self.job.parameters_mut().set_monitoring(monitoring);
        self
    }

    /// Activates batch scanning. When a batch write fails, records are
    /// re-attempted one by one as singleton batches, so faulty records can
    /// be skipped instead of failing the whole job at the first rejected
    /// batch.
    ///
    /// This plays well with transactional writers, where a failed write
    /// can be re-executed without side effects. With a non-transactional
    /// writer a prefix of the batch may be written twice; compensate with
    /// a rollback action in
    /// [`BatchListener::on_batch_writing_exception`].
    pub fn enable_batch_scanning(mut self, batch_scanning: bool) -> Self {
        self.job.parameters_mut().set_batch_scanning(batch_scanning);
        self
    }

    /// Installs a custom monitor sink. A no-op sink is used by default.
    pub fn monitor(mut self, monitor: impl JobMonitor + 'static) -> Self {
        self.job.set_monitor(Box::new(monitor));
        self
    }

    /// Registers a job listener.
    pub fn job_listener(mut self, listener: impl JobListener + 'static) -> Self {
        self.job.add_job_listener(listener);
        self
    }

    /// Registers a batch listener.
    pub fn batch_listener(mut self, listener: impl BatchListener<O> + 'static) -> Self {
        self.job.add_batch_listener(listener);
        self
    }

    /// Registers a record reader listener.
    pub fn reader_listener(mut self, listener: impl RecordReaderListener<I> + 'static) -> Self {
        self.job.add_reader_listener(listener);
        self
    }

    /// Registers a pipeline listener.
    pub fn pipeline_listener(mut self, listener: impl PipelineListener + 'static) -> Self {
        self.job.add_pipeline_listener(listener);
        self
    }

    /// Registers a record writer listener.
    pub fn writer_listener(mut self, listener: impl RecordWriterListener<O> + 'static) -> Self {
        self.job.add_writer_listener(listener);
        self
    }

    /// Builds the job. Listener lists and the processor chain are frozen
    /// from this point on.
    pub fn build(self) -> BatchJob<I, O> {
        self.job
    }
}

impl<I, O> Default for JobBuilder<I, O>
where
    I: Any + Send,
    O: Any + Send,
{
    fn default() -> Self {
        Self::new()
    }
}
