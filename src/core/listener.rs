//! Listener surfaces of the engine.
//!
//! Five callback surfaces cover the lifecycle of a run: job, batch, reader,
//! pipeline and writer. Every callback defaults to a no-op, and callbacks
//! are infallible by signature: a listener has no way to fail a run.
//!
//! Each surface has a composite holding an ordered list of delegates; the
//! engine talks to the composite only. Listener lists are populated by the
//! builder and frozen once the job is built.

use crate::core::job::JobParameters;
use crate::core::record::{AnyRecord, Batch, Record};
use crate::core::report::JobReport;
use crate::error::BatchError;

/// Callbacks around a whole job run.
pub trait JobListener: Send {
    /// Called before the run loop starts.
    fn before_job(&self, _parameters: &JobParameters) {}

    /// Called at the very end of the run, on every exit path.
    fn after_job(&self, _report: &JobReport) {}
}

/// Callbacks around each batch.
pub trait BatchListener<O>: Send {
    fn before_batch_reading(&self) {}

    fn after_batch_processing(&self, _batch: &Batch<O>) {}

    fn after_batch_writing(&self, _batch: &Batch<O>) {}

    /// Called when the writer rejects a batch. With batch scanning enabled
    /// and a non-transactional writer, this is the place to roll back a
    /// partially flushed batch before records are re-attempted one by one.
    fn on_batch_writing_exception(&self, _batch: &Batch<O>, _error: &BatchError) {}
}

/// Callbacks around each read attempt.
pub trait RecordReaderListener<I>: Send {
    fn before_record_reading(&self) {}

    /// Called after a successful read; `None` signals the end of the
    /// stream.
    fn after_record_reading(&self, _record: Option<&Record<I>>) {}

    fn on_record_reading_exception(&self, _error: &BatchError) {}
}

/// Decision of the pre-processing hook: carry on with the (possibly
/// transformed) record, or filter it. The record rides along in both
/// cases, so the after-processing hook can still observe a filtered one.
pub enum PipelineDecision {
    /// Run this record through the chain.
    Proceed(AnyRecord),
    /// Drop this record without running the chain.
    Filter(AnyRecord),
}

/// Callbacks around the processing pipeline.
///
/// This surface sits across the typed chain boundary and therefore sees
/// payload-erased records; use [`Record::payload`] with `downcast_ref` to
/// inspect payloads.
pub trait PipelineListener: Send {
    /// Called before a record enters the chain. The returned record is the
    /// one processed, so the record can be transformed here; returning
    /// [`PipelineDecision::Filter`] drops it.
    fn before_record_processing(&self, record: AnyRecord) -> PipelineDecision {
        PipelineDecision::Proceed(record)
    }

    /// Called after every record, except on a processing error. `output`
    /// is `None` when the record was filtered, by this listener's pre-hook
    /// or by a stage; with an empty chain, `input` and `output` are the
    /// same record.
    fn after_record_processing(&self, _input: &AnyRecord, _output: Option<&AnyRecord>) {}

    fn on_record_processing_exception(&self, _record: &AnyRecord, _error: &BatchError) {}
}

/// Callbacks around each write attempt, including the singleton writes of
/// batch scanning.
pub trait RecordWriterListener<O>: Send {
    fn before_record_writing(&self, _batch: &Batch<O>) {}

    fn after_record_writing(&self, _batch: &Batch<O>) {}

    fn on_record_writing_exception(&self, _batch: &Batch<O>, _error: &BatchError) {}
}

/// Fans a job callback out to an ordered list of delegates.
#[derive(Default)]
pub struct CompositeJobListener {
    delegates: Vec<Box<dyn JobListener>>,
}

impl CompositeJobListener {
    pub fn new() -> Self {
        Self {
            delegates: Vec::new(),
        }
    }

    pub fn add_listener<L: JobListener + 'static>(&mut self, listener: L) {
        self.delegates.push(Box::new(listener));
    }
}

impl JobListener for CompositeJobListener {
    fn before_job(&self, parameters: &JobParameters) {
        for delegate in &self.delegates {
            delegate.before_job(parameters);
        }
    }

    fn after_job(&self, report: &JobReport) {
        for delegate in &self.delegates {
            delegate.after_job(report);
        }
    }
}

/// Fans a batch callback out to an ordered list of delegates.
pub struct CompositeBatchListener<O> {
    delegates: Vec<Box<dyn BatchListener<O>>>,
}

impl<O> CompositeBatchListener<O> {
    pub fn new() -> Self {
        Self {
            delegates: Vec::new(),
        }
    }

    pub fn add_listener<L: BatchListener<O> + 'static>(&mut self, listener: L) {
        self.delegates.push(Box::new(listener));
    }
}

impl<O> Default for CompositeBatchListener<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> BatchListener<O> for CompositeBatchListener<O> {
    fn before_batch_reading(&self) {
        for delegate in &self.delegates {
            delegate.before_batch_reading();
        }
    }

    fn after_batch_processing(&self, batch: &Batch<O>) {
        for delegate in &self.delegates {
            delegate.after_batch_processing(batch);
        }
    }

    fn after_batch_writing(&self, batch: &Batch<O>) {
        for delegate in &self.delegates {
            delegate.after_batch_writing(batch);
        }
    }

    fn on_batch_writing_exception(&self, batch: &Batch<O>, error: &BatchError) {
        for delegate in &self.delegates {
            delegate.on_batch_writing_exception(batch, error);
        }
    }
}

/// Fans a read callback out to an ordered list of delegates.
pub struct CompositeRecordReaderListener<I> {
    delegates: Vec<Box<dyn RecordReaderListener<I>>>,
}

impl<I> CompositeRecordReaderListener<I> {
    pub fn new() -> Self {
        Self {
            delegates: Vec::new(),
        }
    }

    pub fn add_listener<L: RecordReaderListener<I> + 'static>(&mut self, listener: L) {
        self.delegates.push(Box::new(listener));
    }
}

impl<I> Default for CompositeRecordReaderListener<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> RecordReaderListener<I> for CompositeRecordReaderListener<I> {
    fn before_record_reading(&self) {
        for delegate in &self.delegates {
            delegate.before_record_reading();
        }
    }

    fn after_record_reading(&self, record: Option<&Record<I>>) {
        for delegate in &self.delegates {
            delegate.after_record_reading(record);
        }
    }

    fn on_record_reading_exception(&self, error: &BatchError) {
        for delegate in &self.delegates {
            delegate.on_record_reading_exception(error);
        }
    }
}

/// Fans a pipeline callback out to an ordered list of delegates.
///
/// The pre-processing hook threads its value: each delegate receives the
/// previous delegate's output, and a filter decision mid-chain drops the
/// record without consulting the remaining delegates.
#[derive(Default)]
pub struct CompositePipelineListener {
    delegates: Vec<Box<dyn PipelineListener>>,
}

impl CompositePipelineListener {
    pub fn new() -> Self {
        Self {
            delegates: Vec::new(),
        }
    }

    pub fn add_listener<L: PipelineListener + 'static>(&mut self, listener: L) {
        self.delegates.push(Box::new(listener));
    }
}

impl PipelineListener for CompositePipelineListener {
    fn before_record_processing(&self, record: AnyRecord) -> PipelineDecision {
        let mut current = record;
        for delegate in &self.delegates {
            match delegate.before_record_processing(current) {
                PipelineDecision::Proceed(next) => current = next,
                PipelineDecision::Filter(record) => return PipelineDecision::Filter(record),
            }
        }
        PipelineDecision::Proceed(current)
    }

    fn after_record_processing(&self, input: &AnyRecord, output: Option<&AnyRecord>) {
        for delegate in &self.delegates {
            delegate.after_record_processing(input, output);
        }
    }

    fn on_record_processing_exception(&self, record: &AnyRecord, error: &BatchError) {
        for delegate in &self.delegates {
            delegate.on_record_processing_exception(record, error);
        }
    }
}

/// Fans a write callback out to an ordered list of delegates.
pub struct CompositeRecordWriterListener<O> {
    delegates: Vec<Box<dyn RecordWriterListener<O>>>,
}

impl<O> CompositeRecordWriterListener<O> {
    pub fn new() -> Self {
        Self {
            delegates: Vec::new(),
        }
    }

    pub fn add_listener<L: RecordWriterListener<O> + 'static>(&mut self, listener: L) {
        self.delegates.push(Box::new(listener));
    }
}

impl<O> Default for CompositeRecordWriterListener<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> RecordWriterListener<O> for CompositeRecordWriterListener<O> {
    fn before_record_writing(&self, batch: &Batch<O>) {
        for delegate in &self.delegates {
            delegate.before_record_writing(batch);
        }
    }

    fn after_record_writing(&self, batch: &Batch<O>) {
        for delegate in &self.delegates {
            delegate.after_record_writing(batch);
        }
    }

    fn on_record_writing_exception(&self, batch: &Batch<O>, error: &BatchError) {
        for delegate in &self.delegates {
            delegate.on_record_writing_exception(batch, error);
        }
    }
}
