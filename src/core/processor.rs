use std::any::{type_name, Any};
use std::marker::PhantomData;

use crate::core::record::{AnyPayload, AnyRecord};
use crate::error::BatchError;

/// Represents the result of processing a record payload.
///
/// This type is a specialized `Result` that can be:
/// - `Ok(Some(output))` when the payload is successfully transformed
/// - `Ok(None)` to filter the record: it is dropped and downstream stages
///   are skipped
/// - `Err(BatchError)` when an error occurs during processing
pub type ProcessorResult<O> = Result<Option<O>, BatchError>;

/// A trait for transforming record payloads.
///
/// Filters, validators, mappers and marshallers are all processors; they
/// differ only by convention. Processors see payloads, not envelopes: the
/// engine owns the header and re-attaches it to the chain's output.
pub trait RecordProcessor<I, O>: Send {
    /// Processes a payload and returns the transformed result, the filter
    /// sentinel, or an error.
    fn process_record(&self, payload: &I) -> ProcessorResult<O>;
}

/// Plain functions and closures can serve as processors.
impl<I, O, F> RecordProcessor<I, O> for F
where
    F: Fn(&I) -> ProcessorResult<O> + Send,
{
    fn process_record(&self, payload: &I) -> ProcessorResult<O> {
        self(payload)
    }
}

/// A pass-through processor that returns payloads unchanged.
///
/// Useful as a placeholder stage or to keep a pipeline shape stable while
/// the actual transformation is optional.
#[derive(Debug, Default)]
pub struct PassThroughProcessor<T> {
    _marker: PhantomData<T>,
}

impl<T: Clone> PassThroughProcessor<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + Send> RecordProcessor<T, T> for PassThroughProcessor<T> {
    fn process_record(&self, payload: &T) -> ProcessorResult<T> {
        Ok(Some(payload.clone()))
    }
}

/// Outcome of running a record through the processor chain.
pub enum ChainOutcome {
    /// The chain produced a new payload.
    Processed(AnyPayload),
    /// No processors are registered; the input record is the output.
    Identity,
    /// A stage returned the filter sentinel.
    Filtered,
}

/// Object-safe face of a typed processor, operating on erased payloads.
trait DynProcessor: Send {
    fn process_dyn(&self, payload: &dyn Any) -> Result<Option<AnyPayload>, BatchError>;
}

struct TypedProcessor<P, I, O> {
    processor: P,
    _marker: PhantomData<fn(I) -> O>,
}

impl<P, I, O> DynProcessor for TypedProcessor<P, I, O>
where
    P: RecordProcessor<I, O>,
    I: Any + Send,
    O: Any + Send,
{
    fn process_dyn(&self, payload: &dyn Any) -> Result<Option<AnyPayload>, BatchError> {
        let input = payload.downcast_ref::<I>().unwrap_or_else(|| {
            panic!("record processor expected a `{}` payload", type_name::<I>())
        });
        Ok(self
            .processor
            .process_record(input)?
            .map(|output| Box::new(output) as AnyPayload))
    }
}

/// Applies an ordered list of processors left to right, threading the
/// output of each stage into the next and short-circuiting on filter.
///
/// Payload type compatibility between adjacent stages is the caller's
/// responsibility at construction time; a mismatch panics.
#[derive(Default)]
pub struct CompositeRecordProcessor {
    stages: Vec<Box<dyn DynProcessor>>,
}

impl CompositeRecordProcessor {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a processor to the chain.
    pub fn add_processor<I, O, P>(&mut self, processor: P)
    where
        I: Any + Send,
        O: Any + Send,
        P: RecordProcessor<I, O> + 'static,
    {
        self.stages.push(Box::new(TypedProcessor {
            processor,
            _marker: PhantomData,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs `record` through the chain.
    pub fn process_record(&self, record: &AnyRecord) -> Result<ChainOutcome, BatchError> {
        let mut current: Option<AnyPayload> = None;
        for stage in &self.stages {
            let payload: &dyn Any = match &current {
                Some(payload) => payload.as_ref(),
                None => record.payload().as_ref(),
            };
            match stage.process_dyn(payload)? {
                Some(next) => current = Some(next),
                None => return Ok(ChainOutcome::Filtered),
            }
        }
        Ok(match current {
            Some(payload) => ChainOutcome::Processed(payload),
            None => ChainOutcome::Identity,
        })
    }
}
