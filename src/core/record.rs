use std::any::{type_name, Any};
use std::fmt;
use std::slice;
use std::vec;

use serde::Serialize;
use time::OffsetDateTime;

/// Payload of a record whose concrete type has been erased.
///
/// The processor chain works on erased payloads so that stages with
/// different intermediate types can be stored behind one trait object.
pub type AnyPayload = Box<dyn Any + Send>;

/// A record whose payload type has been erased. See [`Record::erase`].
pub type AnyRecord = Record<AnyPayload>;

/// Metadata attached to every record read during a job run.
///
/// Headers are immutable after creation, except for the scanned flag which
/// the engine sets when a record is re-attempted by batch scanning.
#[derive(Debug, Clone, Serialize)]
pub struct Header {
    number: usize,
    source: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    scanned: bool,
}

impl Header {
    /// Creates the header of the `number`-th record of `source`.
    ///
    /// Record numbers start at 1 and are strictly increasing within a job
    /// run; readers assign them from their own counter. The creation date
    /// is captured at call time.
    pub fn new(number: usize, source: impl Into<String>) -> Self {
        Self {
            number,
            source: source.into(),
            created_at: OffsetDateTime::now_utc(),
            scanned: false,
        }
    }

    /// The 1-based position of the record in the current run.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Name of the data source the record was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The instant the record was read.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// True when the record has been re-attempted by batch scanning.
    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    pub(crate) fn set_scanned(&mut self, scanned: bool) {
        self.scanned = scanned;
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{} from {}", self.number, self.source)
    }
}

/// An envelope pairing a [`Header`] with a typed payload.
#[derive(Debug, Clone)]
pub struct Record<P> {
    header: Header,
    payload: P,
}

impl<P> Record<P> {
    pub fn new(header: Header, payload: P) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn into_parts(self) -> (Header, P) {
        (self.header, self.payload)
    }
}

impl<P: Any + Send> Record<P> {
    /// Moves the payload behind a `dyn Any` box, erasing its type.
    pub fn erase(self) -> AnyRecord {
        Record {
            header: self.header,
            payload: Box::new(self.payload),
        }
    }
}

impl Record<AnyPayload> {
    /// Restores the concrete payload type.
    ///
    /// # Panics
    ///
    /// Panics when the payload is not a `P`. Payload type compatibility
    /// across the pipeline is a construction-time invariant of the job,
    /// not a runtime condition.
    pub fn downcast<P: Any>(self) -> Record<P> {
        match self.payload.downcast::<P>() {
            Ok(payload) => Record {
                header: self.header,
                payload: *payload,
            },
            Err(_) => panic!("record payload is not a `{}`", type_name::<P>()),
        }
    }
}

/// An ordered sequence of records of identical payload type, handed to the
/// writer as one unit.
///
/// A batch is owned by exactly one job thread: it is created empty at the
/// start of each read-process cycle and discarded after the write.
#[derive(Debug)]
pub struct Batch<P> {
    records: Vec<Record<P>>,
}

impl<P> Batch<P> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// Creates a singleton batch.
    pub fn from_record(record: Record<P>) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// Appends a record, preserving insertion order.
    pub fn add_record(&mut self, record: Record<P>) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Record<P>> {
        self.records.iter()
    }
}

impl<P> Default for Batch<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> IntoIterator for Batch<P> {
    type Item = Record<P>;
    type IntoIter = vec::IntoIter<Record<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, P> IntoIterator for &'a Batch<P> {
    type Item = &'a Record<P>;
    type IntoIter = slice::Iter<'a, Record<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
