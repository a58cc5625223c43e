use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use mockall::{mock, Sequence};

use batchflow::core::builder::JobBuilder;
use batchflow::core::job::{Interruption, Job};
use batchflow::core::listener::{BatchListener, JobListener, PipelineDecision, PipelineListener};
use batchflow::core::processor::ProcessorResult;
use batchflow::core::reader::{ReaderResult, RecordReader};
use batchflow::core::record::{AnyRecord, Batch, Header, Record};
use batchflow::core::report::{JobReport, JobStatus};
use batchflow::core::writer::{RecordWriter, WriterResult};
use batchflow::error::BatchError;
use batchflow::item::memory::{CollectedRecords, CollectingRecordWriter, IterableRecordReader};

mock! {
    pub StringReader {}
    impl RecordReader<String> for StringReader {
        fn open(&mut self) -> Result<(), BatchError>;
        fn read_record(&mut self) -> ReaderResult<String>;
        fn close(&mut self) -> Result<(), BatchError>;
    }
}

mock! {
    pub StringWriter {}
    impl RecordWriter<String> for StringWriter {
        fn open(&mut self) -> WriterResult;
        fn write_records(&mut self, batch: &Batch<String>) -> WriterResult;
        fn close(&mut self) -> WriterResult;
    }
}

fn string_record(number: usize, payload: &str) -> Record<String> {
    Record::new(Header::new(number, "mock source"), payload.to_string())
}

#[test]
fn empty_source_should_complete_without_writing() -> Result<()> {
    let mut reader = MockStringReader::new();
    reader.expect_open().times(1).returning(|| Ok(()));
    reader.expect_read_record().times(1).returning(|| Ok(None));
    reader.expect_close().times(1).returning(|| Ok(()));

    let mut writer = MockStringWriter::new();
    writer.expect_open().times(1).returning(|| Ok(()));
    writer.expect_write_records().never();
    writer.expect_close().times(1).returning(|| Ok(()));

    let mut job = JobBuilder::new()
        .named("empty")
        .reader(reader)
        .writer(writer)
        .batch_size(10)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().read_count(), 0);
    assert_eq!(report.metrics().write_count(), 0);
    assert!(report.last_error().is_none());
    Ok(())
}

#[test]
fn records_should_be_written_in_read_order_and_batch_sized() -> Result<()> {
    let mut reader = MockStringReader::new();
    reader.expect_open().times(1).returning(|| Ok(()));
    let mut reads = Sequence::new();
    for (number, payload) in [(1, "r1"), (2, "r2"), (3, "r3")] {
        reader
            .expect_read_record()
            .times(1)
            .in_sequence(&mut reads)
            .returning(move || Ok(Some(string_record(number, payload))));
    }
    reader
        .expect_read_record()
        .times(1)
        .in_sequence(&mut reads)
        .returning(|| Ok(None));
    reader.expect_close().times(1).returning(|| Ok(()));

    let mut writer = MockStringWriter::new();
    writer.expect_open().times(1).returning(|| Ok(()));
    let mut writes = Sequence::new();
    writer
        .expect_write_records()
        .withf(|batch: &Batch<String>| {
            let payloads: Vec<&str> = batch.iter().map(|record| record.payload().as_str()).collect();
            payloads == ["r1", "r2"]
        })
        .times(1)
        .in_sequence(&mut writes)
        .returning(|_| Ok(()));
    writer
        .expect_write_records()
        .withf(|batch: &Batch<String>| {
            let payloads: Vec<&str> = batch.iter().map(|record| record.payload().as_str()).collect();
            payloads == ["r3"]
        })
        .times(1)
        .in_sequence(&mut writes)
        .returning(|_| Ok(()));
    writer.expect_close().times(1).returning(|| Ok(()));

    let mut job = JobBuilder::new()
        .named("ordered")
        .reader(reader)
        .writer(writer)
        .batch_size(2)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().read_count(), 3);
    assert_eq!(report.metrics().write_count(), 3);
    Ok(())
}

#[test]
fn identity_run_should_preserve_record_numbers_without_gaps() {
    let written: CollectedRecords<i32> = Arc::new(Mutex::new(Vec::new()));
    let mut job = JobBuilder::new()
        .named("identity")
        .reader(IterableRecordReader::new(vec![10, 20, 30, 40, 50]))
        .writer(CollectingRecordWriter::new(written.clone()))
        .batch_size(2)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    let written = written.lock().unwrap();
    let numbers: Vec<usize> = written.iter().map(|record| record.header().number()).collect();
    let payloads: Vec<i32> = written.iter().map(|record| *record.payload()).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(payloads, vec![10, 20, 30, 40, 50]);
}

#[test]
fn filtered_records_should_be_counted_and_dropped() {
    let written: CollectedRecords<i32> = Arc::new(Mutex::new(Vec::new()));
    let mut job = JobBuilder::new()
        .named("filtering")
        .reader(IterableRecordReader::new(vec![1, 2, 3, 4]))
        .filter(|n: &i32| -> ProcessorResult<i32> { Ok((n % 2 != 0).then_some(*n)) })
        .writer(CollectingRecordWriter::new(written.clone()))
        .batch_size(2)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().write_count(), 2);
    assert_eq!(report.metrics().filter_count(), 2);
    assert_eq!(report.metrics().error_count(), 0);
    let written = written.lock().unwrap();
    let payloads: Vec<i32> = written.iter().map(|record| *record.payload()).collect();
    assert_eq!(payloads, vec![1, 3]);
}

/// Filters record #2 before the chain and records every after-processing
/// notification as (record number, output present).
struct ObservingPipelineListener {
    events: Arc<Mutex<Vec<(usize, bool)>>>,
}

impl PipelineListener for ObservingPipelineListener {
    fn before_record_processing(&self, record: AnyRecord) -> PipelineDecision {
        if record.header().number() == 2 {
            PipelineDecision::Filter(record)
        } else {
            PipelineDecision::Proceed(record)
        }
    }

    fn after_record_processing(&self, input: &AnyRecord, output: Option<&AnyRecord>) {
        self.events
            .lock()
            .unwrap()
            .push((input.header().number(), output.is_some()));
    }
}

#[test]
fn after_processing_hook_should_fire_for_filtered_records_too() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let written: CollectedRecords<i32> = Arc::new(Mutex::new(Vec::new()));

    let mut job = JobBuilder::new()
        .named("observed")
        .reader(IterableRecordReader::new(vec![1, 2, 3]))
        .filter(|n: &i32| -> ProcessorResult<i32> { Ok((*n != 3).then_some(*n)) })
        .writer(CollectingRecordWriter::new(written.clone()))
        .pipeline_listener(ObservingPipelineListener {
            events: events.clone(),
        })
        .batch_size(3)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().read_count(), 3);
    assert_eq!(report.metrics().write_count(), 1);
    assert_eq!(report.metrics().filter_count(), 2);
    // Record 2 is filtered by the pre-hook, record 3 by the chain; the
    // after-processing hook still sees both, with no output.
    assert_eq!(
        *events.lock().unwrap(),
        vec![(1, true), (2, false), (3, false)]
    );
    let written = written.lock().unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(*written[0].payload(), 1);
}

#[test]
fn exceeding_the_error_threshold_should_fail_the_run() {
    let written: CollectedRecords<i32> = Arc::new(Mutex::new(Vec::new()));
    let writer_closed = Arc::new(AtomicBool::new(false));

    let mut job = JobBuilder::new()
        .named("threshold")
        .reader(IterableRecordReader::new(vec![1, 2, 3]))
        .processor(|n: &i32| -> ProcessorResult<i32> {
            if *n >= 2 {
                Err(BatchError::RecordProcessor(format!("invalid record {n}")))
            } else {
                Ok(Some(*n))
            }
        })
        .writer(TrackingWriter {
            sink: written.clone(),
            closed: writer_closed.clone(),
        })
        .error_threshold(1)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().read_count(), 3);
    assert_eq!(report.metrics().write_count(), 1);
    assert_eq!(report.metrics().error_count(), 2);
    assert!(matches!(
        report.last_error(),
        Some(BatchError::ErrorThresholdExceeded(2))
    ));
    assert!(writer_closed.load(Ordering::Relaxed));
}

#[test]
fn errors_within_the_threshold_should_not_fail_the_run() {
    let mut job: batchflow::core::job::BatchJob<i32, i32> = JobBuilder::new()
        .named("budgeted")
        .reader(IterableRecordReader::new(vec![1, 2, 3]))
        .processor(|n: &i32| -> ProcessorResult<i32> {
            if *n == 2 {
                Err(BatchError::RecordProcessor("invalid record 2".to_string()))
            } else {
                Ok(Some(*n))
            }
        })
        .error_threshold(1)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().error_count(), 1);
    assert!(matches!(
        report.last_error(),
        Some(BatchError::RecordProcessor(_))
    ));
}

/// Rejects the first multi-record batch, then accepts everything.
struct FlakyWriter {
    sink: CollectedRecords<i32>,
    rejected_once: bool,
}

impl RecordWriter<i32> for FlakyWriter {
    fn write_records(&mut self, batch: &Batch<i32>) -> WriterResult {
        if !self.rejected_once && batch.len() > 1 {
            self.rejected_once = true;
            return Err(BatchError::RecordWriter("rejected batch".to_string()));
        }
        let mut sink = self.sink.lock().unwrap();
        for record in batch {
            sink.push(record.clone());
        }
        Ok(())
    }
}

#[test]
fn batch_scanning_should_recover_a_rejected_batch_record_by_record() {
    let written: CollectedRecords<i32> = Arc::new(Mutex::new(Vec::new()));
    let mut job = JobBuilder::new()
        .named("scanning")
        .reader(IterableRecordReader::new(vec![1, 2, 3, 4, 5]))
        .writer(FlakyWriter {
            sink: written.clone(),
            rejected_once: false,
        })
        .batch_size(3)
        .enable_batch_scanning(true)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().read_count(), 5);
    assert_eq!(report.metrics().write_count(), 5);
    assert_eq!(report.metrics().error_count(), 0);

    let written = written.lock().unwrap();
    let payloads: Vec<i32> = written.iter().map(|record| *record.payload()).collect();
    assert_eq!(payloads, vec![1, 2, 3, 4, 5]);
    let scanned: Vec<bool> = written
        .iter()
        .map(|record| record.header().is_scanned())
        .collect();
    assert_eq!(scanned, vec![true, true, true, false, false]);
}

#[test]
fn without_batch_scanning_a_write_failure_should_fail_the_run() {
    let written: CollectedRecords<i32> = Arc::new(Mutex::new(Vec::new()));
    let mut job = JobBuilder::new()
        .named("strict")
        .reader(IterableRecordReader::new(vec![1, 2, 3]))
        .writer(FlakyWriter {
            sink: written.clone(),
            rejected_once: false,
        })
        .batch_size(3)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Failed);
    assert!(matches!(
        report.last_error(),
        Some(BatchError::RecordWriter(_))
    ));
    assert_eq!(report.metrics().write_count(), 0);
}

struct TrackingReader {
    inner: IterableRecordReader<i32>,
    closed: Arc<AtomicBool>,
}

impl RecordReader<i32> for TrackingReader {
    fn read_record(&mut self) -> ReaderResult<i32> {
        self.inner.read_record()
    }

    fn close(&mut self) -> Result<(), BatchError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct TrackingWriter {
    sink: CollectedRecords<i32>,
    closed: Arc<AtomicBool>,
}

impl RecordWriter<i32> for TrackingWriter {
    fn write_records(&mut self, batch: &Batch<i32>) -> WriterResult {
        let mut sink = self.sink.lock().unwrap();
        for record in batch {
            sink.push(record.clone());
        }
        Ok(())
    }

    fn close(&mut self) -> WriterResult {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct InterruptAfterFirstWrite {
    interruption: Interruption,
}

impl BatchListener<i32> for InterruptAfterFirstWrite {
    fn after_batch_writing(&self, _batch: &Batch<i32>) {
        self.interruption.interrupt();
    }
}

struct CapturingJobListener {
    seen: Arc<Mutex<Option<JobStatus>>>,
}

impl JobListener for CapturingJobListener {
    fn after_job(&self, report: &JobReport) {
        *self.seen.lock().unwrap() = Some(report.status());
    }
}

#[test]
fn interrupted_job_should_abort_through_the_regular_teardown_path() {
    let written: CollectedRecords<i32> = Arc::new(Mutex::new(Vec::new()));
    let reader_closed = Arc::new(AtomicBool::new(false));
    let writer_closed = Arc::new(AtomicBool::new(false));
    let after_job = Arc::new(Mutex::new(None));

    let builder = JobBuilder::<i32, i32>::new();
    let interruption = builder.interruption();
    let mut job = builder
        .named("interrupted")
        .reader(TrackingReader {
            inner: IterableRecordReader::new(1..=6),
            closed: reader_closed.clone(),
        })
        .writer(TrackingWriter {
            sink: written.clone(),
            closed: writer_closed.clone(),
        })
        .batch_listener(InterruptAfterFirstWrite { interruption })
        .job_listener(CapturingJobListener {
            seen: after_job.clone(),
        })
        .batch_size(2)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Aborted);
    assert_eq!(report.metrics().read_count(), 2);
    assert_eq!(report.metrics().write_count(), 2);
    assert!(report.metrics().end_time().is_some());
    assert!(reader_closed.load(Ordering::Relaxed));
    assert!(writer_closed.load(Ordering::Relaxed));
    assert_eq!(*after_job.lock().unwrap(), Some(JobStatus::Aborted));
}

#[test]
fn reader_failure_should_fail_the_run() -> Result<()> {
    let mut reader = MockStringReader::new();
    reader.expect_open().times(1).returning(|| Ok(()));
    let mut reads = Sequence::new();
    reader
        .expect_read_record()
        .times(1)
        .in_sequence(&mut reads)
        .returning(|| Ok(Some(string_record(1, "r1"))));
    reader
        .expect_read_record()
        .times(1)
        .in_sequence(&mut reads)
        .returning(|| Err(BatchError::RecordReader("broken stream".to_string())));
    reader.expect_close().times(1).returning(|| Ok(()));

    let mut writer = MockStringWriter::new();
    writer.expect_open().times(1).returning(|| Ok(()));
    writer.expect_write_records().never();
    writer.expect_close().times(1).returning(|| Ok(()));

    let mut job = JobBuilder::new()
        .named("broken reader")
        .reader(reader)
        .writer(writer)
        .batch_size(2)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().read_count(), 1);
    assert!(matches!(
        report.last_error(),
        Some(BatchError::RecordReader(_))
    ));
    Ok(())
}

#[test]
fn reader_open_failure_should_fail_before_the_loop_starts() -> Result<()> {
    let mut reader = MockStringReader::new();
    reader
        .expect_open()
        .times(1)
        .returning(|| Err(BatchError::RecordReader("cannot open source".to_string())));
    reader.expect_read_record().never();
    reader.expect_close().times(1).returning(|| Ok(()));

    let mut writer = MockStringWriter::new();
    writer.expect_open().never();
    writer.expect_write_records().never();
    writer.expect_close().times(1).returning(|| Ok(()));

    let mut job = JobBuilder::new()
        .named("unopenable")
        .reader(reader)
        .writer(writer)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().read_count(), 0);
    assert!(matches!(
        report.last_error(),
        Some(BatchError::RecordReader(_))
    ));
    Ok(())
}

#[test]
fn close_failures_should_not_change_the_terminal_status() -> Result<()> {
    let mut reader = MockStringReader::new();
    reader.expect_open().times(1).returning(|| Ok(()));
    reader.expect_read_record().times(1).returning(|| Ok(None));
    reader
        .expect_close()
        .times(1)
        .returning(|| Err(BatchError::RecordReader("close failed".to_string())));

    let mut writer = MockStringWriter::new();
    writer.expect_open().times(1).returning(|| Ok(()));
    writer.expect_write_records().never();
    writer.expect_close().times(1).returning(|| Ok(()));

    let mut job = JobBuilder::new()
        .named("leaky")
        .reader(reader)
        .writer(writer)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    assert!(matches!(
        report.last_error(),
        Some(BatchError::RecordReader(_))
    ));
    Ok(())
}

#[test]
fn read_count_should_balance_write_filter_and_error_counts() {
    let mut job: batchflow::core::job::BatchJob<i32, i32> = JobBuilder::new()
        .named("balanced")
        .reader(IterableRecordReader::new(1..=8))
        .processor(|n: &i32| -> ProcessorResult<i32> {
            if n % 3 == 0 {
                Err(BatchError::RecordProcessor(format!("invalid record {n}")))
            } else if n % 2 == 0 {
                Ok(None)
            } else {
                Ok(Some(*n))
            }
        })
        .batch_size(3)
        .build();

    let report = job.run();

    assert_eq!(report.status(), JobStatus::Completed);
    let metrics = report.metrics();
    assert_eq!(metrics.read_count(), 8);
    assert_eq!(metrics.write_count(), 3);
    assert_eq!(metrics.filter_count(), 3);
    assert_eq!(metrics.error_count(), 2);
    assert_eq!(
        metrics.read_count(),
        metrics.write_count() + metrics.filter_count() + metrics.error_count()
    );
}
