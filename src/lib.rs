/*!
# batchflow

A record-oriented batch processing engine for Rust. Jobs read records from
a source, pipe them through a chain of processors and hand them to a sink
in configurable batches, with listener hooks on every step, a cumulative
error budget and record-by-record recovery of rejected batches. One or
more jobs are submitted to an executor that runs them concurrently on a
pool of worker threads.

## Features

+ Declarative job assembly through a fluent builder
+ Pluggable record readers, writers and processors behind small traits
+ Composite listeners on the job, batch, reader, pipeline and writer
+ Error threshold and batch scanning for partial-failure recovery
+ Multi-threaded job executor with per-job cancellation
+ Queue bridging reader and writers for job-to-job dispatch
+ Pluggable monitor sink publishing report snapshots

## Example

```rust
use std::sync::{Arc, Mutex};

use batchflow::core::builder::JobBuilder;
use batchflow::core::job::Job;
use batchflow::core::processor::ProcessorResult;
use batchflow::core::report::JobStatus;
use batchflow::item::memory::{CollectedRecords, CollectingRecordWriter, IterableRecordReader};

let written: CollectedRecords<String> = Arc::new(Mutex::new(Vec::new()));

let mut job = JobBuilder::new()
    .named("uppercase")
    .reader(IterableRecordReader::new(vec![
        "foo".to_string(),
        "bar".to_string(),
    ]))
    .processor(|payload: &String| -> ProcessorResult<String> {
        Ok(Some(payload.to_uppercase()))
    })
    .writer(CollectingRecordWriter::new(written.clone()))
    .batch_size(2)
    .build();

let report = job.run();

assert_eq!(report.status(), JobStatus::Completed);
assert_eq!(report.metrics().read_count(), 2);
assert_eq!(report.metrics().write_count(), 2);
assert_eq!(written.lock().unwrap()[0].payload().as_str(), "FOO");
```

Jobs can also be dispatched to an executor, and wired to each other
through work queues so a master job can fan records out to workers; see
[`core::executor`] and [`item::queue`].
*/

pub mod core;

/// Error types for batch operations
pub mod error;

/// Set of record readers / writers (in-memory, logging, queue bridging)
pub mod item;

#[doc(inline)]
pub use error::*;
