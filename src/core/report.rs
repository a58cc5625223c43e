use std::collections::BTreeMap;
use std::env;
use std::fmt;

use serde::{Serialize, Serializer};
use time::OffsetDateTime;

use crate::core::job::JobParameters;
use crate::error::BatchError;

/// Represents the status of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// The job is initializing: listeners notified, resources not yet open.
    Starting,
    /// The run loop is active.
    Started,
    /// The run loop exited and resources are being released.
    Stopping,
    /// The job processed its whole stream.
    Completed,
    /// A fatal error ended the run.
    Failed,
    /// The job observed an interruption at a batch boundary.
    Aborted,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Starting => "STARTING",
            JobStatus::Started => "STARTED",
            JobStatus::Stopping => "STOPPING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Aborted => "ABORTED",
        })
    }
}

/// Counters and timing of a job run.
///
/// Incremented only by the job thread owning the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobMetrics {
    read_count: usize,
    write_count: usize,
    filter_count: usize,
    error_count: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    end_time: Option<OffsetDateTime>,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records read from the source.
    pub fn read_count(&self) -> usize {
        self.read_count
    }

    /// Number of records handed to the writer, including the singleton
    /// writes of batch scanning.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Number of records dropped by a filter sentinel.
    pub fn filter_count(&self) -> usize {
        self.filter_count
    }

    /// Number of processing errors, plus per-record write errors during
    /// batch scanning.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn start_time(&self) -> Option<OffsetDateTime> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<OffsetDateTime> {
        self.end_time
    }

    /// Elapsed run time. While the run is in flight this is the time since
    /// it started.
    pub fn duration(&self) -> Option<time::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            (Some(start), None) => Some(OffsetDateTime::now_utc() - start),
            _ => None,
        }
    }

    pub(crate) fn increment_read_count(&mut self) {
        self.read_count += 1;
    }

    pub(crate) fn increment_write_count(&mut self, count: usize) {
        self.write_count += count;
    }

    pub(crate) fn increment_filter_count(&mut self) {
        self.filter_count += 1;
    }

    pub(crate) fn increment_error_count(&mut self) {
        self.error_count += 1;
    }

    pub(crate) fn set_start_time(&mut self, start_time: OffsetDateTime) {
        self.start_time = Some(start_time);
    }

    pub(crate) fn set_end_time(&mut self, end_time: OffsetDateTime) {
        self.end_time = Some(end_time);
    }
}

/// The result of a job run, returned to the caller and published to the
/// monitor.
///
/// Mutated only by the job thread; monitors receive it by reference and
/// must clone rather than retain it.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    job_name: String,
    status: JobStatus,
    parameters: JobParameters,
    metrics: JobMetrics,
    #[serde(serialize_with = "error_as_string")]
    last_error: Option<BatchError>,
    #[serde(skip)]
    environment: BTreeMap<String, String>,
}

fn error_as_string<S: Serializer>(
    error: &Option<BatchError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

impl JobReport {
    pub(crate) fn new(job_name: impl Into<String>, parameters: JobParameters) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Starting,
            parameters,
            metrics: JobMetrics::new(),
            last_error: None,
            environment: env::vars().collect(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.parameters
    }

    pub fn metrics(&self) -> &JobMetrics {
        &self.metrics
    }

    /// The most recent error of the run. Set on processing and writing
    /// errors even when the run carries on, and on close failures even
    /// though they leave the terminal status untouched.
    pub fn last_error(&self) -> Option<&BatchError> {
        self.last_error.as_ref()
    }

    /// Snapshot of the process environment, captured when the job was
    /// assembled.
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut JobMetrics {
        &mut self.metrics
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) fn set_job_name(&mut self, job_name: impl Into<String>) {
        self.job_name = job_name.into();
    }

    pub(crate) fn set_parameters(&mut self, parameters: JobParameters) {
        self.parameters = parameters;
    }

    pub(crate) fn set_last_error(&mut self, error: BatchError) {
        self.last_error = Some(error);
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job '{}' {}: read = {}, written = {}, filtered = {}, errors = {}",
            self.job_name,
            self.status,
            self.metrics.read_count(),
            self.metrics.write_count(),
            self.metrics.filter_count(),
            self.metrics.error_count(),
        )?;
        if let Some(error) = &self.last_error {
            write!(f, ", last error: {error}")?;
        }
        Ok(())
    }
}
