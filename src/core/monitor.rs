use log::{info, warn};

use crate::core::report::JobReport;

/// Sink for job progress notifications.
///
/// When monitoring is enabled on a job, the sink is registered once before
/// the run loop starts and then notified on every processed record and at
/// the end of the run, always on the job thread. Implementations must
/// snapshot the report (it is `Clone`) rather than hold on to it.
pub trait JobMonitor: Send {
    /// Called once, before the run loop starts.
    fn register(&self, _report: &JobReport) {}

    /// Called whenever the report changes.
    fn notify_job_report_update(&self, _report: &JobReport) {}
}

/// Monitor that ignores every notification.
#[derive(Debug, Default)]
pub struct NoOpJobMonitor;

impl JobMonitor for NoOpJobMonitor {}

/// Publishes report snapshots as JSON log lines, one per notification.
#[derive(Debug, Default)]
pub struct JsonLoggingMonitor;

impl JobMonitor for JsonLoggingMonitor {
    fn register(&self, report: &JobReport) {
        info!("Monitoring job '{}'", report.job_name());
    }

    fn notify_job_report_update(&self, report: &JobReport) {
        match serde_json::to_string(report) {
            Ok(snapshot) => info!(target: "batchflow::monitor", "{snapshot}"),
            Err(err) => warn!("Unable to serialize job report: {err}"),
        }
    }
}
