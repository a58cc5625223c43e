//! Concurrent execution of batch jobs.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};

use crate::core::job::{Interruption, Job};
use crate::core::report::JobReport;

type Submission = (Box<dyn Job>, Sender<JobReport>);

/// Runs jobs on a fixed pool of worker threads.
///
/// Each job run stays single-threaded on its worker; the executor shares
/// nothing between jobs. Inter-job dataflow goes through the queue
/// bridging reader and writers of [`crate::item::queue`].
pub struct JobExecutor {
    submissions: Option<Sender<Submission>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobExecutor {
    /// Creates an executor with a single worker.
    pub fn new() -> Self {
        Self::with_workers(1)
    }

    /// Creates an executor with `workers` worker threads.
    ///
    /// # Panics
    ///
    /// Panics when `workers` is zero.
    pub fn with_workers(workers: usize) -> Self {
        assert!(workers >= 1, "worker count must be >= 1");
        let (submissions, queue) = crossbeam_channel::unbounded::<Submission>();
        let workers = (0..workers)
            .map(|index| Self::spawn_worker(index, queue.clone()))
            .collect();
        Self {
            submissions: Some(submissions),
            workers,
        }
    }

    fn spawn_worker(index: usize, queue: Receiver<Submission>) -> JoinHandle<()> {
        thread::Builder::new()
            .name(format!("batch-worker-{index}"))
            .spawn(move || {
                while let Ok((mut job, completion)) = queue.recv() {
                    debug!("Executing job '{}'", job.name());
                    let report = job.run();
                    // Nobody listens when the handle was dropped.
                    let _ = completion.send(report);
                }
            })
            .expect("batch worker thread could not be spawned")
    }

    /// Runs `job` on a borrowed worker and blocks until its report is
    /// available.
    pub fn execute(&self, job: Box<dyn Job>) -> JobReport {
        self.submit(job).wait()
    }

    /// Enqueues `job` for asynchronous execution.
    ///
    /// # Panics
    ///
    /// Panics when the executor has been shut down.
    pub fn submit(&self, job: Box<dyn Job>) -> JobHandle {
        let interruption = job.interruption();
        let (completion, report) = crossbeam_channel::bounded(1);
        self.submissions
            .as_ref()
            .expect("executor has been shut down")
            .send((job, completion))
            .expect("executor has been shut down");
        JobHandle {
            report,
            interruption,
        }
    }

    /// Submits every job and returns their handles in submission order.
    pub fn submit_all(&self, jobs: Vec<Box<dyn Job>>) -> Vec<JobHandle> {
        jobs.into_iter().map(|job| self.submit(job)).collect()
    }

    /// Stops accepting new submissions, waits for in-flight and queued
    /// jobs to finish, then releases the workers. Idempotent.
    pub fn shutdown(&mut self) {
        if self.submissions.take().is_some() {
            info!("Shutting down job executor");
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle on a submitted job.
pub struct JobHandle {
    report: Receiver<JobReport>,
    interruption: Interruption,
}

impl JobHandle {
    /// Signals the job to stop at its next batch boundary; it will report
    /// an aborted status through the regular teardown path.
    pub fn abort(&self) {
        self.interruption.interrupt();
    }

    /// Blocks until the job finishes and yields its report.
    pub fn wait(self) -> JobReport {
        self.report
            .recv()
            .expect("batch worker dropped the job before reporting")
    }
}
