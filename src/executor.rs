//! # Bounded Parallel Execution
//!
//! [`Executor::run_all`] feeds jobs through a bounded channel to a fixed pool
//! of scoped worker threads. Submission blocks while the channel is full, so at
//! most `max_parallel` jobs are running and at most `max_parallel` are queued.
//! `run_all` returns after every job has finished.
//!
//! Jobs are independent. A failed job is recorded and its siblings keep going.
//! The one exception is a fatal error (see [`ShieldError::is_fatal`]): it trips
//! the shared [`CancellationToken`], and jobs that have not started yet are
//! reported as cancelled instead of run. Jobs already in flight finish their
//! own protocol.

use crate::error::{Result, ShieldError};
use crate::transform::TransformJob;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use tracing::{debug, error, info};

/// Cooperative cancellation flag shared by the workers of a batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Succeeded,
    Failed(ShieldError),
    Cancelled,
}

/// Aggregated result of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, ShieldError)>,
    pub cancelled: Vec<PathBuf>,
}

impl BatchReport {
    fn record(&mut self, job: TransformJob, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Succeeded => self.succeeded.push(job.path),
            JobOutcome::Failed(e) => self.failed.push((job.path, e)),
            JobOutcome::Cancelled => self.cancelled.push(job.path),
        }
    }

    fn sort(&mut self) {
        self.succeeded.sort();
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
        self.cancelled.sort();
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.cancelled.len()
    }

    /// True when every job succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }
}

/// Fixed-size worker pool.
#[derive(Debug, Clone)]
pub struct Executor {
    max_parallel: usize,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `worker` over every job and wait for all of them.
    pub fn run_all<F>(&self, jobs: Vec<TransformJob>, worker: F) -> BatchReport
    where
        F: Fn(&TransformJob) -> Result<()> + Sync,
    {
        let mut report = BatchReport::default();
        if jobs.is_empty() {
            return report;
        }

        let workers = self.max_parallel.min(jobs.len());
        debug!(jobs = jobs.len(), workers, "starting batch");

        let (job_tx, job_rx) = mpsc::sync_channel::<TransformJob>(workers);
        let job_rx = Mutex::new(job_rx);
        let (done_tx, done_rx) = mpsc::channel::<(TransformJob, JobOutcome)>();

        thread::scope(|scope| {
            for id in 0..workers {
                let job_rx = &job_rx;
                let worker = &worker;
                let cancel = &self.cancel;
                let done_tx = done_tx.clone();

                scope.spawn(move || loop {
                    let next = match job_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(job) = next else {
                        break;
                    };

                    let outcome = run_one(id, &job, worker, cancel);
                    if done_tx.send((job, outcome)).is_err() {
                        break;
                    }
                });
            }
            drop(done_tx);

            for job in jobs {
                if let Err(mpsc::SendError(job)) = job_tx.send(job) {
                    report.record(job, JobOutcome::Cancelled);
                }
            }
            drop(job_tx);
        });

        for (job, outcome) in done_rx {
            report.record(job, outcome);
        }
        report.sort();

        debug!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "batch finished"
        );
        report
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(crate::config::default_parallelism())
    }
}

fn run_one<F>(id: usize, job: &TransformJob, worker: &F, cancel: &CancellationToken) -> JobOutcome
where
    F: Fn(&TransformJob) -> Result<()> + Sync,
{
    if cancel.is_cancelled() {
        debug!(worker = id, path = %job.path.display(), "skipping job after cancellation");
        return JobOutcome::Cancelled;
    }

    match worker(job) {
        Ok(()) => {
            info!(worker = id, op = %job.operation, path = %job.path.display(), "job completed");
            JobOutcome::Succeeded
        }
        Err(e) => {
            error!(worker = id, op = %job.operation, path = %job.path.display(), err = %e, "job failed");
            if e.is_fatal() {
                cancel.cancel();
            }
            JobOutcome::Failed(e)
        }
    }
}
