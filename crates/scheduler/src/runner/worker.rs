use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::job::{Job, JobContext};
use crate::substrate::Slot;

use super::core::Shared;

impl Shared {
    /// Scheduling worker: drain the fair queue until nothing is runnable.
    /// The worker's pool slot is released as part of retiring.
    pub(super) fn worker_loop(&self, slot: Slot) {
        debug!("scheduling worker started");
        let mut slot = Some(slot);
        let mut executed = 0usize;

        while let Some(job) = self.next_job(&mut slot) {
            let elapsed = self.run_job(&job).unwrap_or_default();
            self.queue.report_completion(&job, elapsed);
            executed += 1;
        }

        debug!(executed, "scheduling worker exiting");
    }

    /// Poll the queue. On an empty poll, poll once more under the admission
    /// lock and retire this worker if still empty; a concurrent `submit`
    /// either sees the lower worker count or its job is found here.
    ///
    /// Retiring frees the pool slot before the worker count drops, so a
    /// `submit` that sees the lower count can always reserve that slot.
    fn next_job(&self, slot: &mut Option<Slot>) -> Option<Arc<Job>> {
        if let Some(job) = self.queue.poll_next() {
            return Some(job);
        }

        let mut admission = self.lock_admission();
        let job = self.queue.poll_next();
        if job.is_none() {
            drop(slot.take());
            admission.active_workers = admission.active_workers.saturating_sub(1);
            let active = admission.active_workers;
            self.with_metrics(|m| m.set_active_workers(active));
        }
        job
    }

    /// Run one job through its lifecycle and deliver its callbacks.
    ///
    /// Returns the execution time, or `None` if the job was cancelled
    /// before it could start.
    pub(super) fn run_job(&self, job: &Arc<Job>) -> Option<Duration> {
        if !job.begin() {
            debug!(job = %job.name(), state = ?job.state(), "skipping job that can no longer start");
            return None;
        }
        self.dispatcher.dispatch_pre_execute(job);

        let ctx = JobContext::new(job, self.dispatcher.as_ref());
        let started = Instant::now();
        let outcome = job.execute(&ctx);
        let elapsed = started.elapsed();

        if job.complete() {
            let failed = outcome.is_err();
            if let Err(e) = &outcome {
                warn!(job = %job.name(), job_type = %job.job_type(), error = %e, "job failed");
            } else {
                debug!(job = %job.name(), job_type = %job.job_type(), ?elapsed, "job completed");
            }
            self.with_metrics(|m| m.record_execution(job.job_type(), elapsed, failed));
            self.dispatcher.dispatch_post_execute(job, outcome);
        } else {
            debug!(job = %job.name(), ?elapsed, "job cancelled while running, result discarded");
            self.with_metrics(|m| m.record_cancellation());
            self.dispatcher.dispatch_cancelled(job);
        }
        Some(elapsed)
    }
}
