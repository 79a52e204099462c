use std::sync::Arc;

use jobweave_core::SchedulerError;
use tracing::{debug, info, warn};

use crate::job::{CancelOutcome, Job};

use super::Scheduler;

/// How a submission was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The job was not in `Initial` state or was already submitted.
    Ignored,
    /// The job went straight onto the execution pool.
    Immediate,
    /// The job is waiting in the fair queue.
    Queued,
}

impl Scheduler {
    /// Submit a job.
    ///
    /// Jobs that are not in `Initial` state are ignored. Immediate jobs run
    /// on a pool slot right away; all others are queued and a scheduling
    /// worker is spawned if fewer than `core_threads` are alive.
    ///
    /// Fails with [`SchedulerError::Saturated`] when every pool slot is
    /// taken and:
    ///
    /// - the job is immediate, or
    /// - the job would be queued but no scheduling worker is alive to
    ///   drain it.
    ///
    /// A queued job that finds the pool full while at least one scheduling
    /// worker is alive is accepted and left to the live workers; it is never
    /// rejected in that case. A rejected job is left untouched and may be
    /// submitted again.
    pub fn submit(&self, job: &Arc<Job>) -> Result<Submission, SchedulerError> {
        if !job.can_execute() || !job.mark_submitted() {
            debug!(job = %job.name(), state = ?job.state(), "ignoring submission");
            return Ok(Submission::Ignored);
        }

        let result = if job.job_type().is_immediate() {
            self.submit_immediate(job)
        } else {
            self.submit_queued(job)
        };

        if let Err(e) = &result {
            job.unmark_submitted();
            self.shared.with_metrics(|m| m.record_rejection());
            warn!(job = %job.name(), job_type = %job.job_type(), error = %e, "submission rejected");
        }
        result
    }

    fn submit_immediate(&self, job: &Arc<Job>) -> Result<Submission, SchedulerError> {
        let slot = self.shared.substrate.try_reserve()?;
        let shared = Arc::clone(&self.shared);
        let job = Arc::clone(job);
        debug!(job = %job.name(), "running immediate job");
        self.shared.substrate.spawn(slot, move |_slot| {
            shared.run_job(&job);
        });
        Ok(Submission::Immediate)
    }

    fn submit_queued(&self, job: &Arc<Job>) -> Result<Submission, SchedulerError> {
        let mut admission = self.shared.lock_admission();

        // Reserve the new worker's slot before the job becomes visible in
        // the queue, so a rejection never leaves it stranded there.
        let slot = if admission.active_workers < self.shared.config.core_threads {
            match self.shared.substrate.try_reserve() {
                Ok(slot) => Some(slot),
                Err(e) if admission.active_workers == 0 => return Err(e),
                Err(e) => {
                    debug!(error = %e, active = admission.active_workers, "no slot for another worker, queueing for the live ones");
                    None
                }
            }
        } else {
            None
        };

        self.shared.queue.enqueue(Arc::clone(job));
        debug!(job = %job.name(), job_type = %job.job_type(), priority = %job.priority(), "job queued");

        if let Some(slot) = slot {
            admission.active_workers += 1;
            let active = admission.active_workers;
            self.shared.with_metrics(|m| m.set_active_workers(active));

            let shared = Arc::clone(&self.shared);
            self.shared.substrate.spawn(slot, move |slot| shared.worker_loop(slot));
        }
        Ok(Submission::Queued)
    }

    /// Cancel a job.
    ///
    /// A job that has not started never runs, and its cancelled callback
    /// fires right away. A running job is only flagged: its work unit can
    /// observe [`JobContext::is_cancelled`] and the completion path fires
    /// the cancelled callback instead of post-execute. Cancelling a finished
    /// job does nothing.
    ///
    /// [`JobContext::is_cancelled`]: crate::job::JobContext::is_cancelled
    pub fn cancel(&self, job: &Arc<Job>) -> CancelOutcome {
        let outcome = job.cancel();
        match outcome {
            CancelOutcome::BeforeStart => {
                info!(job = %job.name(), "job cancelled before start");
                self.shared.with_metrics(|m| m.record_cancellation());
                self.shared.dispatcher.dispatch_cancelled(job);
            }
            CancelOutcome::WhileRunning => {
                info!(job = %job.name(), "cancellation requested for running job");
            }
            CancelOutcome::AlreadyFinished => {
                debug!(job = %job.name(), state = ?job.state(), "cancel on finished job ignored");
            }
        }
        outcome
    }
}
