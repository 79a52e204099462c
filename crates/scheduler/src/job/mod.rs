//! Schedulable jobs and their state machine.
//!
//! `Initial -> Running -> Executed` is the normal path. `Cancelled` can be
//! reached from `Initial` (the job never runs) or from `Running` (the work
//! unit is asked to stop and its result is discarded). Every transition is a
//! compare-and-swap, so each one happens at most once.

mod listener;
mod task;
#[cfg(test)]
mod tests;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use jobweave_core::{JobType, Priority};
use serde::Serialize;
use uuid::Uuid;

pub use listener::JobListener;
pub use task::{JobContext, JobError, JobOutcome, JobTask};

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum JobState {
    Initial = 0,
    Running = 1,
    Cancelled = 2,
    Executed = 3,
}

impl JobState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => JobState::Initial,
            1 => JobState::Running,
            2 => JobState::Cancelled,
            _ => JobState::Executed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Cancelled | JobState::Executed)
    }
}

/// Result of asking a job to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job had not started and never will.
    BeforeStart,
    /// The job is running; its work unit sees `is_cancelled()` and the
    /// completion path reports the cancellation.
    WhileRunning,
    /// Already executed or already cancelled. Nothing changed.
    AlreadyFinished,
}

pub struct Job {
    id: JobId,
    name: String,
    job_type: JobType,
    priority: Priority,
    state: AtomicU8,
    submitted: AtomicBool,
    task: Mutex<Option<Box<dyn JobTask>>>,
    listener: Option<Arc<dyn JobListener>>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("job_type", &self.job_type)
            .field("priority", &self.priority)
            .field("state", &self.state())
            .finish()
    }
}

impl Job {
    pub fn builder(task: impl JobTask + 'static) -> JobBuilder {
        JobBuilder {
            name: None,
            job_type: JobType::default(),
            priority: Priority::default(),
            task: Box::new(task),
            listener: None,
        }
    }

    /// Builder for a job whose work unit is a closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> JobBuilder
    where
        F: FnOnce(&JobContext<'_>) -> JobOutcome + Send + 'static,
    {
        Self::builder(f).name(name)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Only jobs still in `Initial` may be submitted or dispatched.
    pub fn can_execute(&self) -> bool {
        self.state() == JobState::Initial
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == JobState::Cancelled
    }

    pub fn listener(&self) -> Option<&Arc<dyn JobListener>> {
        self.listener.as_ref()
    }

    fn transition(&self, from: JobState, to: JobState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Initial -> Running`, right before the work unit starts.
    pub(crate) fn begin(&self) -> bool {
        self.transition(JobState::Initial, JobState::Running)
    }

    /// `Running -> Executed`. Fails if a cancellation got there first.
    pub(crate) fn complete(&self) -> bool {
        self.transition(JobState::Running, JobState::Executed)
    }

    pub(crate) fn cancel(&self) -> CancelOutcome {
        if self.transition(JobState::Initial, JobState::Cancelled) {
            CancelOutcome::BeforeStart
        } else if self.transition(JobState::Running, JobState::Cancelled) {
            CancelOutcome::WhileRunning
        } else {
            CancelOutcome::AlreadyFinished
        }
    }

    /// Claim the job for a scheduler. Returns false if it was already
    /// claimed, which keeps one job from sitting in the queue twice.
    pub(crate) fn mark_submitted(&self) -> bool {
        !self.submitted.swap(true, Ordering::AcqRel)
    }

    /// Release the claim after a rejected submission so the caller may retry.
    pub(crate) fn unmark_submitted(&self) {
        self.submitted.store(false, Ordering::Release);
    }

    /// Run the work unit, converting a panic into [`JobError::Panicked`].
    pub(crate) fn execute(&self, ctx: &JobContext<'_>) -> JobOutcome {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return Err(JobError::Failed(format!("work unit of {} already consumed", self.name)));
        };

        match panic::catch_unwind(AssertUnwindSafe(|| task.run(ctx))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(JobError::Panicked(panic_message(&*payload))),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct JobBuilder {
    name: Option<String>,
    job_type: JobType,
    priority: Priority,
    task: Box<dyn JobTask>,
    listener: Option<Arc<dyn JobListener>>,
}

impl JobBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn job_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    /// Out-of-range values are clamped.
    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn listener(mut self, listener: Arc<dyn JobListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> Arc<Job> {
        let id = Uuid::new_v4();
        let name = self
            .name
            .unwrap_or_else(|| format!("{}-{}", self.job_type, &id.simple().to_string()[..8]));
        Arc::new(Job {
            id,
            name,
            job_type: self.job_type,
            priority: self.priority,
            state: AtomicU8::new(JobState::Initial as u8),
            submitted: AtomicBool::new(false),
            task: Mutex::new(Some(self.task)),
            listener: self.listener,
        })
    }
}
