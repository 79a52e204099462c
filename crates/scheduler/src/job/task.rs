use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::CallbackDispatcher;

use super::Job;

/// Error type for a job's work unit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error("job panicked: {0}")]
    Panicked(String),
}

/// What a job produced: its result value, or why it has none.
pub type JobOutcome = Result<Value, JobError>;

/// The unit of work carried by a [`Job`].
///
/// Parameters live inside the implementor. The work unit runs once, on a
/// pool thread, and may block for as long as it needs to.
pub trait JobTask: Send {
    fn run(self: Box<Self>, ctx: &JobContext<'_>) -> JobOutcome;
}

impl<F> JobTask for F
where
    F: FnOnce(&JobContext<'_>) -> JobOutcome + Send,
{
    fn run(self: Box<Self>, ctx: &JobContext<'_>) -> JobOutcome {
        (*self)(ctx)
    }
}

/// Handle given to a running work unit.
pub struct JobContext<'a> {
    job: &'a Arc<Job>,
    dispatcher: &'a dyn CallbackDispatcher,
}

impl<'a> JobContext<'a> {
    pub(crate) fn new(job: &'a Arc<Job>, dispatcher: &'a dyn CallbackDispatcher) -> Self {
        Self { job, dispatcher }
    }

    pub fn job(&self) -> &Arc<Job> {
        self.job
    }

    /// Forward a progress payload to the job's listener.
    pub fn report_progress(&self, progress: Value) {
        self.dispatcher.dispatch_progress(self.job, progress);
    }

    /// True once the job has been cancelled. Long-running work units should
    /// poll this and return early; nothing interrupts them otherwise.
    pub fn is_cancelled(&self) -> bool {
        self.job.is_cancelled()
    }
}
