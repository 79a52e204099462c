use serde_json::Value;

use super::{Job, JobOutcome};

/// Lifecycle hooks for a single job.
///
/// Which thread runs them is up to the [`CallbackDispatcher`] the scheduler
/// was built with.
///
/// [`CallbackDispatcher`]: crate::dispatch::CallbackDispatcher
pub trait JobListener: Send + Sync {
    /// The job moved to `Running` and its work unit is about to start.
    fn on_pre_execute(&self, _job: &Job) {}

    fn on_progress(&self, _job: &Job, _progress: Value) {}

    /// The work unit finished and the job is `Executed`. Fires at most once
    /// and never together with `on_cancelled`.
    fn on_post_execute(&self, _job: &Job, _outcome: JobOutcome) {}

    fn on_cancelled(&self, _job: &Job) {}
}
