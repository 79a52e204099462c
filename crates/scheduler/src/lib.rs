pub mod dispatch;
pub mod fair_queue;
pub mod job;
pub mod metrics;
pub mod runner;
pub mod substrate;

pub use dispatch::{CallbackDispatcher, ChannelDispatcher, InlineDispatcher, JobEvent, OwnerLoop};
pub use fair_queue::{FairQueue, KeySnapshot, QueueSnapshot};
pub use job::{
    CancelOutcome, Job, JobBuilder, JobContext, JobError, JobId, JobListener, JobOutcome,
    JobState, JobTask,
};
pub use metrics::SchedulerMetrics;
pub use runner::{Scheduler, Submission};
pub use substrate::{Slot, Substrate};

pub use jobweave_core::{JobType, Priority, SchedulerConfig, SchedulerError};
