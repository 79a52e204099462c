//! Delivery of job lifecycle callbacks.
//!
//! The scheduler never calls a [`JobListener`] itself. It hands each event to
//! a [`CallbackDispatcher`], which decides where the listener runs: inline on
//! the pool thread ([`InlineDispatcher`]) or on an owner context that drains
//! a channel ([`ChannelDispatcher`] + [`OwnerLoop`]).

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::job::{panic_message, Job, JobOutcome};

pub trait CallbackDispatcher: Send + Sync {
    fn dispatch_pre_execute(&self, job: &Arc<Job>);
    fn dispatch_progress(&self, job: &Arc<Job>, progress: Value);
    fn dispatch_post_execute(&self, job: &Arc<Job>, outcome: JobOutcome);
    fn dispatch_cancelled(&self, job: &Arc<Job>);
}

/// A lifecycle event waiting to be delivered to its job's listener.
#[derive(Debug)]
pub enum JobEvent {
    PreExecute(Arc<Job>),
    Progress(Arc<Job>, Value),
    PostExecute(Arc<Job>, JobOutcome),
    Cancelled(Arc<Job>),
}

impl JobEvent {
    pub fn job(&self) -> &Arc<Job> {
        match self {
            JobEvent::PreExecute(job)
            | JobEvent::Progress(job, _)
            | JobEvent::PostExecute(job, _)
            | JobEvent::Cancelled(job) => job,
        }
    }

    /// Invoke the matching listener hook on the current thread. A panicking
    /// listener is logged and swallowed.
    pub fn deliver(self) {
        let Some(listener) = self.job().listener().cloned() else {
            return;
        };
        let name = self.job().name().to_string();
        let result = panic::catch_unwind(AssertUnwindSafe(|| match self {
            JobEvent::PreExecute(job) => listener.on_pre_execute(&job),
            JobEvent::Progress(job, progress) => listener.on_progress(&job, progress),
            JobEvent::PostExecute(job, outcome) => listener.on_post_execute(&job, outcome),
            JobEvent::Cancelled(job) => listener.on_cancelled(&job),
        }));
        if let Err(payload) = result {
            error!(job = %name, panic = %panic_message(&*payload), "job listener panicked");
        }
    }
}

/// Runs listener hooks directly on whichever thread raised the event.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl CallbackDispatcher for InlineDispatcher {
    fn dispatch_pre_execute(&self, job: &Arc<Job>) {
        JobEvent::PreExecute(Arc::clone(job)).deliver();
    }

    fn dispatch_progress(&self, job: &Arc<Job>, progress: Value) {
        JobEvent::Progress(Arc::clone(job), progress).deliver();
    }

    fn dispatch_post_execute(&self, job: &Arc<Job>, outcome: JobOutcome) {
        JobEvent::PostExecute(Arc::clone(job), outcome).deliver();
    }

    fn dispatch_cancelled(&self, job: &Arc<Job>) {
        JobEvent::Cancelled(Arc::clone(job)).deliver();
    }
}

/// Posts events to an [`OwnerLoop`], so listeners run on the owner's
/// context instead of a pool thread.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, OwnerLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, OwnerLoop { rx })
    }

    fn post(&self, event: JobEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            debug!(job = %event.job().name(), "owner loop gone, dropping job event");
        }
    }
}

impl CallbackDispatcher for ChannelDispatcher {
    fn dispatch_pre_execute(&self, job: &Arc<Job>) {
        self.post(JobEvent::PreExecute(Arc::clone(job)));
    }

    fn dispatch_progress(&self, job: &Arc<Job>, progress: Value) {
        self.post(JobEvent::Progress(Arc::clone(job), progress));
    }

    fn dispatch_post_execute(&self, job: &Arc<Job>, outcome: JobOutcome) {
        self.post(JobEvent::PostExecute(Arc::clone(job), outcome));
    }

    fn dispatch_cancelled(&self, job: &Arc<Job>) {
        self.post(JobEvent::Cancelled(Arc::clone(job)));
    }
}

/// Receiving end of a [`ChannelDispatcher`]. Events are delivered in the
/// order they were posted.
#[derive(Debug)]
pub struct OwnerLoop {
    rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl OwnerLoop {
    /// Deliver events until every dispatcher handle has been dropped.
    /// Returns how many events were delivered.
    pub async fn run(mut self) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.rx.recv().await {
            event.deliver();
            delivered += 1;
        }
        debug!(delivered, "owner loop finished");
        delivered
    }

    /// Deliver whatever is queued right now without waiting for more.
    pub fn drain(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.rx.try_recv() {
            event.deliver();
            delivered += 1;
        }
        delivered
    }
}
