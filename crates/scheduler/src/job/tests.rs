use std::sync::Arc;

use jobweave_core::{JobType, Priority};
use serde_json::{json, Value};

use crate::dispatch::InlineDispatcher;

use super::*;

fn noop(name: &str) -> Arc<Job> {
    Job::from_fn(name, |_ctx| Ok(Value::Null)).build()
}

#[test]
fn builder_defaults() {
    let job = noop("defaults");
    assert_eq!(job.name(), "defaults");
    assert_eq!(job.job_type(), JobType::Background);
    assert_eq!(job.priority(), Priority::NORMAL);
    assert_eq!(job.state(), JobState::Initial);
    assert!(job.can_execute());
    assert!(job.listener().is_none());
}

#[test]
fn builder_clamps_priority() {
    let urgent = Job::from_fn("urgent", |_| Ok(Value::Null)).priority(-3).build();
    let lazy = Job::from_fn("lazy", |_| Ok(Value::Null)).priority(42).build();
    assert_eq!(urgent.priority(), Priority::MAX_URGENT);
    assert_eq!(lazy.priority(), Priority::MIN_URGENT);
}

#[test]
fn priority_read_from_json_stays_in_range() {
    for (raw, expected) in [("0", Priority::MAX_URGENT), ("200", Priority::MIN_URGENT)] {
        let priority: Priority = serde_json::from_str(raw).unwrap();
        let job = Job::from_fn("loaded", |_| Ok(Value::Null)).priority(priority).build();
        assert_eq!(job.priority(), expected);
        assert!((1..=10).contains(&job.priority().value()));
    }
}

struct Checksum {
    bytes: Vec<u8>,
}

impl JobTask for Checksum {
    fn run(self: Box<Self>, _ctx: &JobContext<'_>) -> JobOutcome {
        let sum: u64 = self.bytes.iter().map(|b| *b as u64).sum();
        Ok(json!(sum))
    }
}

#[test]
fn struct_task_owns_its_params() {
    let job = Job::builder(Checksum { bytes: vec![1, 2, 3] }).build();
    let dispatcher = InlineDispatcher;
    let ctx = JobContext::new(&job, &dispatcher);
    assert_eq!(job.execute(&ctx), Ok(json!(6)));
}

#[test]
fn unnamed_job_gets_type_prefix() {
    let job = Job::builder(Checksum { bytes: Vec::new() })
        .job_type(JobType::BackgroundIo)
        .build();
    assert!(job.name().starts_with("background_io-"));
}

#[test]
fn normal_transitions_happen_once() {
    let job = noop("once");
    assert!(job.begin());
    assert!(!job.begin());
    assert_eq!(job.state(), JobState::Running);
    assert!(!job.can_execute());

    assert!(job.complete());
    assert!(!job.complete());
    assert_eq!(job.state(), JobState::Executed);
    assert!(job.state().is_terminal());
}

#[test]
fn cancel_before_start() {
    let job = noop("early");
    assert_eq!(job.cancel(), CancelOutcome::BeforeStart);
    assert_eq!(job.state(), JobState::Cancelled);
    assert!(!job.begin(), "cancelled job must never start");
    assert_eq!(job.cancel(), CancelOutcome::AlreadyFinished);
}

#[test]
fn cancel_while_running_blocks_completion() {
    let job = noop("mid");
    assert!(job.begin());
    assert_eq!(job.cancel(), CancelOutcome::WhileRunning);
    assert!(job.is_cancelled());
    assert!(!job.complete());
    assert_eq!(job.state(), JobState::Cancelled);
}

#[test]
fn cancel_after_execution_is_noop() {
    let job = noop("late");
    job.begin();
    job.complete();
    assert_eq!(job.cancel(), CancelOutcome::AlreadyFinished);
    assert_eq!(job.state(), JobState::Executed);
}

#[test]
fn submission_claim() {
    let job = noop("claim");
    assert!(job.mark_submitted());
    assert!(!job.mark_submitted());
    job.unmark_submitted();
    assert!(job.mark_submitted());
}

#[test]
fn execute_returns_task_result() {
    let job = Job::from_fn("value", |ctx| Ok(json!({ "name": ctx.job().name() }))).build();
    let dispatcher = InlineDispatcher;
    let ctx = JobContext::new(&job, &dispatcher);
    assert_eq!(job.execute(&ctx), Ok(json!({ "name": "value" })));
}

#[test]
fn execute_converts_panic() {
    let job = Job::from_fn("boom", |_ctx| -> JobOutcome { panic!("disk on fire") }).build();
    let dispatcher = InlineDispatcher;
    let ctx = JobContext::new(&job, &dispatcher);
    assert_eq!(job.execute(&ctx), Err(JobError::Panicked("disk on fire".into())));
}

#[test]
fn work_unit_runs_only_once() {
    let job = noop("twice");
    let dispatcher = InlineDispatcher;
    let ctx = JobContext::new(&job, &dispatcher);
    assert!(job.execute(&ctx).is_ok());
    assert!(matches!(job.execute(&ctx), Err(JobError::Failed(_))));
}
