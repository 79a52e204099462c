use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use jobweave_core::JobType;
use tracing::debug;

use crate::job::Job;

/// Position of a scheduling key in the ordering. `seq` breaks virtual
/// runtime ties by insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct OrderSlot {
    pub vruntime: u64,
    pub seq: u64,
    pub job_type: JobType,
}

/// Per-type scheduling state.
#[derive(Debug)]
pub(super) struct SchedulingKey {
    pub job_type: JobType,
    /// Weighted nanoseconds of execution charged to this type.
    pub vruntime: u64,
    pub in_flight: usize,
    pub pending: PendingQueue,
    /// Set while the key takes part in the ordering (it has pending jobs).
    pub slot: Option<OrderSlot>,
}

impl SchedulingKey {
    pub fn new(job_type: JobType, vruntime: u64) -> Self {
        Self {
            job_type,
            vruntime,
            in_flight: 0,
            pending: PendingQueue::default(),
            slot: None,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.job_type.max_parallel()
    }

    /// Advance virtual runtime by `elapsed` scaled with the type's weight.
    pub fn charge(&mut self, elapsed: Duration) {
        let delta = elapsed.as_nanos() as f64 * self.job_type.weight();
        self.vruntime = self.vruntime.saturating_add(delta as u64);
    }
}

/// Jobs of one type, most urgent first, FIFO among equal priorities.
#[derive(Debug, Default)]
pub(super) struct PendingQueue {
    jobs: VecDeque<Arc<Job>>,
}

impl PendingQueue {
    /// Insert after every job whose priority is numerically <= the new one.
    pub fn push(&mut self, job: Arc<Job>) {
        let priority = job.priority();
        let index = self.jobs.partition_point(|queued| queued.priority() <= priority);
        self.jobs.insert(index, job);
    }

    /// Pop the head, discarding jobs cancelled while they waited.
    pub fn pop_runnable(&mut self) -> Option<Arc<Job>> {
        while let Some(job) = self.jobs.pop_front() {
            if job.can_execute() {
                return Some(job);
            }
            debug!(job = %job.name(), state = ?job.state(), "discarding job that is no longer runnable");
        }
        None
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn job(name: &str, priority: i32) -> Arc<Job> {
        Job::from_fn(name, |_| Ok(Value::Null)).priority(priority).build()
    }

    fn names(queue: &mut PendingQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop_runnable())
            .map(|j| j.name().to_string())
            .collect()
    }

    #[test]
    fn stable_priority_insertion() {
        let mut queue = PendingQueue::default();
        queue.push(job("a", 5));
        queue.push(job("b", 1));
        queue.push(job("c", 5));
        queue.push(job("d", 10));
        queue.push(job("e", 1));
        assert_eq!(queue.len(), 5);
        assert_eq!(names(&mut queue), vec!["b", "e", "a", "c", "d"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn skips_cancelled_jobs() {
        let mut queue = PendingQueue::default();
        let doomed = job("doomed", 1);
        queue.push(Arc::clone(&doomed));
        queue.push(job("kept", 5));
        doomed.cancel();
        assert_eq!(names(&mut queue), vec!["kept"]);
    }

    #[test]
    fn charge_scales_by_weight() {
        let mut key = SchedulingKey::new(JobType::BackgroundIo, 10);
        key.charge(Duration::from_millis(3));
        assert_eq!(key.vruntime, 10 + 6_000_000);

        let mut key = SchedulingKey::new(JobType::Foreground, 0);
        key.charge(Duration::from_micros(7));
        assert_eq!(key.vruntime, 7_000);
    }

    #[test]
    fn capacity_follows_max_parallel() {
        let mut key = SchedulingKey::new(JobType::Immediate, 0);
        assert!(key.has_capacity());
        key.in_flight = 1;
        assert!(!key.has_capacity());
    }
}
