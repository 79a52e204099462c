//! Weighted fair queue over job types.
//!
//! Each job type with pending work owns a scheduling key ordered by virtual
//! runtime. `poll_next` serves the least-charged type that is still below its
//! parallelism cap; `report_completion` charges the elapsed time, scaled by
//! the type's weight, back to that type. This is CFS applied to job types
//! instead of threads, so the ordered set stays as small as the type catalog.
//!
//! All state sits behind one mutex. Re-ordering a key is a single
//! remove-mutate-reinsert step (`QueueState::reposition`) done under that
//! lock.

mod key;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use jobweave_core::JobType;
use serde::Serialize;
use tracing::debug;

use crate::job::Job;

use self::key::{OrderSlot, SchedulingKey};

/// Gap between the largest virtual runtime in the ordering and a newly
/// created key.
pub const RUNTIME_SEED: u64 = 5;

#[derive(Debug, Default)]
pub struct FairQueue {
    state: Mutex<QueueState>,
}

/// Point-in-time view of one type's scheduling key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySnapshot {
    pub job_type: JobType,
    pub vruntime: u64,
    pub in_flight: usize,
    pub pending: usize,
    /// False while the type has no pending jobs and only in-flight ones.
    pub scheduled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSnapshot {
    /// Scheduled keys in dispatch order, followed by unscheduled ones.
    pub keys: Vec<KeySnapshot>,
}

impl QueueSnapshot {
    pub fn get(&self, job_type: JobType) -> Option<&KeySnapshot> {
        self.keys.iter().find(|k| k.job_type == job_type)
    }
}

impl FairQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, job: Arc<Job>) {
        self.lock().enqueue(job);
    }

    /// Take the next runnable job, or `None` if nothing is runnable right
    /// now. Never blocks; callers should stop polling on `None`.
    pub fn poll_next(&self) -> Option<Arc<Job>> {
        self.lock().poll_next()
    }

    /// Charge `elapsed` to the job's type and release its in-flight slot.
    ///
    /// Returns false if the type has no scheduling key. A zero `elapsed`
    /// leaves the virtual runtime untouched but still releases the slot.
    pub fn report_completion(&self, job: &Job, elapsed: Duration) -> bool {
        self.lock().report_completion(job.job_type(), elapsed)
    }

    /// Pending jobs across all types, including cancelled ones not yet
    /// discarded by a poll.
    pub fn len(&self) -> usize {
        self.lock().keys.values().map(|k| k.pending.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.lock().snapshot()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    order: BTreeSet<OrderSlot>,
    keys: HashMap<JobType, SchedulingKey>,
    next_seq: u64,
}

impl QueueState {
    /// Starting virtual runtime for a key entering the ordering.
    fn baseline(&self) -> u64 {
        self.order
            .last()
            .map_or(0, |slot| slot.vruntime.saturating_add(RUNTIME_SEED))
    }

    /// Take the key out of the ordering, apply `mutate`, and put it back if
    /// it still has pending jobs. A key with nothing pending and nothing in
    /// flight is dropped.
    fn reposition<F>(&mut self, job_type: JobType, mutate: F) -> bool
    where
        F: FnOnce(&mut SchedulingKey),
    {
        let Some(key) = self.keys.get_mut(&job_type) else {
            return false;
        };
        if let Some(slot) = key.slot.take() {
            self.order.remove(&slot);
        }

        mutate(key);

        if !key.pending.is_empty() {
            let slot = OrderSlot {
                vruntime: key.vruntime,
                seq: self.next_seq,
                job_type,
            };
            self.next_seq += 1;
            self.order.insert(slot);
            key.slot = Some(slot);
        } else if key.in_flight == 0 {
            self.keys.remove(&job_type);
        }
        true
    }

    fn enqueue(&mut self, job: Arc<Job>) {
        let job_type = job.job_type();
        let scheduled = self
            .keys
            .get(&job_type)
            .is_some_and(|key| key.slot.is_some());

        if scheduled {
            if let Some(key) = self.keys.get_mut(&job_type) {
                key.pending.push(job);
            }
            return;
        }

        // New key, or one that only has jobs in flight: restart from the
        // current maximum so it neither ties with nor leapfrogs active keys.
        let baseline = self.baseline();
        self.keys
            .entry(job_type)
            .or_insert_with(|| SchedulingKey::new(job_type, baseline));
        self.reposition(job_type, |key| {
            key.vruntime = baseline;
            key.pending.push(job);
        });
        debug!(%job_type, vruntime = baseline, "job type entered fair queue");
    }

    fn poll_next(&mut self) -> Option<Arc<Job>> {
        loop {
            let job_type = self
                .order
                .iter()
                .map(|slot| slot.job_type)
                .find(|t| self.keys.get(t).is_some_and(SchedulingKey::has_capacity))?;

            let key = self.keys.get_mut(&job_type)?;
            let job = key.pending.pop_runnable();
            if job.is_some() {
                key.in_flight += 1;
            }
            if key.pending.is_empty() {
                if let Some(slot) = key.slot.take() {
                    self.order.remove(&slot);
                }
                if key.in_flight == 0 {
                    self.keys.remove(&job_type);
                }
            }

            // Only cancelled jobs were left for this type; try the next one.
            if job.is_some() {
                return job;
            }
        }
    }

    fn report_completion(&mut self, job_type: JobType, elapsed: Duration) -> bool {
        self.reposition(job_type, |key| {
            if !elapsed.is_zero() {
                key.charge(elapsed);
            }
            key.in_flight = key.in_flight.saturating_sub(1);
        })
    }

    fn snapshot(&self) -> QueueSnapshot {
        let describe = |key: &SchedulingKey| KeySnapshot {
            job_type: key.job_type,
            vruntime: key.vruntime,
            in_flight: key.in_flight,
            pending: key.pending.len(),
            scheduled: key.slot.is_some(),
        };

        let mut keys: Vec<KeySnapshot> = self
            .order
            .iter()
            .filter_map(|slot| self.keys.get(&slot.job_type))
            .map(describe)
            .collect();
        let mut idle: Vec<KeySnapshot> = self
            .keys
            .values()
            .filter(|key| key.slot.is_none())
            .map(describe)
            .collect();
        idle.sort_by_key(|k| k.job_type);
        keys.extend(idle);
        QueueSnapshot { keys }
    }
}
