use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use jobweave_core::{SchedulerConfig, SchedulerError};
use tracing::info;

use crate::dispatch::{CallbackDispatcher, InlineDispatcher};
use crate::fair_queue::{FairQueue, QueueSnapshot};
use crate::metrics::SchedulerMetrics;
use crate::substrate::Substrate;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// The job scheduler. Routes immediate jobs straight onto the execution
/// pool and everything else through the [`FairQueue`], drained by at most
/// `core_threads` scheduling workers.
///
/// Cloning is cheap; clones share one pool and one queue, so the handle can
/// be passed to every producer that needs to submit or cancel jobs.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) shared: Arc<Shared>,
}

pub(super) struct Shared {
    pub(super) config: SchedulerConfig,
    pub(super) queue: FairQueue,
    pub(super) substrate: Substrate,
    /// Scheduling-worker count. Held while deciding to spawn a worker and
    /// while a worker decides to exit, so the two never race.
    pub(super) admission: Mutex<Admission>,
    pub(super) dispatcher: Arc<dyn CallbackDispatcher>,
    pub(super) metrics: RwLock<SchedulerMetrics>,
}

#[derive(Debug, Default)]
pub(super) struct Admission {
    pub(super) active_workers: usize,
}

impl Shared {
    pub(super) fn lock_admission(&self) -> MutexGuard<'_, Admission> {
        self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn with_metrics(&self, update: impl FnOnce(&mut SchedulerMetrics)) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut metrics);
    }
}

impl Scheduler {
    /// Create a scheduler with the given config and callback dispatcher.
    pub fn new(
        config: SchedulerConfig,
        dispatcher: Arc<dyn CallbackDispatcher>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let substrate = Substrate::new(config.max_threads, &config.thread_name_prefix)?;
        info!(
            core_threads = config.core_threads,
            pool_capacity = substrate.capacity(),
            immediate_headroom = config.immediate_headroom(),
            "Scheduler started"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                queue: FairQueue::new(),
                substrate,
                admission: Mutex::new(Admission::default()),
                dispatcher,
                metrics: RwLock::new(SchedulerMetrics::default()),
            }),
        })
    }

    /// Scheduler whose listener callbacks run on the pool threads.
    pub fn with_inline_dispatch(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::new(config, Arc::new(InlineDispatcher))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        let mut snapshot = self
            .shared
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        snapshot.pool_in_use = self.shared.substrate.in_use();
        snapshot
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.shared.queue.snapshot()
    }

    pub fn pending_jobs(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn active_workers(&self) -> usize {
        self.shared.lock_admission().active_workers
    }

    /// No scheduling worker alive and no pool slot held.
    pub fn is_idle(&self) -> bool {
        self.active_workers() == 0 && self.shared.substrate.in_use() == 0
    }

    /// Block until [`is_idle`](Self::is_idle) or the timeout passes.
    /// Returns whether the scheduler went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }
    }
}
