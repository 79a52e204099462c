//! Bounded execution pool shared by scheduling workers and immediate jobs.
//!
//! Capacity is enforced with a slot counter in front of a rayon pool of the
//! same size: a work item must hold a [`Slot`] to be spawned, so saturation
//! surfaces as an explicit [`SchedulerError::Saturated`] instead of a silent
//! backlog. A work item may hand its slot back before it returns; a new item
//! spawned into that slot can wait briefly for the finishing thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jobweave_core::SchedulerError;
use tracing::error;

use crate::job::panic_message;

pub struct Substrate {
    pool: rayon::ThreadPool,
    capacity: usize,
    in_use: Arc<AtomicUsize>,
}

/// A claimed unit of pool capacity. Released on drop.
#[derive(Debug)]
pub struct Slot {
    in_use: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Substrate {
    pub fn new(capacity: usize, thread_name_prefix: &str) -> Result<Self, SchedulerError> {
        let prefix = thread_name_prefix.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(capacity)
            .thread_name(move |i| format!("{prefix}@{i}"))
            .panic_handler(|payload| {
                error!(panic = %panic_message(&*payload), "panic escaped a pooled work item");
            })
            .build()
            .map_err(|e| SchedulerError::PoolBuild(e.to_string()))?;

        Ok(Self {
            pool,
            capacity,
            in_use: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Claim one unit of capacity, or fail if every slot is taken.
    pub fn try_reserve(&self) -> Result<Slot, SchedulerError> {
        let capacity = self.capacity;
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|in_use| SchedulerError::Saturated { in_use, capacity })?;
        Ok(Slot {
            in_use: Arc::clone(&self.in_use),
        })
    }

    /// Run `work` on the pool. `work` owns the slot and releases it by
    /// dropping it, at the latest when it returns.
    pub fn spawn<F>(&self, slot: Slot, work: F)
    where
        F: FnOnce(Slot) + Send + 'static,
    {
        self.pool.spawn(move || work(slot));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn reserve_up_to_capacity() {
        let substrate = Substrate::new(2, "test").unwrap();
        let a = substrate.try_reserve().unwrap();
        let _b = substrate.try_reserve().unwrap();
        assert_eq!(substrate.in_use(), 2);

        match substrate.try_reserve() {
            Err(SchedulerError::Saturated { in_use, capacity }) => {
                assert_eq!((in_use, capacity), (2, 2));
            }
            other => panic!("expected saturation, got {other:?}"),
        }

        drop(a);
        assert_eq!(substrate.in_use(), 1);
        assert!(substrate.try_reserve().is_ok());
    }

    #[test]
    fn spawned_work_releases_slot() {
        let substrate = Substrate::new(1, "test").unwrap();
        let (tx, rx) = mpsc::channel();
        let slot = substrate.try_reserve().unwrap();
        substrate.spawn(slot, move |_slot| {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test@0"));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while substrate.in_use() != 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(substrate.in_use(), 0);
    }

    #[test]
    fn panicking_work_still_releases_slot() {
        let substrate = Substrate::new(1, "test").unwrap();
        let slot = substrate.try_reserve().unwrap();
        substrate.spawn(slot, |_slot| panic!("unguarded work item"));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while substrate.in_use() != 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(substrate.in_use(), 0);
        assert!(substrate.try_reserve().is_ok());
    }

    #[test]
    fn work_can_release_slot_early() {
        let substrate = Substrate::new(1, "test").unwrap();
        let counter = Arc::clone(&substrate.in_use);
        let (tx, rx) = mpsc::channel();
        let slot = substrate.try_reserve().unwrap();
        substrate.spawn(slot, move |slot| {
            drop(slot);
            tx.send(counter.load(Ordering::Acquire)).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
        assert_eq!(substrate.capacity(), 1);
    }
}
