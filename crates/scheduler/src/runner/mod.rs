//! Scheduler runner -- worker-pool admission and job execution.
//!
//! Split into focused submodules:
//! - `core`: Scheduler handle, shared state, constructor and accessors
//! - `admission`: submission routing, worker spawning, cancellation
//! - `worker`: the scheduling worker loop and the job completion path

mod admission;
mod core;
mod worker;

pub use self::admission::Submission;
pub use self::core::Scheduler;
