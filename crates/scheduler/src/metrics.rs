use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobweave_core::JobType;
use serde::Serialize;

/// Scheduler operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Jobs that ran to completion (successfully or not), by type.
    pub jobs_executed: HashMap<JobType, u64>,
    /// Rolling average execution time by type.
    pub avg_job_duration: HashMap<JobType, Duration>,
    /// Last completion time by type.
    pub last_run: HashMap<JobType, DateTime<Utc>>,
    /// Executed jobs whose outcome was an error or a caught panic.
    pub jobs_failed: u64,
    /// Jobs cancelled before they started or observed cancelled at completion.
    pub jobs_cancelled: u64,
    /// Submissions refused because the execution pool was saturated.
    pub submissions_rejected: u64,
    /// Scheduling workers currently alive.
    pub active_workers: usize,
    /// Highest number of scheduling workers alive at once.
    pub peak_workers: usize,
    /// Execution pool slots currently held.
    pub pool_in_use: usize,
}

impl SchedulerMetrics {
    /// Record a job that finished executing.
    pub fn record_execution(&mut self, job_type: JobType, duration: Duration, failed: bool) {
        let count = {
            let executed = self.jobs_executed.entry(job_type).or_default();
            *executed += 1;
            *executed
        };
        self.last_run.insert(job_type, Utc::now());
        if failed {
            self.jobs_failed += 1;
        }

        let prev_avg = self
            .avg_job_duration
            .get(&job_type)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_job_duration.insert(job_type, new_avg);
    }

    pub fn record_cancellation(&mut self) {
        self.jobs_cancelled += 1;
    }

    pub fn record_rejection(&mut self) {
        self.submissions_rejected += 1;
    }

    pub fn set_active_workers(&mut self, active: usize) {
        self.active_workers = active;
        self.peak_workers = self.peak_workers.max(active);
    }

    pub fn total_executed(&self) -> u64 {
        self.jobs_executed.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_single_execution() {
        let mut m = SchedulerMetrics::default();
        m.record_execution(JobType::Foreground, Duration::from_millis(100), false);

        assert_eq!(m.jobs_executed[&JobType::Foreground], 1);
        assert!(m.last_run.contains_key(&JobType::Foreground));
        assert_eq!(m.avg_job_duration[&JobType::Foreground], Duration::from_millis(100));
        assert_eq!(m.jobs_failed, 0);
    }

    #[test]
    fn record_multiple_executions_averages() {
        let mut m = SchedulerMetrics::default();
        m.record_execution(JobType::Background, Duration::from_millis(100), false);
        m.record_execution(JobType::Background, Duration::from_millis(200), true);

        assert_eq!(m.jobs_executed[&JobType::Background], 2);
        assert_eq!(m.jobs_failed, 1);
        let avg = m.avg_job_duration[&JobType::Background].as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn peak_workers_is_sticky() {
        let mut m = SchedulerMetrics::default();
        m.set_active_workers(3);
        m.set_active_workers(1);
        assert_eq!(m.active_workers, 1);
        assert_eq!(m.peak_workers, 3);
    }

    #[test]
    fn serializes_type_keys_as_names() {
        let mut m = SchedulerMetrics::default();
        m.record_execution(JobType::BackgroundIo, Duration::from_millis(5), false);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["jobs_executed"]["background_io"], 1);
    }

    #[test]
    fn default_metrics() {
        let m = SchedulerMetrics::default();
        assert_eq!(m.total_executed(), 0);
        assert_eq!(m.submissions_rejected, 0);
        assert!(m.jobs_executed.is_empty());
    }
}
