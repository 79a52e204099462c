//! jobweave-sim: drives a mixed workload through the scheduler.
//!
//! Submits a burst of jobs of every type, delivers their callbacks on an
//! owner loop running on the tokio runtime, waits for the scheduler to go
//! idle and prints the resulting metrics as JSON.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};

use jobweave_core::{load_dotenv, JobType, SchedulerConfig, SchedulerError};
use jobweave_scheduler::{
    ChannelDispatcher, Job, JobError, JobListener, JobOutcome, Scheduler,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Fair job scheduler simulation.
#[derive(Parser, Debug)]
#[command(name = "jobweave-sim", version, about)]
struct Cli {
    /// Path to a scheduler TOML config. Defaults plus env overrides if unset.
    #[arg(long, env = "JOBWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Jobs submitted per job type.
    #[arg(long, env = "JOBWEAVE_SIM_JOBS", default_value_t = 50)]
    jobs_per_type: usize,

    /// How long each job works, in milliseconds.
    #[arg(long, default_value_t = 5)]
    job_millis: u64,

    /// Cancel every Nth job right after submitting it (0 disables).
    #[arg(long, default_value_t = 0)]
    cancel_every: usize,

    /// Give up waiting for the scheduler after this many seconds.
    #[arg(long, default_value_t = 60)]
    idle_timeout: u64,
}

// ── Listener ────────────────────────────────────────────────────────

/// Tallies callbacks on the owner loop.
#[derive(Default)]
struct Tally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

impl JobListener for Tally {
    fn on_post_execute(&self, job: &Job, outcome: JobOutcome) {
        match outcome {
            Ok(_) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(job = %job.name(), error = %e, "job failed");
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn on_cancelled(&self, _job: &Job) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SchedulerConfig> {
    let config = match &cli.config {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SchedulerConfig::from_env()?,
    };
    config.log_summary();
    Ok(config)
}

fn sim_job(job_type: JobType, index: usize, work: Duration, tally: &Arc<Tally>) -> Arc<Job> {
    Job::from_fn(format!("{job_type}-{index}"), move |ctx| {
        let half = work / 2;
        std::thread::sleep(half);
        if ctx.is_cancelled() {
            return Err(JobError::Failed("stopped at checkpoint".into()));
        }
        ctx.report_progress(json!({ "percent": 50 }));
        std::thread::sleep(work - half);
        Ok(Value::from(index))
    })
    .job_type(job_type)
    .priority((index % 10) as i32 + 1)
    .listener(Arc::clone(tally) as Arc<dyn JobListener>)
    .build()
}

/// Submit, backing off while the execution pool is saturated.
async fn submit_with_backoff(scheduler: &Scheduler, job: &Arc<Job>) -> anyhow::Result<()> {
    loop {
        match scheduler.submit(job) {
            Ok(_) => return Ok(()),
            Err(SchedulerError::Saturated { .. }) => {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let (dispatcher, owner) = ChannelDispatcher::new();
    let owner_handle = tokio::spawn(owner.run());
    let scheduler = Scheduler::new(config, Arc::new(dispatcher))?;

    let tally = Arc::new(Tally::default());
    let work = Duration::from_millis(cli.job_millis);
    let mut submitted = 0usize;

    for index in 0..cli.jobs_per_type {
        for job_type in JobType::ALL {
            let job = sim_job(job_type, index, work, &tally);
            submit_with_backoff(&scheduler, &job).await?;
            submitted += 1;
            if cli.cancel_every > 0 && submitted % cli.cancel_every == 0 {
                scheduler.cancel(&job);
            }
        }
    }
    let sizing = scheduler.config();
    info!(
        submitted,
        core_threads = sizing.core_threads,
        max_threads = sizing.max_threads,
        "workload submitted"
    );

    let waiter = scheduler.clone();
    let timeout = Duration::from_secs(cli.idle_timeout);
    let idle = tokio::task::spawn_blocking(move || waiter.wait_idle(timeout)).await?;
    if !idle {
        warn!(timeout_secs = cli.idle_timeout, "scheduler still busy, reporting partial metrics");
    }

    let metrics = scheduler.metrics();
    // Once idle, dropping the last handle closes the channel and lets the
    // owner loop finish. Busy workers would keep it open.
    drop(scheduler);
    let delivered = if idle {
        owner_handle.await?
    } else {
        owner_handle.abort();
        0
    };

    info!(
        delivered,
        succeeded = tally.succeeded.load(Ordering::Relaxed),
        failed = tally.failed.load(Ordering::Relaxed),
        cancelled = tally.cancelled.load(Ordering::Relaxed),
        "simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
