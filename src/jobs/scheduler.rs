use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::executor::{JobExecutor, JobSlot};
use crate::jobs::models::{JobInfo, RunSummary};
use crate::jobs::types::{JobTask, Trigger};

/// A job body plus when to fire it
pub struct JobDefinition {
    pub trigger: Trigger,
    pub task: Arc<dyn JobTask>,
}

impl JobDefinition {
    pub fn new(trigger: Trigger, task: Arc<dyn JobTask>) -> Self {
        Self { trigger, task }
    }
}

/// Wrapper around tokio-cron-scheduler with per-job single-flight.
///
/// Every firing, scheduled or manual, is tracked so `stop()` can wait for it.
pub struct JobScheduler {
    scheduler: Arc<Mutex<TokioCronScheduler>>,
    executor: Arc<JobExecutor>,
    slots: DashMap<&'static str, Arc<JobSlot>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
    grace_period: Duration,
}

impl JobScheduler {
    pub async fn new(grace_period: Duration) -> JobResult<Self> {
        let scheduler = TokioCronScheduler::new().await?;
        let shutdown = CancellationToken::new();

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            executor: Arc::new(JobExecutor::new(shutdown.clone())),
            slots: DashMap::new(),
            shutdown,
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
            grace_period,
        })
    }

    /// Adds a named job. Only allowed before `start()`.
    pub async fn register(&self, definition: JobDefinition) -> JobResult<()> {
        if self.started.load(Ordering::Acquire) || self.shutdown.is_cancelled() {
            return Err(JobError::Scheduler(format!(
                "cannot register '{}' after the scheduler has started",
                definition.task.name()
            )));
        }

        let slot = Arc::new(JobSlot::new(definition.trigger, definition.task));
        let cron_job = self.build_cron_job(&slot)?;

        match self.slots.entry(slot.name) {
            Entry::Occupied(_) => return Err(JobError::AlreadyExists(slot.name.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&slot));
            }
        }

        if let Err(e) = self.scheduler.lock().await.add(cron_job).await {
            self.slots.remove(slot.name);
            return Err(e.into());
        }

        tracing::info!(job = slot.name, trigger = %slot.trigger, "Job registered");
        Ok(())
    }

    /// Start firing registered jobs
    pub async fn start(&self) -> JobResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(JobError::Scheduler("scheduler has been stopped".to_string()));
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.scheduler.lock().await.start().await?;
        tracing::info!(jobs = self.slots.len(), "Job scheduler started");
        Ok(())
    }

    /// Cancels pending firings, signals running bodies and waits for them up
    /// to the grace period.
    pub async fn stop(&self) -> JobResult<()> {
        self.shutdown.cancel();

        let engine = if self.started.swap(false, Ordering::AcqRel) {
            self.scheduler.lock().await.shutdown().await
        } else {
            Ok(())
        };

        self.tracker.close();
        if tokio::time::timeout(self.grace_period, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                in_flight = self.tracker.len(),
                grace_period_secs = self.grace_period.as_secs(),
                "Job firings still running after grace period"
            );
        } else {
            tracing::info!("Job scheduler stopped");
        }

        engine.map_err(JobError::from)
    }

    /// Fires `name` now, outside its trigger. Honours single-flight.
    pub async fn trigger(&self, name: &str) -> JobResult<RunSummary> {
        if self.shutdown.is_cancelled() {
            return Err(JobError::Scheduler("scheduler has been stopped".to_string()));
        }
        let slot = self
            .slots
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| JobError::NotFound(name.to_string()))?;

        tracing::info!(job = name, "Manual trigger");
        self.tracker.track_future(self.executor.fire(&slot)).await
    }

    /// Registered jobs sorted by name
    pub fn jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.slots.iter().map(|entry| entry.value().info()).collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn build_cron_job(&self, slot: &Arc<JobSlot>) -> JobResult<Job> {
        let executor = Arc::clone(&self.executor);
        let tracker = self.tracker.clone();
        let slot_ref = Arc::clone(slot);

        let run = move |_uuid: uuid::Uuid, _lock: TokioCronScheduler| {
            let executor = Arc::clone(&executor);
            let tracker = tracker.clone();
            let slot = Arc::clone(&slot_ref);

            Box::pin(async move {
                if executor.is_shutting_down() {
                    return;
                }
                if let Err(JobError::AlreadyRunning(_)) =
                    tracker.track_future(executor.fire(&slot)).await
                {
                    let dropped = slot.record_dropped_tick();
                    tracing::warn!(
                        job = slot.name,
                        dropped_ticks = dropped,
                        "Previous firing still running, tick dropped"
                    );
                }
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        match &slot.trigger {
            Trigger::Cron(expr) => Job::new_async(expr.as_str(), run).map_err(|e| {
                JobError::InvalidTrigger(format!("invalid cron expression '{expr}': {e}"))
            }),
            Trigger::Interval(every) => Job::new_repeated_async(*every, run)
                .map_err(|e| JobError::InvalidTrigger(format!("invalid interval: {e}"))),
        }
    }
}
