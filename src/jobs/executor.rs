use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::models::{JobInfo, RunSummary};
use crate::jobs::types::{JobContext, JobTask, Trigger};

/// A registered job and its single-flight state
pub struct JobSlot {
    pub name: &'static str,
    pub trigger: Trigger,
    pub task: Arc<dyn JobTask>,
    running: AtomicBool,
    dropped_ticks: AtomicU64,
    history: Mutex<History>,
}

#[derive(Default)]
struct History {
    last_run: Option<RunSummary>,
    last_error: Option<String>,
}

impl JobSlot {
    pub fn new(trigger: Trigger, task: Arc<dyn JobTask>) -> Self {
        Self {
            name: task.name(),
            trigger,
            task,
            running: AtomicBool::new(false),
            dropped_ticks: AtomicU64::new(0),
            history: Mutex::new(History::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Counts a scheduled tick that found the previous firing still running.
    pub fn record_dropped_tick(&self) -> u64 {
        self.dropped_ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> JobInfo {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        JobInfo {
            name: self.name.to_string(),
            trigger: self.trigger.to_string(),
            running: self.is_running(),
            description: self.task.description(),
            dropped_ticks: self.dropped_ticks(),
            last_run: history.last_run.clone(),
            last_error: history.last_error.clone(),
        }
    }

    fn remember(&self, result: &JobResult<RunSummary>) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(summary) => {
                history.last_run = Some(summary.clone());
                history.last_error = None;
            }
            Err(error) => history.last_error = Some(error.to_string()),
        }
    }
}

/// Holds the running flag for one firing; cleared on drop, panics included.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs job bodies with single-flight, crash isolation and run logging
pub struct JobExecutor {
    shutdown: CancellationToken,
}

impl JobExecutor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Runs one firing of `slot`, or returns `AlreadyRunning` if one is in flight.
    pub async fn fire(&self, slot: &JobSlot) -> JobResult<RunSummary> {
        let Some(_guard) = RunningGuard::acquire(&slot.running) else {
            return Err(JobError::AlreadyRunning(slot.name.to_string()));
        };

        let ctx = JobContext::new(slot.name, self.shutdown.child_token());
        let span = tracing::info_span!("job", job = slot.name, run_id = %ctx.run_id);

        async {
            tracing::info!(trigger = %slot.trigger, "Job started");

            let result = AssertUnwindSafe(slot.task.run(&ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(JobError::HandlerCrash {
                        job: slot.name.to_string(),
                        message: panic_message(panic.as_ref()),
                    })
                });

            match &result {
                Ok(summary) => tracing::info!(
                    sent = summary.sent,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    affected_rows = summary.affected_rows,
                    cancelled = summary.cancelled,
                    duration_ms = summary.duration_ms().unwrap_or_default(),
                    "Job finished"
                ),
                Err(error) => tracing::error!(error = %error, "Job run aborted"),
            }
            slot.remember(&result);
            result
        }
        .instrument(span)
        .await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Blocks until released, so a second firing can observe the first.
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl JobTask for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(RunSummary::for_context(ctx).finish())
        }
    }

    struct Crashes;

    #[async_trait]
    impl JobTask for Crashes {
        fn name(&self) -> &'static str {
            "crashes"
        }

        async fn run(&self, _ctx: &JobContext) -> JobResult<RunSummary> {
            panic!("template missing");
        }
    }

    fn slot(task: Arc<dyn JobTask>) -> Arc<JobSlot> {
        Arc::new(JobSlot::new(Trigger::Interval(Duration::from_secs(60)), task))
    }

    #[tokio::test]
    async fn test_second_firing_is_rejected_while_running() {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let slot = slot(gate.clone());
        let executor = Arc::new(JobExecutor::new(CancellationToken::new()));

        let first = tokio::spawn({
            let slot = Arc::clone(&slot);
            let executor = Arc::clone(&executor);
            async move { executor.fire(&slot).await }
        });
        gate.entered.notified().await;
        assert!(slot.is_running());

        let second = executor.fire(&slot).await;
        assert!(matches!(second, Err(JobError::AlreadyRunning(name)) if name == "gate"));

        gate.release.notify_one();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.job_name, "gate");
        assert!(!slot.is_running());
        assert!(slot.info().last_run.is_some());
    }

    #[tokio::test]
    async fn test_panic_becomes_handler_crash() {
        let slot = slot(Arc::new(Crashes));
        let executor = JobExecutor::new(CancellationToken::new());

        for _ in 0..2 {
            let err = executor.fire(&slot).await.unwrap_err();
            match err {
                JobError::HandlerCrash { job, message } => {
                    assert_eq!(job, "crashes");
                    assert_eq!(message, "template missing");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(!slot.is_running());
        assert!(slot.info().last_error.unwrap().contains("template missing"));
    }

    #[test]
    fn test_dropped_ticks_are_counted() {
        let slot = slot(Arc::new(Crashes));
        assert_eq!(slot.record_dropped_tick(), 1);
        assert_eq!(slot.record_dropped_tick(), 2);
        assert_eq!(slot.info().dropped_ticks, 2);
    }
}
