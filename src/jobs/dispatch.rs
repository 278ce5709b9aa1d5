//! Batched bulk delivery shared by every reminder job.
//!
//! A run pulls one page of candidates at a time from a [`CandidateSource`],
//! delivers each through a [`CandidateSender`] with bounded concurrency, and
//! drops the page before asking for the next one. Per-item failures are
//! recorded in the [`RunSummary`]; only a source error ends the run early.
//! Cancellation is observed between items and during every wait.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use rand::Rng;
use tokio::time::{sleep, timeout};

use crate::config::DispatchSettings;
use crate::jobs::error::JobResult;
use crate::jobs::models::{DispatchResult, RunSummary};
use crate::jobs::types::JobContext;
use crate::services::notifications::DeliveryError;

/// Runtime form of `[scheduler.dispatch]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Candidates materialized per page
    pub batch_size: usize,
    /// Deliveries in flight within one page
    pub concurrency: usize,
    pub inter_batch_delay: Duration,
    /// Cap on a single delivery attempt
    pub per_item_timeout: Duration,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub max_recorded_failures: usize,
}

impl From<&DispatchSettings> for DispatchConfig {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            concurrency: settings.concurrency.max(1),
            inter_batch_delay: Duration::from_millis(settings.inter_batch_delay_ms),
            per_item_timeout: Duration::from_secs(settings.per_item_timeout_seconds),
            max_retries: settings.max_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
            max_recorded_failures: settings.max_recorded_failures,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from(&DispatchSettings::default())
    }
}

/// One recipient plus what to tell them
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderCandidate<P> {
    pub recipient_id: i32,
    /// Email address the message goes to
    pub target: String,
    pub payload: P,
    /// Stable identity used in failure lists and logs
    pub idempotency_key: String,
}

/// Paginated producer of candidates for a single run.
///
/// A page shorter than `limit` (including an empty one) means the source is
/// exhausted. Sources keep their own cursor and are not reused across runs.
#[async_trait]
pub trait CandidateSource<P>: Send {
    async fn next_page(&mut self, limit: usize) -> JobResult<Vec<ReminderCandidate<P>>>;
}

/// Delivers one candidate.
///
/// `before_delivery` may veto a candidate with a skip reason. `after_delivery`
/// runs once for every candidate a delivery was attempted for; an error from
/// either hook aborts the run.
#[async_trait]
pub trait CandidateSender<P: Sync>: Send + Sync {
    async fn before_delivery(&self, _candidate: &ReminderCandidate<P>) -> JobResult<Option<String>> {
        Ok(None)
    }

    async fn deliver(&self, candidate: &ReminderCandidate<P>) -> Result<(), DeliveryError>;

    async fn after_delivery(
        &self,
        _candidate: &ReminderCandidate<P>,
        _result: &DispatchResult,
    ) -> JobResult<()> {
        Ok(())
    }
}

/// In-memory source; used for one-off notices and in tests.
pub struct VecSource<P> {
    items: VecDeque<ReminderCandidate<P>>,
}

impl<P> VecSource<P> {
    pub fn new(items: impl IntoIterator<Item = ReminderCandidate<P>>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<P: Send> CandidateSource<P> for VecSource<P> {
    async fn next_page(&mut self, limit: usize) -> JobResult<Vec<ReminderCandidate<P>>> {
        let take = limit.min(self.items.len());
        Ok(self.items.drain(..take).collect())
    }
}

#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    config: DispatchConfig,
}

impl BatchDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Drives `source` to exhaustion (or cancellation) through `sender`.
    pub async fn run<P, S, D>(
        &self,
        ctx: &JobContext,
        source: &mut S,
        sender: &D,
    ) -> JobResult<RunSummary>
    where
        P: Send + Sync,
        S: CandidateSource<P> + ?Sized,
        D: CandidateSender<P> + ?Sized,
    {
        let mut summary = RunSummary::for_context(ctx);
        let mut pages = 0usize;

        loop {
            if pages > 0 && !self.pause(ctx).await {
                summary.cancelled = true;
                break;
            }
            if ctx.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let page = source.next_page(self.config.batch_size).await?;
            pages += 1;
            if page.is_empty() {
                break;
            }
            let exhausted = page.len() < self.config.batch_size;

            // Each future owns its candidate, so the page is released as it drains.
            let results: Vec<DispatchResult> = stream::iter(page)
                .map(|candidate| async move { self.dispatch_one(ctx, &candidate, sender).await })
                .buffered(self.config.concurrency)
                .try_collect()
                .await?;

            for result in results {
                summary.record(result, self.config.max_recorded_failures);
            }
            tracing::debug!(
                page = pages,
                sent = summary.sent,
                failed = summary.failed,
                skipped = summary.skipped,
                "Page dispatched"
            );

            if exhausted {
                break;
            }
        }

        if ctx.is_cancelled() {
            summary.cancelled = true;
        }
        Ok(summary.finish())
    }

    /// Repeats a bounded delete step until it removes fewer than `batch_size`
    /// rows, pausing between steps like a paged dispatch.
    pub async fn drain<F, Fut>(
        &self,
        ctx: &JobContext,
        summary: &mut RunSummary,
        mut step: F,
    ) -> JobResult<()>
    where
        F: FnMut(usize) -> Fut + Send,
        Fut: Future<Output = JobResult<usize>> + Send,
    {
        let mut rounds = 0usize;
        loop {
            if (rounds > 0 && !self.pause(ctx).await) || ctx.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            let affected = step(self.config.batch_size).await?;
            rounds += 1;
            summary.affected_rows += affected as u64;

            if affected < self.config.batch_size {
                return Ok(());
            }
        }
    }

    async fn dispatch_one<P, D>(
        &self,
        ctx: &JobContext,
        candidate: &ReminderCandidate<P>,
        sender: &D,
    ) -> JobResult<DispatchResult>
    where
        P: Sync,
        D: CandidateSender<P> + ?Sized,
    {
        let key = candidate.idempotency_key.as_str();
        if ctx.is_cancelled() {
            return Ok(DispatchResult::skipped(key, "cancelled"));
        }
        if let Some(reason) = sender.before_delivery(candidate).await? {
            return Ok(DispatchResult::skipped(key, reason));
        }

        let mut attempts = 0u32;
        let result = loop {
            attempts += 1;
            let error = match timeout(self.config.per_item_timeout, sender.deliver(candidate)).await
            {
                Ok(Ok(())) => break DispatchResult::sent(key, attempts),
                Ok(Err(error)) => error,
                Err(_) => DeliveryError::Transient(format!(
                    "delivery timed out after {}ms",
                    self.config.per_item_timeout.as_millis()
                )),
            };

            let retry = error.is_retryable()
                && attempts <= self.config.max_retries
                && !ctx.is_cancelled();
            if !retry {
                tracing::warn!(key, attempts, error = %error, "Delivery failed");
                break DispatchResult::failed(key, error.to_string(), attempts);
            }

            let delay = self.backoff(attempts);
            tracing::debug!(key, attempts, delay_ms = delay.as_millis() as u64, error = %error, "Retrying delivery");
            tokio::select! {
                _ = ctx.cancellation_token.cancelled() => {
                    tracing::warn!(key, attempts, error = %error, "Delivery abandoned on shutdown");
                    break DispatchResult::failed(key, error.to_string(), attempts);
                }
                _ = sleep(delay) => {}
            }
        };

        sender.after_delivery(candidate, &result).await?;
        Ok(result)
    }

    /// Exponential backoff with up to 50% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_backoff.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
        let jitter = if base > 1 {
            rand::rng().random_range(0..=base / 2)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }

    /// Inter-batch wait; returns false when cancelled first.
    async fn pause(&self, ctx: &JobContext) -> bool {
        if self.config.inter_batch_delay.is_zero() {
            return !ctx.is_cancelled();
        }
        tokio::select! {
            _ = ctx.cancellation_token.cancelled() => false,
            _ = sleep(self.config.inter_batch_delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::error::JobError;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> JobContext {
        JobContext::new("test", CancellationToken::new())
    }

    fn config(batch_size: usize) -> DispatchConfig {
        DispatchConfig {
            batch_size,
            concurrency: 1,
            inter_batch_delay: Duration::from_millis(100),
            per_item_timeout: Duration::from_millis(200),
            max_retries: 2,
            retry_backoff: Duration::from_millis(50),
            max_recorded_failures: 100,
        }
    }

    fn candidates(n: usize) -> Vec<ReminderCandidate<usize>> {
        (0..n)
            .map(|i| ReminderCandidate {
                recipient_id: i as i32,
                target: format!("user{i}@example.com"),
                payload: i,
                idempotency_key: format!("c{i}"),
            })
            .collect()
    }

    /// Fails the listed payloads permanently, sends the rest.
    struct FailingSender {
        permanent: HashSet<usize>,
        calls: AtomicUsize,
    }

    impl FailingSender {
        fn new(permanent: impl IntoIterator<Item = usize>) -> Self {
            Self {
                permanent: permanent.into_iter().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CandidateSender<usize> for FailingSender {
        async fn deliver(&self, candidate: &ReminderCandidate<usize>) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent.contains(&candidate.payload) {
                Err(DeliveryError::Permanent("550 mailbox unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    /// Fails transiently `failures` times per candidate, then succeeds.
    struct FlakySender {
        failures: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl CandidateSender<usize> for FlakySender {
        async fn deliver(&self, _candidate: &ReminderCandidate<usize>) -> Result<(), DeliveryError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(DeliveryError::Transient("421 try again later".into()))
            } else {
                Ok(())
            }
        }
    }

    struct HangingSender;

    #[async_trait]
    impl CandidateSender<usize> for HangingSender {
        async fn deliver(&self, _candidate: &ReminderCandidate<usize>) -> Result<(), DeliveryError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failures_are_isolated() {
        let dispatcher = BatchDispatcher::new(config(50));
        let mut source = VecSource::new(candidates(130));
        let sender = FailingSender::new([10, 75]);

        let summary = dispatcher.run(&ctx(), &mut source, &sender).await.unwrap();

        assert_eq!(summary.sent, 128);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped, 0);
        let keys: Vec<_> = summary.failures.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["c10", "c75"]);
        assert!(summary.failures.iter().all(|f| f.attempts == 1));
        assert_eq!(sender.calls.load(Ordering::SeqCst), 130);
        assert!(summary.finished_at.is_some());
        assert!(!summary.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let dispatcher = BatchDispatcher::new(config(10));
        let mut source = VecSource::new(candidates(1));
        let sender = FlakySender {
            failures: 2,
            attempts: AtomicU32::new(0),
        };

        let summary = dispatcher.run(&ctx(), &mut source, &sender).await.unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(sender.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let dispatcher = BatchDispatcher::new(config(10));
        let mut source = VecSource::new(candidates(1));
        let sender = FlakySender {
            failures: u32::MAX,
            attempts: AtomicU32::new(0),
        };

        let summary = dispatcher.run(&ctx(), &mut source, &sender).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].attempts, 3);
        assert_eq!(sender.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_delivery_times_out() {
        let dispatcher = BatchDispatcher::new(DispatchConfig {
            max_retries: 0,
            ..config(10)
        });
        let mut source = VecSource::new(candidates(2));

        let started = tokio::time::Instant::now();
        let summary = dispatcher
            .run(&ctx(), &mut source, &HangingSender)
            .await
            .unwrap();

        assert_eq!(summary.failed, 2);
        assert!(summary.failures[0].error.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_skips_remaining_candidates() {
        let dispatcher = BatchDispatcher::new(DispatchConfig {
            retry_backoff: Duration::from_millis(500),
            ..config(50)
        });
        let ctx = ctx();
        let token = ctx.cancellation_token.clone();
        let mut source = VecSource::new(candidates(500));

        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            token.cancel();
        });

        let started = tokio::time::Instant::now();
        let summary = dispatcher
            .run(&ctx, &mut source, &HangingSender)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.total(), 50);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 49);
        assert!(started.elapsed() <= Duration::from_millis(300 + 200 + 50));
    }

    struct StorageDown;

    #[async_trait]
    impl CandidateSource<usize> for StorageDown {
        async fn next_page(&mut self, _limit: usize) -> JobResult<Vec<ReminderCandidate<usize>>> {
            Err(JobError::StorageUnavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_source_error_aborts_run() {
        let dispatcher = BatchDispatcher::new(config(10));
        let err = dispatcher
            .run(&ctx(), &mut StorageDown, &FailingSender::new([]))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::StorageUnavailable(_)));
    }

    struct SkipOdd;

    #[async_trait]
    impl CandidateSender<usize> for SkipOdd {
        async fn before_delivery(&self, candidate: &ReminderCandidate<usize>) -> JobResult<Option<String>> {
            Ok((candidate.payload % 2 == 1).then(|| "odd".to_string()))
        }

        async fn deliver(&self, _candidate: &ReminderCandidate<usize>) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_before_delivery_can_skip() {
        let dispatcher = BatchDispatcher::new(config(4));
        let mut source = VecSource::new(candidates(9));

        let summary = dispatcher.run(&ctx(), &mut source, &SkipOdd).await.unwrap();

        assert_eq!(summary.sent, 5);
        assert_eq!(summary.skipped, 4);
    }

    // ------------------------------------------------------------------------
    // Bounded materialization
    // ------------------------------------------------------------------------

    struct Tracked {
        live: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Generates `total` candidates lazily and records how many exist at once.
    struct CountingSource {
        total: usize,
        produced: usize,
        live: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl CountingSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                produced: 0,
                live: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl CandidateSource<Tracked> for CountingSource {
        async fn next_page(&mut self, limit: usize) -> JobResult<Vec<ReminderCandidate<Tracked>>> {
            let take = limit.min(self.total - self.produced);
            let page = (0..take)
                .map(|_| {
                    let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak.fetch_max(now, Ordering::SeqCst);
                    self.produced += 1;
                    ReminderCandidate {
                        recipient_id: self.produced as i32,
                        target: String::new(),
                        payload: Tracked {
                            live: Arc::clone(&self.live),
                        },
                        idempotency_key: self.produced.to_string(),
                    }
                })
                .collect();
            Ok(page)
        }
    }

    struct NoopSender;

    #[async_trait]
    impl CandidateSender<Tracked> for NoopSender {
        async fn deliver(&self, _candidate: &ReminderCandidate<Tracked>) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_peak_materialization_is_bounded_by_batch_size() {
        let batch_size = 500;
        let dispatcher = BatchDispatcher::new(DispatchConfig {
            batch_size,
            concurrency: 8,
            inter_batch_delay: Duration::ZERO,
            ..config(batch_size)
        });

        for total in [10, 10_000, 1_000_000] {
            let mut source = CountingSource::new(total);
            let summary = dispatcher.run(&ctx(), &mut source, &NoopSender).await.unwrap();

            assert_eq!(summary.sent as usize, total);
            assert!(source.peak.load(Ordering::SeqCst) <= batch_size, "total {total}");
            assert_eq!(source.live.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_run_future_is_send_across_spawn() {
        let dispatcher = Arc::new(BatchDispatcher::new(config(50)));
        let sender: Arc<dyn CandidateSender<usize>> = Arc::new(FailingSender::new([3]));

        let summary = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                let mut source = VecSource::new(candidates(7));
                dispatcher.run(&ctx(), &mut source, sender.as_ref()).await
            }
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(summary.sent, 6);
        assert_eq!(summary.failed, 1);
    }

    // ------------------------------------------------------------------------
    // Drain
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_drain_stops_on_short_batch() {
        let dispatcher = BatchDispatcher::new(config(100));
        let remaining = Arc::new(Mutex::new(250usize));
        let mut summary = RunSummary::for_context(&ctx());

        let calls = Arc::new(AtomicUsize::new(0));
        dispatcher
            .drain(&ctx(), &mut summary, |limit| {
                let remaining = Arc::clone(&remaining);
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let mut left = remaining.lock().unwrap();
                    let n = limit.min(*left);
                    *left -= n;
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(summary.affected_rows, 250);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    // ------------------------------------------------------------------------
    // Outcome accounting
    // ------------------------------------------------------------------------

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_outcome_counts_cover_every_candidate(
            total in 0usize..400,
            batch_size in 1usize..64,
            concurrency in 1usize..8,
            failing in proptest::collection::hash_set(0usize..400, 0..20),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let summary = rt.block_on(async {
                let dispatcher = BatchDispatcher::new(DispatchConfig {
                    concurrency: concurrency.min(batch_size),
                    ..config(batch_size)
                });
                let mut source = VecSource::new(candidates(total));
                let sender = FailingSender::new(failing.iter().copied());
                dispatcher.run(&ctx(), &mut source, &sender).await.unwrap()
            });

            let expected_failed = failing.iter().filter(|i| **i < total).count() as u64;
            prop_assert_eq!(summary.total(), total as u64);
            prop_assert_eq!(summary.failed, expected_failed);
            prop_assert_eq!(summary.sent, total as u64 - expected_failed);
            prop_assert!(summary.failures.iter().all(|f| f.attempts == 1));
            prop_assert!(summary.failures.iter().all(|f| f.error.contains("550")));
            prop_assert!(!summary.cancelled);
        }
    }
}
