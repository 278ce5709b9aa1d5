use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};

use crate::jobs::dispatch::{BatchDispatcher, CandidateSender, ReminderCandidate, VecSource};
use crate::jobs::error::JobResult;
use crate::jobs::gateway::ReminderQueryGateway;
use crate::jobs::models::RunSummary;
use crate::jobs::types::{JobContext, JobTask};
use crate::services::notifications::compose::{self, ServerInfo};
use crate::services::notifications::{DeliveryError, EmailMessage, NotificationSink};

/// Last observed storage health
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy { since: Timestamp, reason: String },
}

/// What a probe result changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthTransition {
    Unchanged,
    WentDown { reason: String, since: Timestamp },
    Recovered { downtime: SignedDuration },
}

impl HealthState {
    /// Applies one probe result. Only edges produce a transition; repeated
    /// failures keep the original `since`.
    pub fn observe(&mut self, probe: Result<(), String>, now: Timestamp) -> HealthTransition {
        let (next, transition) = match (&*self, probe) {
            (HealthState::Unhealthy { .. }, Err(_)) => return HealthTransition::Unchanged,
            (_, Err(reason)) => (
                HealthState::Unhealthy {
                    since: now,
                    reason: reason.clone(),
                },
                HealthTransition::WentDown { reason, since: now },
            ),
            (HealthState::Unhealthy { since, .. }, Ok(())) => (
                HealthState::Healthy,
                HealthTransition::Recovered {
                    downtime: now.duration_since(*since),
                },
            ),
            (_, Ok(())) => (HealthState::Healthy, HealthTransition::Unchanged),
        };
        *self = next;
        transition
    }
}

/// Probes storage and mails the administrator on health edges only.
pub struct HealthCheckJob {
    gateway: Arc<dyn ReminderQueryGateway>,
    sink: Arc<dyn NotificationSink>,
    dispatcher: BatchDispatcher,
    admin_email: String,
    server: ServerInfo,
    state: Mutex<HealthState>,
}

impl HealthCheckJob {
    pub fn new(
        gateway: Arc<dyn ReminderQueryGateway>,
        sink: Arc<dyn NotificationSink>,
        dispatcher: BatchDispatcher,
        admin_email: String,
        server: ServerInfo,
    ) -> Self {
        Self {
            gateway,
            sink,
            dispatcher,
            admin_email,
            server,
            state: Mutex::new(HealthState::Unknown),
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn probe(&self) -> Result<(), String> {
        let limit = self.dispatcher.config().per_item_timeout;
        match tokio::time::timeout(limit, self.gateway.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("storage ping timed out after {}ms", limit.as_millis())),
        }
    }
}

/// Sends an already composed message.
struct NoticeSender {
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
}

#[async_trait]
impl CandidateSender<EmailMessage> for NoticeSender {
    async fn deliver(&self, candidate: &ReminderCandidate<EmailMessage>) -> Result<(), DeliveryError> {
        self.sink.send_email(&candidate.payload, self.timeout).await
    }
}

#[async_trait]
impl JobTask for HealthCheckJob {
    fn name(&self) -> &'static str {
        "health_check"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<RunSummary> {
        let probe = self.probe().await;
        let now = Timestamp::now();
        let transition = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(probe, now);

        let (message, kind) = match transition {
            HealthTransition::Unchanged => {
                tracing::debug!(state = ?self.state(), "Health unchanged");
                return Ok(RunSummary::for_context(ctx).finish());
            }
            HealthTransition::WentDown { reason, since } => {
                tracing::warn!(error = %reason, "Storage became unreachable");
                (
                    compose::server_down(&self.admin_email, &self.server, &reason, since),
                    "alert",
                )
            }
            HealthTransition::Recovered { downtime } => {
                tracing::info!(downtime = %format!("{downtime:#}"), "Storage reachable again");
                (
                    compose::server_recovered(&self.admin_email, &self.server, downtime),
                    "recovery",
                )
            }
        };

        let mut source = VecSource::new([ReminderCandidate {
            recipient_id: 0,
            target: self.admin_email.clone(),
            idempotency_key: format!("health:{kind}:{}", now.as_second()),
            payload: message,
        }]);
        let sender = NoticeSender {
            sink: Arc::clone(&self.sink),
            timeout: self.dispatcher.config().per_item_timeout,
        };

        self.dispatcher.run(ctx, &mut source, &sender).await
    }

    fn description(&self) -> Option<String> {
        Some("Probe storage and alert the administrator on state changes".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tasks::testing::{FakeGateway, RecordingSink, ctx, dispatcher};
    use std::sync::atomic::Ordering;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn test_state_machine_edges() {
        let mut state = HealthState::Unknown;

        assert_eq!(state.observe(Ok(()), ts("2025-01-01T00:00:00Z")), HealthTransition::Unchanged);
        assert_eq!(state, HealthState::Healthy);

        let down = state.observe(Err("refused".into()), ts("2025-01-01T00:05:00Z"));
        assert!(matches!(down, HealthTransition::WentDown { ref reason, .. } if reason == "refused"));

        assert_eq!(
            state.observe(Err("still refused".into()), ts("2025-01-01T00:10:00Z")),
            HealthTransition::Unchanged
        );
        assert!(matches!(state, HealthState::Unhealthy { ref reason, .. } if reason == "refused"));

        assert_eq!(
            state.observe(Ok(()), ts("2025-01-01T00:20:00Z")),
            HealthTransition::Recovered {
                downtime: SignedDuration::from_mins(15)
            }
        );
        assert_eq!(state.observe(Ok(()), ts("2025-01-01T00:25:00Z")), HealthTransition::Unchanged);
    }

    #[test]
    fn test_first_probe_failure_alerts() {
        let mut state = HealthState::Unknown;
        assert!(matches!(
            state.observe(Err("boom".into()), ts("2025-01-01T00:00:00Z")),
            HealthTransition::WentDown { .. }
        ));
    }

    fn job(gateway: Arc<FakeGateway>, sink: Arc<RecordingSink>) -> HealthCheckJob {
        HealthCheckJob::new(
            gateway,
            sink,
            dispatcher(1),
            "ops@example.com".to_string(),
            ServerInfo {
                app_name: "taskdash".to_string(),
                hostname: "node-1".to_string(),
                environment: "test".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_one_alert_and_one_recovery_across_many_ticks() {
        let gateway = Arc::new(FakeGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let job = job(gateway.clone(), sink.clone());

        job.run(&ctx("health_check")).await.unwrap();
        assert!(sink.sent().is_empty());

        gateway.storage_down.store(true, Ordering::SeqCst);
        let alert = job.run(&ctx("health_check")).await.unwrap();
        assert_eq!(alert.sent, 1);
        for _ in 0..5 {
            let tick = job.run(&ctx("health_check")).await.unwrap();
            assert_eq!(tick.total(), 0);
        }

        gateway.storage_down.store(false, Ordering::SeqCst);
        job.run(&ctx("health_check")).await.unwrap();
        job.run(&ctx("health_check")).await.unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.starts_with("Server Down Alert"));
        assert!(sent[0].html_body.contains("node-1"));
        assert!(sent[0].html_body.contains("connection refused"));
        assert!(sent[1].subject.starts_with("Server Recovered"));
        assert!(sent.iter().all(|m| m.to == "ops@example.com"));
        assert_eq!(gateway.pings.load(Ordering::SeqCst), 9);
        assert_eq!(job.state(), HealthState::Healthy);
    }

    #[tokio::test]
    async fn test_transition_sticks_when_alert_fails() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.storage_down.store(true, Ordering::SeqCst);
        let sink = Arc::new(RecordingSink::default());
        sink.reject.lock().unwrap().insert("ops@example.com".to_string());
        let job = job(gateway, sink);

        let first = job.run(&ctx("health_check")).await.unwrap();
        let second = job.run(&ctx("health_check")).await.unwrap();

        assert_eq!(first.failed, 1);
        assert_eq!(second.total(), 0);
        assert!(matches!(job.state(), HealthState::Unhealthy { .. }));
    }
}
