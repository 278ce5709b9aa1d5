//! Notification service: SMTP delivery plus realtime fan-out.

use std::time::Duration;

use async_trait::async_trait;

use super::provider::{DeliveryError, EmailMessage, NotificationSink, RealtimeEvent};
use super::realtime::RealtimeHub;
use super::smtp_provider::SmtpMailer;
use crate::config::SmtpConfig;
use crate::error::AppResult;

/// Production [`NotificationSink`]; cheap to clone.
#[derive(Clone, Debug)]
pub struct NotificationService {
    mailer: SmtpMailer,
    realtime: RealtimeHub,
}

impl NotificationService {
    pub fn new(config: &SmtpConfig, realtime: RealtimeHub) -> AppResult<Self> {
        Ok(Self {
            mailer: SmtpMailer::new(config)?,
            realtime,
        })
    }

    pub fn realtime(&self) -> &RealtimeHub {
        &self.realtime
    }
}

#[async_trait]
impl NotificationSink for NotificationService {
    async fn send_email(&self, message: &EmailMessage, timeout: Duration) -> Result<(), DeliveryError> {
        self.mailer.send(message, timeout).await
    }

    async fn push_event(&self, user_id: i32, event: RealtimeEvent) {
        let delivered = self.realtime.push(user_id, &event);
        tracing::debug!(user_id, kind = %event.kind, delivered, "Realtime event pushed");
    }
}
