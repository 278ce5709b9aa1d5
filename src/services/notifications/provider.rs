//! Core notification sink trait and types.
//!
//! Job bodies only see this abstraction: one email at a time and one realtime
//! event at a time. SMTP and the websocket registry live behind it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// One outgoing email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    /// Plain-text alternative part
    pub text_body: Option<String>,
}

/// Event pushed to a user's open websocket connections
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    #[schema(example = "meeting_reminder")]
    pub kind: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: jiff::Timestamp,
}

impl RealtimeEvent {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: jiff::Timestamp::now(),
        }
    }
}

/// Why a single delivery did not go through
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Timeouts, connection drops, SMTP 4xx; worth another attempt
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Bad address, SMTP 5xx, unbuildable message; retrying cannot help
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

/// Where job bodies deliver notifications.
///
/// ```ignore
/// sink.send_email(&message, Duration::from_secs(30)).await?;
/// sink.push_event(user_id, RealtimeEvent::new("task_reminder", json!({ "task_id": 7 }))).await;
/// ```
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends one email; `timeout` caps the whole SMTP exchange.
    async fn send_email(&self, message: &EmailMessage, timeout: Duration)
    -> Result<(), DeliveryError>;

    /// Best-effort push; users without a live connection are skipped silently.
    async fn push_event(&self, user_id: i32, event: RealtimeEvent);
}
