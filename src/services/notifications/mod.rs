//! Notification delivery for the job bodies.
//!
//! [`NotificationSink`] is the seam the jobs depend on; [`NotificationService`]
//! implements it over SMTP and the realtime websocket hub.

pub mod compose;
mod notification_service;
mod provider;
mod realtime;
mod smtp_provider;

pub use notification_service::NotificationService;
pub use provider::{DeliveryError, EmailMessage, NotificationSink, RealtimeEvent};
pub use realtime::{RealtimeHub, Subscription};
pub use smtp_provider::SmtpMailer;
