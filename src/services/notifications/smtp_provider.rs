//! SMTP delivery over lettre's async transport.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::provider::{DeliveryError, EmailMessage};
use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::{AppError, AppResult};

/// Pooled SMTP transport shared by every job
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from).finish()
    }
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host),
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            }
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &config.host,
            )),
        }
        .map_err(|e| AppError::Configuration {
            key: "smtp.host".to_string(),
            source: anyhow::Error::from(e),
        })?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Configuration {
                key: "smtp.from_email".to_string(),
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Sends one message; `timeout` caps the whole exchange.
    pub async fn send(&self, message: &EmailMessage, timeout: Duration) -> Result<(), DeliveryError> {
        let email = self.build(message)?;

        match tokio::time::timeout(timeout, self.transport.send(email)).await {
            Ok(Ok(response)) => {
                tracing::debug!(to = %message.to, code = %response.code(), "Email accepted");
                Ok(())
            }
            Ok(Err(e)) => Err(classify(&e)),
            Err(_) => Err(DeliveryError::Transient(format!(
                "smtp send timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn build(&self, message: &EmailMessage) -> Result<Message, DeliveryError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| DeliveryError::Permanent(format!("invalid recipient '{}': {e}", message.to)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str());

        let built = match &message.text_body {
            Some(text) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone(),
                message.html_body.clone(),
            )),
            None => builder.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(message.html_body.clone()),
            ),
        };

        built.map_err(|e| DeliveryError::Permanent(format!("could not build email: {e}")))
    }
}

/// 4xx and connection trouble may clear up; 5xx will not.
fn classify(error: &lettre::transport::smtp::Error) -> DeliveryError {
    if error.is_permanent() {
        DeliveryError::Permanent(error.to_string())
    } else {
        DeliveryError::Transient(error.to_string())
    }
}
