//! Notification senders — the slow external call behind a trait.

use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::error::SendError;

/// The outbound notification action.
///
/// Production substitutes SMTP; tests substitute an instantaneous fake.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one notification. Errors are classified so the worker can
    /// decide between retry and drop.
    async fn send(&self, recipient: &str) -> Result<(), SendError>;
}

// ── Mock sender ─────────────────────────────────────────────────────

/// Default simulated send delay, modelling a multi-second external call.
const MOCK_SEND_DELAY: Duration = Duration::from_secs(8);

/// Mock sender that sleeps instead of talking to a mail server.
pub struct MockEmailSender {
    delay: Duration,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self {
            delay: MOCK_SEND_DELAY,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MockEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for MockEmailSender {
    fn name(&self) -> &str {
        "mock-email"
    }

    async fn send(&self, recipient: &str) -> Result<(), SendError> {
        info!("Starting to send a welcome email to {recipient}...");
        tokio::time::sleep(self.delay).await;
        info!("Successfully sent a welcome email to {recipient}");
        Ok(())
    }
}

// ── SMTP sender ─────────────────────────────────────────────────────

/// SMTP sender configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl SmtpConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_SMTP_HOST` is not set (SMTP disabled,
    /// the mock sender is used instead).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("EMAIL_SMTP_HOST").ok()?;

        let port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("EMAIL_USERNAME").unwrap_or_default();
        let password = std::env::var("EMAIL_PASSWORD").unwrap_or_default();
        let from_address =
            std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            from_address,
        })
    }
}

/// Welcome email sender over SMTP (lettre).
pub struct SmtpSender {
    config: SmtpConfig,
}

impl SmtpSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Build and send the welcome message. Blocking transport, so the
    /// worker runs this under `spawn_blocking`.
    fn send_blocking(config: &SmtpConfig, to: &str) -> Result<(), SendError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| SendError::Transient(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(config.from_address.parse().map_err(|e| {
                SendError::Fatal(format!("Invalid from address: {e}"))
            })?)
            .to(to
                .parse()
                .map_err(|e| SendError::Fatal(format!("Invalid recipient address: {e}")))?)
            .subject("Welcome!")
            .body("Welcome aboard! Your account has been created.".to_string())
            .map_err(|e| SendError::Fatal(format!("Failed to build email: {e}")))?;

        transport.send(&email).map_err(|e| {
            if e.is_permanent() {
                SendError::Fatal(format!("SMTP send rejected: {e}"))
            } else {
                SendError::Transient(format!("SMTP send failed: {e}"))
            }
        })?;

        info!("Welcome email sent to {to}");
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, recipient: &str) -> Result<(), SendError> {
        let config = self.config.clone();
        let to = recipient.to_string();

        tokio::task::spawn_blocking(move || Self::send_blocking(&config, &to))
            .await
            .map_err(|e| SendError::Transient(format!("SMTP task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_sender_succeeds_after_delay() {
        let sender = MockEmailSender::with_delay(Duration::from_millis(5));
        let started = std::time::Instant::now();

        sender.send("ada@example.com").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn smtp_sender_rejects_bad_recipient_as_fatal() {
        let sender = SmtpSender::new(SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "u".into(),
            password: "p".into(),
            from_address: "noreply@example.com".into(),
        });

        let err = sender.send("not-an-address").await.unwrap_err();
        assert!(matches!(err, SendError::Fatal(_)));
    }
}
