//! Registration HTTP client — the untrusted-network side of the gateway.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::error::BotError;
use crate::gateway::BOT_SECRET_HEADER;

/// Sender identity extracted from a platform event.
#[derive(Debug, Clone)]
pub struct PlatformUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

/// Classified result of one registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// 201 — profile created on this call.
    Created,
    /// 400 whose body carries the duplicate-key marker on `telegram_id`.
    AlreadyRegistered,
    /// Any other non-success response.
    ApiError,
    /// Transport failure: timeout, connection refused, DNS.
    Unavailable,
}

/// HTTP client for the registration gateway.
///
/// Treats the gateway as untrusted-network-distance: every call carries a
/// timeout, and every failure collapses into one of four fixed replies —
/// nothing propagates to the platform reply channel.
pub struct RegistrationClient {
    http: reqwest::Client,
    endpoint: String,
    secret: SecretString,
}

impl RegistrationClient {
    pub fn new(
        endpoint: String,
        secret: SecretString,
        timeout: Duration,
    ) -> Result<Self, BotError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            secret,
        })
    }

    /// Post a registration payload and classify the response.
    pub async fn register(&self, user: &PlatformUser) -> RegistrationOutcome {
        let payload = serde_json::json!({
            "telegram_id": user.id,
            "username": user.username,
            "first_name": user.first_name,
        });

        let response = match self
            .http
            .post(&self.endpoint)
            .header(BOT_SECRET_HEADER, self.secret.expose_secret())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to connect to registration API: {e}");
                return RegistrationOutcome::Unavailable;
            }
        };

        match response.status() {
            StatusCode::CREATED => {
                info!(
                    telegram_id = user.id,
                    "Successfully created user via registration API"
                );
                RegistrationOutcome::Created
            }
            StatusCode::BAD_REQUEST => {
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                if is_duplicate_body(&body) {
                    info!(telegram_id = user.id, "User already exists");
                    RegistrationOutcome::AlreadyRegistered
                } else {
                    warn!(telegram_id = user.id, body = %body, "Registration rejected");
                    RegistrationOutcome::ApiError
                }
            }
            status => {
                warn!(telegram_id = user.id, status = %status, "Registration API error");
                RegistrationOutcome::ApiError
            }
        }
    }

    /// Handle a `/start` platform event end to end: register, then map the
    /// outcome to the single reply text. Never fails.
    pub async fn on_start(&self, user: &PlatformUser) -> String {
        let outcome = self.register(user).await;
        reply_text(outcome, &user.first_name)
    }
}

/// The four fixed reply strings, by outcome.
pub fn reply_text(outcome: RegistrationOutcome, first_name: &str) -> String {
    match outcome {
        RegistrationOutcome::Created => {
            format!("Welcome, {first_name}! Your profile has been created.")
        }
        RegistrationOutcome::AlreadyRegistered => {
            format!("Welcome back, {first_name}! Glad to see you again.")
        }
        RegistrationOutcome::ApiError => {
            "Sorry, there was an error processing your request.".to_string()
        }
        RegistrationOutcome::Unavailable => {
            "Sorry, the server is currently unavailable. Please try again later.".to_string()
        }
    }
}

/// Check whether a 400 body is the duplicate-`telegram_id` shape the
/// gateway (and the API it replaces) answers on an idempotent hit.
fn is_duplicate_body(body: &serde_json::Value) -> bool {
    body.get("telegram_id")
        .map(|errors| {
            let text = errors.to_string();
            text.contains("unique") || text.contains("already exists")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> PlatformUser {
        PlatformUser {
            id: 42,
            username: Some("ada".into()),
            first_name: "Ada".into(),
        }
    }

    #[test]
    fn reply_for_created() {
        assert_eq!(
            reply_text(RegistrationOutcome::Created, "Ada"),
            "Welcome, Ada! Your profile has been created."
        );
    }

    #[test]
    fn reply_for_already_registered() {
        assert_eq!(
            reply_text(RegistrationOutcome::AlreadyRegistered, "Ada"),
            "Welcome back, Ada! Glad to see you again."
        );
    }

    #[test]
    fn reply_for_api_error() {
        assert_eq!(
            reply_text(RegistrationOutcome::ApiError, "Ada"),
            "Sorry, there was an error processing your request."
        );
    }

    #[test]
    fn reply_for_unavailable() {
        assert_eq!(
            reply_text(RegistrationOutcome::Unavailable, "Ada"),
            "Sorry, the server is currently unavailable. Please try again later."
        );
    }

    #[test]
    fn duplicate_body_detection() {
        let dup = serde_json::json!({
            "telegram_id": ["This field must be unique."]
        });
        assert!(is_duplicate_body(&dup));

        let dup_alt = serde_json::json!({
            "telegram_id": ["telegram user with this telegram id already exists."]
        });
        assert!(is_duplicate_body(&dup_alt));

        let validation = serde_json::json!({
            "first_name": ["This field may not be blank."]
        });
        assert!(!is_duplicate_body(&validation));

        let other_telegram_id_error = serde_json::json!({
            "telegram_id": ["This field is required."]
        });
        assert!(!is_duplicate_body(&other_telegram_id_error));

        assert!(!is_duplicate_body(&serde_json::json!({})));
    }

    #[tokio::test]
    async fn connection_refused_maps_to_unavailable() {
        // Port 1 is never listening; the call must resolve, not panic.
        let client = RegistrationClient::new(
            "http://127.0.0.1:1/create-telegram-user/".into(),
            SecretString::from("S"),
            Duration::from_millis(500),
        )
        .unwrap();

        let outcome = client.register(&ada()).await;
        assert_eq!(outcome, RegistrationOutcome::Unavailable);

        let reply = client.on_start(&ada()).await;
        assert_eq!(
            reply,
            "Sorry, the server is currently unavailable. Please try again later."
        );
    }
}
