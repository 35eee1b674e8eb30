//! Telegram transport — long-polls the Bot API for commands.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use super::client::{PlatformUser, RegistrationClient};
use crate::error::BotError;

/// Pause before re-polling after a transport or parse error.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram bot — connects to the Bot API via long-polling and answers
/// `/start` with the registration flow, echoing everything else.
pub struct TelegramBot {
    token: SecretString,
    client: reqwest::Client,
    registration: Arc<RegistrationClient>,
}

impl TelegramBot {
    pub fn new(token: SecretString, registration: Arc<RegistrationClient>) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
            registration,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.token.expose_secret()
        )
    }

    /// Long-poll loop. Runs until the process exits.
    pub async fn run(&self) {
        let mut offset: i64 = 0;

        info!("Telegram bot is running...");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message"]
            });

            let resp = match self
                .client
                .post(self.api_url("getUpdates"))
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!("Telegram poll error: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            let data: serde_json::Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Telegram parse error: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(message) = update.get("message") else {
                        continue;
                    };

                    self.handle_message(message).await;
                }
            }
        }
    }

    /// Dispatch a single inbound message.
    async fn handle_message(&self, message: &serde_json::Value) {
        let Some(text) = message.get("text").and_then(serde_json::Value::as_str) else {
            return;
        };

        let Some(user) = parse_platform_user(message) else {
            warn!("Telegram message without a usable sender; skipping");
            return;
        };

        let Some(chat_id) = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(serde_json::Value::as_i64)
        else {
            warn!("Telegram message without chat id; skipping");
            return;
        };

        let reply = if is_start_command(text) {
            info!(
                username = user.username.as_deref().unwrap_or("unknown"),
                user_id = user.id,
                "Received /start command"
            );
            self.registration.on_start(&user).await
        } else {
            format!("You said: {text}")
        };

        if let Err(e) = self.send_message(chat_id, &reply).await {
            warn!(chat_id, error = %e, "Failed to send Telegram reply");
        }
    }

    /// Send a plain-text reply to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(BotError::SendFailed(format!(
                "sendMessage returned {status}: {err}"
            )));
        }

        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Extract the sender identity from a Telegram message object.
fn parse_platform_user(message: &serde_json::Value) -> Option<PlatformUser> {
    let from = message.get("from")?;
    let id = from.get("id").and_then(serde_json::Value::as_i64)?;

    let username = from
        .get("username")
        .and_then(serde_json::Value::as_str)
        .map(String::from);

    let first_name = from
        .get("first_name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("there")
        .to_string();

    Some(PlatformUser {
        id,
        username,
        first_name,
    })
}

/// Match `/start`, `/start@BotName`, and `/start args` — the same shapes
/// a Bot API command handler accepts.
fn is_start_command(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    first == "/start" || first.starts_with("/start@")
}
