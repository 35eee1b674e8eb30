//! Registration service — secret check, validation, idempotent upsert.

use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::error::{DatabaseError, GatewayError};
use crate::store::{IdentityStore, NewTelegramUser, TelegramUser};

/// A registration attempt as received from the wire.
///
/// Fields are optional so that absence is a validation error, not a
/// deserialization failure.
#[derive(Debug, Clone, Default)]
pub struct RegisterRequest {
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

/// Boundary between the untrusted bot process and the identity store.
pub struct RegistrationService {
    store: Arc<dyn IdentityStore>,
    secret: SecretString,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn IdentityStore>, secret: SecretString) -> Self {
        Self { store, secret }
    }

    /// Idempotent create-or-fetch, gated by the shared secret.
    ///
    /// The secret is checked before validation and before any storage
    /// access, so an unauthorized caller learns nothing about whether the
    /// identity exists. Returns the stored row and whether this call
    /// created it.
    pub async fn register(
        &self,
        secret: Option<&str>,
        request: &RegisterRequest,
    ) -> Result<(TelegramUser, bool), GatewayError> {
        match secret {
            Some(s) if s == self.secret.expose_secret() => {}
            _ => {
                warn!("Registration rejected: bad or missing X-Bot-Secret");
                return Err(GatewayError::Unauthorized);
            }
        }

        let new = validate(request)?;

        let (user, created) = self.store.create_or_fetch(&new).await.map_err(|e| {
            classify_storage_error(e, new.telegram_id)
        })?;

        if created {
            info!(
                telegram_id = user.telegram_id,
                username = user.username.as_deref().unwrap_or("-"),
                "Telegram user registered"
            );
        }

        Ok((user, created))
    }
}

/// Validate a registration request into storable fields.
///
/// Error messages follow the upstream API's field-error wording, which
/// the bot client is allowed to display verbatim.
fn validate(request: &RegisterRequest) -> Result<NewTelegramUser, GatewayError> {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();

    if request.telegram_id.is_none() {
        fields
            .entry("telegram_id".into())
            .or_default()
            .push("This field is required.".into());
    }

    match request.first_name.as_deref().map(str::trim) {
        None => {
            fields
                .entry("first_name".into())
                .or_default()
                .push("This field is required.".into());
        }
        Some("") => {
            fields
                .entry("first_name".into())
                .or_default()
                .push("This field may not be blank.".into());
        }
        Some(_) => {}
    }

    if !fields.is_empty() {
        return Err(GatewayError::Validation { fields });
    }

    Ok(NewTelegramUser {
        // Both unwraps guarded by the checks above
        telegram_id: request.telegram_id.unwrap_or_default(),
        username: request.username.clone(),
        first_name: request.first_name.clone().unwrap_or_default(),
    })
}

/// Shape a storage error for the caller.
///
/// A unique-constraint hit is the idempotency race losing side and maps
/// to `Conflict`; everything else is opaque.
fn classify_storage_error(e: DatabaseError, telegram_id: i64) -> GatewayError {
    match e {
        DatabaseError::Constraint(_) => GatewayError::Conflict(telegram_id),
        other => {
            tracing::error!(error = %other, "Storage failure on registration path");
            GatewayError::Internal("storage failure".into())
        }
    }
}
