//! `IdentityStore` trait — async interface for identity persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// A persisted Telegram-sourced identity.
///
/// `telegram_id` is the natural key. Rows are created once and never
/// updated or deleted by this subsystem; `created_at` is immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramUser {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new registration attempt.
#[derive(Debug, Clone)]
pub struct NewTelegramUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

/// Backend-agnostic identity store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Atomic create-or-fetch keyed by `telegram_id`.
    ///
    /// Returns the stored row and whether this call created it. Concurrent
    /// calls for the same `telegram_id` are serialized by the unique
    /// constraint: exactly one caller observes `true`, and only one row
    /// ever exists.
    async fn create_or_fetch(
        &self,
        new: &NewTelegramUser,
    ) -> Result<(TelegramUser, bool), DatabaseError>;

    /// Look up an identity by its `telegram_id`.
    async fn get_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<TelegramUser>, DatabaseError>;

    /// Total number of stored identities.
    async fn count(&self) -> Result<i64, DatabaseError>;
}
