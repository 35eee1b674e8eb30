//! Error types for regbridge.

use std::collections::BTreeMap;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Bot error: {0}")]
    Bot(#[from] BotError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Registration gateway errors.
///
/// `Unauthorized` and `Validation` surface directly as structured HTTP
/// responses. Storage errors on the create path are classified into
/// `Conflict` (unique-constraint hit) or an opaque `Internal`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation failed")]
    Validation {
        /// Per-field error messages, keyed by field name.
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("telegram_id {0} already registered")]
    Conflict(i64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Bot-side errors (Telegram transport and registration client).
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to send Telegram reply: {0}")]
    SendFailed(String),

    #[error("Invalid Telegram update: {0}")]
    InvalidUpdate(String),
}

/// Event-bus and task-queue errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to enqueue notification task: {0}")]
    Enqueue(String),

    #[error("Task queue is closed")]
    QueueClosed,
}

/// Outcome classification for a single notification send attempt.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Retryable failure — the queue's backoff policy decides what happens next.
    #[error("Transient send failure: {0}")]
    Transient(String),

    /// Permanent failure — logged and dropped, never retried.
    #[error("Fatal send failure: {0}")]
    Fatal(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
