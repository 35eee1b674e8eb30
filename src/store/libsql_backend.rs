//! libSQL backend — async `IdentityStore` implementation.
//!
//! Supports local file and in-memory databases. The create-or-fetch path
//! relies on the `telegram_id` unique constraint (`INSERT .. ON CONFLICT
//! DO NOTHING` + re-select), so racing registrations for one id converge
//! to a single row.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase};
use tracing::info;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{IdentityStore, NewTelegramUser, TelegramUser};

/// libSQL identity store backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map a libsql Row to a TelegramUser.
///
/// Column order: 0:id, 1:telegram_id, 2:username, 3:first_name, 4:created_at
fn row_to_user(row: &libsql::Row) -> Result<TelegramUser, libsql::Error> {
    let id: i64 = row.get(0)?;
    let telegram_id: i64 = row.get(1)?;
    let username: Option<String> = row.get::<String>(2).ok();
    let first_name: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    Ok(TelegramUser {
        id,
        telegram_id,
        username,
        first_name,
        created_at: parse_datetime(&created_str),
    })
}

/// Classify a libsql error on the write path.
fn classify_write_error(e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE") || msg.contains("unique") {
        DatabaseError::Constraint(msg)
    } else {
        DatabaseError::Query(msg)
    }
}

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, created_at";

#[async_trait]
impl IdentityStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn create_or_fetch(
        &self,
        new: &NewTelegramUser,
    ) -> Result<(TelegramUser, bool), DatabaseError> {
        let created_at = Utc::now().to_rfc3339();
        let username = match &new.username {
            Some(username) => libsql::Value::from(username.clone()),
            None => libsql::Value::Null,
        };

        // Unique-constraint-enforced insert: no rows changed means the
        // identity already existed and created_at stays untouched.
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO telegram_users (telegram_id, username, first_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(telegram_id) DO NOTHING",
                libsql::params![
                    new.telegram_id,
                    username,
                    new.first_name.clone(),
                    created_at
                ],
            )
            .await
            .map_err(classify_write_error)?;

        let user = self
            .get_by_telegram_id(new.telegram_id)
            .await?
            .ok_or_else(|| {
                DatabaseError::Query(format!(
                    "telegram_id {} missing after upsert",
                    new.telegram_id
                ))
            })?;

        Ok((user, inserted > 0))
    }

    async fn get_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<TelegramUser>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM telegram_users WHERE telegram_id = ?1"),
                libsql::params![telegram_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query telegram user: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read telegram user: {e}")))?;

        match row {
            Some(row) => {
                let user = row_to_user(&row).map_err(|e| {
                    DatabaseError::Query(format!("Failed to map telegram user row: {e}"))
                })?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM telegram_users", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count telegram users: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read count: {e}")))?;

        match row {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse count: {e}"))),
            None => Ok(0),
        }
    }
}
