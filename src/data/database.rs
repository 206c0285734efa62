//! SQLite database operations
//!
//! All database access goes through this module.
//! Uniqueness of identity emails and handles is enforced by the schema,
//! so inserts report which constraint fired instead of pre-checking.

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use super::models::*;
use crate::error::AppError;

const TOKEN_HASH_PREFIX: &str = "sha256:";

/// Digest used as the storage key for session tokens and OAuth nonces.
///
/// Raw tokens never touch the database.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", TOKEN_HASH_PREFIX, URL_SAFE_NO_PAD.encode(digest))
}

fn classify_unique_violation(error: &sqlx::Error) -> Option<UniqueField> {
    let db_error = error.as_database_error()?;
    if !db_error.is_unique_violation() {
        return None;
    }

    // SQLite reports "UNIQUE constraint failed: identities.<column>"
    let message = db_error.message();
    if message.contains("identities.handle") {
        Some(UniqueField::Handle)
    } else if message.contains("identities.email") {
        Some(UniqueField::Email)
    } else {
        None
    }
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    // =========================================================================
    // Identities
    // =========================================================================

    pub async fn find_identity_by_handle(&self, handle: &str) -> Result<Option<Identity>, AppError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, handle, signup_time, signup_ip, signup_agent
            FROM identities WHERE handle = ?
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    pub async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, handle, signup_time, signup_ip, signup_agent
            FROM identities WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    pub async fn identity_exists(&self, id: &str) -> Result<bool, AppError> {
        let exists =
            sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM identities WHERE id = ?)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists != 0)
    }

    /// Insert a new identity in a single statement.
    ///
    /// A UNIQUE violation on `email` or `handle` is an expected outcome and
    /// is reported as [`InsertOutcome::Duplicate`]; no row is written.
    pub async fn insert_identity(&self, identity: &NewIdentity) -> Result<InsertOutcome, AppError> {
        let portfolio = serde_json::to_string(&identity.portfolio)
            .map_err(|e| AppError::Internal(e.into()))?;
        let now = identity.provenance.at;

        let result = sqlx::query(
            r#"
            INSERT INTO identities (
                id, email, handle, signup_time, signup_ip, signup_agent, portfolio, last_saved
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.id.0)
        .bind(&identity.email)
        .bind(&identity.handle)
        .bind(now)
        .bind(&identity.provenance.remote_addr)
        .bind(&identity.provenance.user_agent)
        .bind(portfolio)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(error) => match classify_unique_violation(&error) {
                Some(field) => Ok(InsertOutcome::Duplicate(field)),
                None => Err(error.into()),
            },
        }
    }

    /// Remove an identity. Sessions pointing at it are left dangling and
    /// heal on their next lookup.
    pub async fn delete_identity(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_identities(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Portfolios
    // =========================================================================

    pub async fn get_portfolio_by_handle(&self, handle: &str) -> Result<Option<Portfolio>, AppError> {
        let raw =
            sqlx::query_scalar::<_, String>("SELECT portfolio FROM identities WHERE handle = ?")
                .bind(handle)
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|raw| parse_portfolio(&raw)).transpose()
    }

    pub async fn get_portfolio_by_id(&self, id: &str) -> Result<Option<Portfolio>, AppError> {
        let raw = sqlx::query_scalar::<_, String>("SELECT portfolio FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        raw.map(|raw| parse_portfolio(&raw)).transpose()
    }

    /// Overwrite the portfolio of an existing identity.
    ///
    /// # Returns
    /// `false` if no identity has this id.
    pub async fn save_portfolio(&self, id: &str, portfolio: &Portfolio) -> Result<bool, AppError> {
        let raw = serde_json::to_string(portfolio).map_err(|e| AppError::Internal(e.into()))?;

        let result = sqlx::query(
            r#"
            UPDATE identities
            SET portfolio = ?, last_saved = ?
            WHERE id = ?
            "#,
        )
        .bind(raw)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Fetch a session that has not yet expired at `now` (unix seconds).
    pub async fn get_session(
        &self,
        token_hash: &str,
        now: i64,
    ) -> Result<Option<SessionRecord>, AppError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT token_hash, identity_id, expires_at
            FROM sessions WHERE token_hash = ? AND expires_at > ?
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Swap a session row for a freshly keyed one.
    ///
    /// Deleting the old token and inserting the new row share a transaction,
    /// so no reader ever sees the old token carrying the new binding.
    pub async fn replace_session(
        &self,
        old_token_hash: Option<&str>,
        record: &SessionRecord,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        if let Some(old) = old_token_hash {
            sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
                .bind(old)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("INSERT INTO sessions (token_hash, identity_id, expires_at) VALUES (?, ?, ?)")
            .bind(&record.token_hash)
            .bind(&record.identity_id)
            .bind(record.expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Rewrite the binding of an existing session without changing its key.
    pub async fn update_session_identity(
        &self,
        token_hash: &str,
        identity_id: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET identity_id = ? WHERE token_hash = ?")
            .bind(identity_id)
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_expired_sessions(&self, now: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // OAuth correlation nonces
    // =========================================================================

    pub async fn insert_oauth_state(&self, nonce_hash: &str, expires_at: i64) -> Result<(), AppError> {
        sqlx::query("INSERT INTO oauth_states (nonce_hash, expires_at) VALUES (?, ?)")
            .bind(nonce_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Consume an outstanding nonce.
    ///
    /// # Returns
    /// `true` exactly once per issued, unexpired nonce.
    pub async fn consume_oauth_state(&self, nonce_hash: &str, now: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE nonce_hash = ? AND expires_at > ?")
            .bind(nonce_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn delete_expired_oauth_states(&self, now: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn parse_portfolio(raw: &str) -> Result<Portfolio, AppError> {
    serde_json::from_str(raw).map_err(|e| AppError::Internal(e.into()))
}
