// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Database operations for authentication.
//!
//! `UserStore` is the persistence seam used by the auth service. `PgUserStore`
//! is the PostgreSQL implementation; see `memory_store` for the in-process one.

use crate::models::auth::{OtpChallenge, Session, User};
use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use uuid::Uuid;

/// Parameters for creating a session.
pub struct CreateSessionParams<'a> {
    pub session_id_hash: &'a str,
    pub user_id: Uuid,
    pub expires_at: i64,
    pub user_agent: Option<&'a str>,
    pub ip_address: Option<&'a str>,
}

/// Parameters for issuing an OTP challenge.
pub struct CreateChallengeParams<'a> {
    pub user_id: Uuid,
    pub code_hash: &'a str,
    pub expires_at: i64,
}

/// Storage for users, OTP challenges and sessions.
pub trait UserStore: Send + Sync + 'static {
    /// Get a user by (normalized) email.
    fn get_user_by_email(&self, email: &str)
        -> impl Future<Output = Result<Option<User>>> + Send;

    /// Get a user by ID.
    fn get_user_by_id(&self, user_id: Uuid) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Create a user. Returns `None` when the email is already registered.
    fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Update user's last login time.
    fn update_user_last_login(&self, user_id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// Mark user's email as verified.
    fn set_user_email_verified(&self, user_id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// Store a challenge, replacing any previous one for the same user.
    fn replace_otp_challenge(
        &self,
        params: &CreateChallengeParams<'_>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Get the live challenge for a user.
    fn get_otp_challenge(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<OtpChallenge>>> + Send;

    /// Count a wrong guess. Returns the new attempt count, `None` if no challenge exists.
    fn record_failed_otp_attempt(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<i32>>> + Send;

    /// Delete the challenge only if it still carries `code_hash`.
    /// Returns whether this call removed it.
    fn consume_otp_challenge(
        &self,
        user_id: Uuid,
        code_hash: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Delete the challenge for a user, if any.
    fn delete_otp_challenge(&self, user_id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// Create a new session and drop any that have expired.
    fn create_session(
        &self,
        params: &CreateSessionParams<'_>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Get a session by its hash.
    fn get_session(
        &self,
        session_id_hash: &str,
    ) -> impl Future<Output = Result<Option<Session>>> + Send;

    /// Delete a session.
    fn delete_session(&self, session_id_hash: &str) -> impl Future<Output = Result<()>> + Send;

    /// Update session's last active time.
    fn touch_session(&self, session_id_hash: &str) -> impl Future<Output = Result<()>> + Send;
}

type UserRow = (Uuid, String, String, bool, i64, i64, Option<i64>);
type SessionRow = (String, Uuid, i64, i64, i64, Option<String>, Option<String>);

const USER_COLUMNS: &str =
    "user_id, email, password_hash, email_verified, created_at, updated_at, last_login_at";

fn user_from_row(row: UserRow) -> User {
    let (user_id, email, password_hash, email_verified, created_at, updated_at, last_login_at) =
        row;
    User {
        user_id,
        email,
        password_hash,
        email_verified,
        created_at,
        updated_at,
        last_login_at,
    }
}

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

impl UserStore for PgUserStore {
    // ========== User Operations ==========

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user by email")?;
        Ok(row.map(user_from_row))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user by id")?;
        Ok(row.map(user_from_row))
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<Option<User>> {
        let now = chrono::Utc::now().timestamp_millis();
        let query = format!(
            "INSERT INTO users (user_id, email, password_hash, email_verified, created_at, updated_at)
             VALUES ($1, $2, $3, false, $4, $4)
             ON CONFLICT (email) DO NOTHING
             RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(Uuid::now_v7())
            .bind(email)
            .bind(password_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to insert user")?;
        Ok(row.map(user_from_row))
    }

    async fn update_user_last_login(&self, user_id: Uuid) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE user_id = $2")
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    async fn set_user_email_verified(&self, user_id: Uuid) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "UPDATE users SET email_verified = true, updated_at = $1
             WHERE user_id = $2 AND email_verified = false",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark email verified")?;
        Ok(())
    }

    // ========== OTP Challenge Operations ==========

    async fn replace_otp_challenge(&self, params: &CreateChallengeParams<'_>) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO otp_challenges (user_id, code_hash, created_at, expires_at, attempts)
             VALUES ($1, $2, $3, $4, 0)
             ON CONFLICT (user_id) DO UPDATE
             SET code_hash = EXCLUDED.code_hash,
                 created_at = EXCLUDED.created_at,
                 expires_at = EXCLUDED.expires_at,
                 attempts = 0",
        )
        .bind(params.user_id)
        .bind(params.code_hash)
        .bind(now)
        .bind(params.expires_at)
        .execute(&self.pool)
        .await
        .context("Failed to store OTP challenge")?;
        Ok(())
    }

    async fn get_otp_challenge(&self, user_id: Uuid) -> Result<Option<OtpChallenge>> {
        let row = sqlx::query_as::<_, (Uuid, String, i64, i64, i32)>(
            "SELECT user_id, code_hash, created_at, expires_at, attempts
             FROM otp_challenges WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query OTP challenge")?;

        Ok(
            row.map(|(user_id, code_hash, created_at, expires_at, attempts)| OtpChallenge {
                user_id,
                code_hash,
                created_at,
                expires_at,
                attempts,
            }),
        )
    }

    async fn record_failed_otp_attempt(&self, user_id: Uuid) -> Result<Option<i32>> {
        let attempts = sqlx::query_scalar::<_, i32>(
            "UPDATE otp_challenges SET attempts = attempts + 1
             WHERE user_id = $1 RETURNING attempts",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to record OTP attempt")?;
        Ok(attempts)
    }

    async fn consume_otp_challenge(&self, user_id: Uuid, code_hash: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM otp_challenges WHERE user_id = $1 AND code_hash = $2")
                .bind(user_id)
                .bind(code_hash)
                .execute(&self.pool)
                .await
                .context("Failed to consume OTP challenge")?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_otp_challenge(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM otp_challenges WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete OTP challenge")?;
        Ok(())
    }

    // ========== Session Operations ==========

    async fn create_session(&self, params: &CreateSessionParams<'_>) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO sessions
             (session_id, user_id, created_at, expires_at, last_active_at, user_agent, ip_address)
             VALUES ($1, $2, $3, $4, $3, $5, $6)",
        )
        .bind(params.session_id_hash)
        .bind(params.user_id)
        .bind(now)
        .bind(params.expires_at)
        .bind(params.user_agent)
        .bind(params.ip_address)
        .execute(&self.pool)
        .await
        .context("Failed to insert session")?;

        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to purge expired sessions")?
            .rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired sessions");
        }
        Ok(())
    }

    async fn get_session(&self, session_id_hash: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, user_id, created_at, expires_at, last_active_at, user_agent, ip_address
             FROM sessions WHERE session_id = $1",
        )
        .bind(session_id_hash)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query session")?;

        Ok(row.map(
            |(session_id, user_id, created_at, expires_at, last_active_at, user_agent, ip_address)| {
                Session {
                    session_id,
                    user_id,
                    created_at,
                    expires_at,
                    last_active_at,
                    user_agent,
                    ip_address,
                }
            },
        ))
    }

    async fn delete_session(&self, session_id_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id_hash)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn touch_session(&self, session_id_hash: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query("UPDATE sessions SET last_active_at = $1 WHERE session_id = $2")
            .bind(now)
            .bind(session_id_hash)
            .execute(&self.pool)
            .await
            .context("Failed to touch session")?;
        Ok(())
    }
}
