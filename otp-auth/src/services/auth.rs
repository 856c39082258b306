// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Authentication service: registration, password check with emailed one-time
//! passcode, and session management.

use crate::models::auth::{AuthUser, User};
use crate::services::auth_db::{CreateChallengeParams, CreateSessionParams, UserStore};
use crate::services::auth_error::AuthError;
use crate::services::email::OtpMailer;
use crate::services::logging::anonymize_email;
use anyhow::{anyhow, Context, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use std::env;
use uuid::Uuid;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Upper bound for `SESSION_MAX_AGE_DAYS`.
pub const MAX_SESSION_MAX_AGE_DAYS: u64 = 3650;
/// Upper bound for `OTP_EXPIRY_MINUTES`.
pub const MAX_OTP_EXPIRY_MINUTES: u64 = 24 * 60;
/// Upper bound for `OTP_MAX_ATTEMPTS`.
pub const MAX_OTP_ATTEMPTS: i32 = 100;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;
const MILLIS_PER_DAY: i64 = 24 * 60 * MILLIS_PER_MINUTE;

/// Configuration for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session lifetime in days
    pub session_max_age_days: u64,
    /// OTP expiry in minutes
    pub otp_expiry_minutes: u64,
    /// Wrong guesses allowed before the challenge is discarded
    pub otp_max_attempts: i32,
    /// Take the client address from `X-Forwarded-For`. Only safe behind a proxy
    /// that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_max_age_days: 30,
            otp_expiry_minutes: 10,
            otp_max_attempts: 5,
            trust_forwarded_for: false,
        }
    }
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    /// Unparseable values fall back to the default, out-of-range ones are clamped.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            session_max_age_days: env_clamped(
                "SESSION_MAX_AGE_DAYS",
                defaults.session_max_age_days,
                1,
                MAX_SESSION_MAX_AGE_DAYS,
            ),
            otp_expiry_minutes: env_clamped(
                "OTP_EXPIRY_MINUTES",
                defaults.otp_expiry_minutes,
                1,
                MAX_OTP_EXPIRY_MINUTES,
            ),
            otp_max_attempts: env_clamped(
                "OTP_MAX_ATTEMPTS",
                defaults.otp_max_attempts,
                1,
                MAX_OTP_ATTEMPTS,
            ),
            trust_forwarded_for: env::var("TRUST_FORWARDED_FOR")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.trust_forwarded_for),
        }
    }

    /// Passcode lifetime in milliseconds. Saturates instead of overflowing.
    pub fn otp_lifetime_millis(&self) -> i64 {
        i64::try_from(self.otp_expiry_minutes)
            .unwrap_or(i64::MAX)
            .saturating_mul(MILLIS_PER_MINUTE)
    }

    /// Session lifetime in milliseconds. Saturates instead of overflowing.
    pub fn session_lifetime_millis(&self) -> i64 {
        i64::try_from(self.session_max_age_days)
            .unwrap_or(i64::MAX)
            .saturating_mul(MILLIS_PER_DAY)
    }
}

fn env_clamped<T>(key: &str, default: T, min: T, max: T) -> T
where
    T: std::str::FromStr + Ord + Copy + std::fmt::Display,
{
    let Some(value) = env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok()) else {
        return default;
    };
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(key, %value, %clamped, "Config value out of range, clamped");
    }
    clamped
}

/// A session created by a successful passcode verification.
#[derive(Debug)]
pub struct IssuedSession {
    /// Raw token for the client. Only its hash is stored.
    pub token: String,
    pub user: User,
    pub expires_at: i64,
}

/// Authentication service.
pub struct AuthService<S, M> {
    store: S,
    mailer: M,
    config: AuthConfig,
}

impl<S: UserStore, M: OtpMailer> AuthService<S, M> {
    /// Create a new auth service.
    pub fn new(store: S, mailer: M, config: AuthConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ========== Token Generation ==========

    /// Generate a secure random token.
    /// Returns (raw_token, hash) - raw_token is sent to user, hash is stored in DB.
    pub fn generate_token() -> (String, String) {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw_token = hex::encode(bytes);
        let hash = Self::hash_token(&raw_token);
        (raw_token, hash)
    }

    /// Hash a token for storage.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate a uniformly random 6-digit passcode, zero padded.
    pub fn generate_otp() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
    }

    // ========== Registration ==========

    /// Create an account. The email stays unverified until the first passcode is accepted.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min_len: MIN_PASSWORD_LEN,
            });
        }

        let password_hash = hash_password(password).await?;

        let user = self
            .store
            .create_user(&email, &password_hash)
            .await
            .context("Failed to create user")?
            .ok_or(AuthError::EmailTaken)?;

        tracing::info!(
            user_id = %user.user_id,
            email = %anonymize_email(&user.email),
            "New user registered"
        );

        Ok(user)
    }

    // ========== Login ==========

    /// Check credentials and email a fresh passcode, replacing any pending one.
    /// Returns the passcode lifetime in seconds.
    pub async fn login(&self, email: &str, password: &str) -> Result<u64, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(user) = self
            .store
            .get_user_by_email(&email)
            .await
            .context("Failed to get user")?
        else {
            // Spend comparable time so unknown emails are not distinguishable
            let _ = hash_password(password).await;
            tracing::info!(email = %anonymize_email(&email), "Login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash).await? {
            tracing::info!(user_id = %user.user_id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let code = Self::generate_otp();
        let expiry_minutes = self.config.otp_expiry_minutes;
        let expires_at = chrono::Utc::now()
            .timestamp_millis()
            .saturating_add(self.config.otp_lifetime_millis());

        self.store
            .replace_otp_challenge(&CreateChallengeParams {
                user_id: user.user_id,
                code_hash: &Self::hash_token(&code),
                expires_at,
            })
            .await
            .context("Failed to create OTP challenge")?;

        self.mailer
            .send_otp(&user.email, &code, expiry_minutes)
            .await
            .context("Failed to send OTP email")?;

        tracing::info!(
            user_id = %user.user_id,
            email = %anonymize_email(&user.email),
            "Passcode issued"
        );

        Ok(expiry_minutes.saturating_mul(60))
    }

    // ========== Passcode Verification ==========

    /// Verify a passcode and create a session.
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .store
            .get_user_by_email(&email)
            .await
            .context("Failed to get user")?
            .ok_or(AuthError::InvalidCredentials)?;

        let challenge = self
            .store
            .get_otp_challenge(user.user_id)
            .await
            .context("Failed to get OTP challenge")?
            .ok_or(AuthError::NoPendingChallenge)?;

        if challenge.is_expired() {
            self.store
                .delete_otp_challenge(user.user_id)
                .await
                .context("Failed to delete expired OTP challenge")?;
            tracing::info!(user_id = %user.user_id, "Passcode verification failed: expired");
            return Err(AuthError::OtpExpired);
        }

        let code_hash = Self::hash_token(code.trim());
        if code_hash != challenge.code_hash {
            return Err(self.reject_wrong_code(user.user_id).await?);
        }

        // Compare-and-delete so the same code can't open two sessions
        let consumed = self
            .store
            .consume_otp_challenge(user.user_id, &code_hash)
            .await
            .context("Failed to consume OTP challenge")?;
        if !consumed {
            return Err(AuthError::NoPendingChallenge);
        }

        if !user.email_verified {
            self.store
                .set_user_email_verified(user.user_id)
                .await
                .context("Failed to verify email")?;
        }
        self.store
            .update_user_last_login(user.user_id)
            .await
            .context("Failed to update last login")?;

        let (token, expires_at) = self
            .create_user_session(user.user_id, user_agent, ip_address)
            .await?;

        let user = self
            .store
            .get_user_by_id(user.user_id)
            .await
            .context("Failed to get updated user")?
            .ok_or_else(|| anyhow!("User disappeared"))?;

        tracing::info!(
            user_id = %user.user_id,
            email = %anonymize_email(&user.email),
            ip = ip_address.unwrap_or("-"),
            "User signed in"
        );

        Ok(IssuedSession {
            token,
            user,
            expires_at,
        })
    }

    /// Count a wrong guess and pick the error to return.
    async fn reject_wrong_code(&self, user_id: Uuid) -> Result<AuthError> {
        let attempts = self
            .store
            .record_failed_otp_attempt(user_id)
            .await
            .context("Failed to record OTP attempt")?;

        let Some(attempts) = attempts else {
            return Ok(AuthError::NoPendingChallenge);
        };

        if attempts >= self.config.otp_max_attempts {
            self.store
                .delete_otp_challenge(user_id)
                .await
                .context("Failed to discard OTP challenge")?;
            tracing::warn!(%user_id, attempts, "Passcode discarded after too many attempts");
            return Ok(AuthError::TooManyAttempts);
        }

        tracing::info!(%user_id, attempts, "Passcode verification failed: wrong code");
        Ok(AuthError::InvalidOtp)
    }

    /// Create a session for a user and return the session token with its expiry.
    async fn create_user_session(
        &self,
        user_id: Uuid,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<(String, i64)> {
        let (session_token, session_hash) = Self::generate_token();
        let expires_at = chrono::Utc::now()
            .timestamp_millis()
            .saturating_add(self.config.session_lifetime_millis());

        self.store
            .create_session(&CreateSessionParams {
                session_id_hash: &session_hash,
                user_id,
                expires_at,
                user_agent,
                ip_address,
            })
            .await
            .context("Failed to create session")?;

        Ok((session_token, expires_at))
    }

    // ========== Session Management ==========

    /// Validate a session and return the authenticated user context.
    pub async fn validate_session(&self, session_token: &str) -> Result<Option<AuthUser>> {
        let session_hash = Self::hash_token(session_token);

        let Some(session) = self
            .store
            .get_session(&session_hash)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.store
                .delete_session(&session_hash)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let Some(user) = self
            .store
            .get_user_by_id(session.user_id)
            .await
            .context("Failed to get user")?
        else {
            return Ok(None);
        };

        // Last-active is advisory
        if let Err(e) = self.store.touch_session(&session_hash).await {
            tracing::debug!(error = %e, "Failed to touch session");
        }

        Ok(Some(AuthUser {
            user_id: user.user_id,
            email: user.email,
        }))
    }

    /// Sign out - invalidate session.
    pub async fn sign_out(&self, session_token: &str) -> Result<()> {
        let session_hash = Self::hash_token(session_token);
        self.store
            .delete_session(&session_hash)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }
}

/// Trim and lowercase an email, rejecting obviously malformed addresses.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };

    let domain_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
    if local.is_empty() || !domain_ok || domain.contains('@') || email.contains(char::is_whitespace)
    {
        return Err(AuthError::InvalidEmail);
    }

    Ok(email)
}

/// Hash a password with Argon2id and a random salt, off the async runtime.
async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(|e| anyhow!("Failed to encode salt: {e}"))?;

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Failed to hash password: {e}"))
    })
    .await
    .context("Password hashing task failed")?
}

/// Check a password against a stored PHC string, off the async runtime.
async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow!("Stored password hash is malformed: {e}"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .context("Password verification task failed")?
}
