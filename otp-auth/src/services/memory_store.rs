// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! In-process `UserStore` for local development and tests.
//!
//! Everything lives behind a single lock so that the compound operations
//! (insert-if-absent, compare-and-delete) stay atomic like their SQL
//! counterparts. Data is lost on restart.

use crate::models::auth::{OtpChallenge, Session, User};
use crate::services::auth_db::{CreateChallengeParams, CreateSessionParams, UserStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    user_ids_by_email: HashMap<String, Uuid>,
    challenges: HashMap<Uuid, OtpChallenge>,
    sessions: HashMap<String, Session>,
}

/// Memory-backed user store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions. Test helper.
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    /// Overwrite a challenge's expiry. Test helper.
    pub async fn set_challenge_expiry(&self, user_id: Uuid, expires_at: i64) {
        if let Some(challenge) = self.tables.write().await.challenges.get_mut(&user_id) {
            challenge.expires_at = expires_at;
        }
    }

    /// Overwrite a session's expiry. Test helper.
    pub async fn set_session_expiry(&self, session_id_hash: &str, expires_at: i64) {
        if let Some(session) = self.tables.write().await.sessions.get_mut(session_id_hash) {
            session.expires_at = expires_at;
        }
    }
}

impl UserStore for MemoryUserStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_ids_by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        if tables.user_ids_by_email.contains_key(email) {
            return Ok(None);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let user = User {
            user_id: Uuid::now_v7(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            email_verified: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        tables
            .user_ids_by_email
            .insert(user.email.clone(), user.user_id);
        tables.users.insert(user.user_id, user.clone());
        Ok(Some(user))
    }

    async fn update_user_last_login(&self, user_id: Uuid) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        if let Some(user) = self.tables.write().await.users.get_mut(&user_id) {
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn set_user_email_verified(&self, user_id: Uuid) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        if let Some(user) = self.tables.write().await.users.get_mut(&user_id) {
            if !user.email_verified {
                user.email_verified = true;
                user.updated_at = now;
            }
        }
        Ok(())
    }

    async fn replace_otp_challenge(&self, params: &CreateChallengeParams<'_>) -> Result<()> {
        let challenge = OtpChallenge {
            user_id: params.user_id,
            code_hash: params.code_hash.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            expires_at: params.expires_at,
            attempts: 0,
        };
        self.tables
            .write()
            .await
            .challenges
            .insert(params.user_id, challenge);
        Ok(())
    }

    async fn get_otp_challenge(&self, user_id: Uuid) -> Result<Option<OtpChallenge>> {
        Ok(self.tables.read().await.challenges.get(&user_id).cloned())
    }

    async fn record_failed_otp_attempt(&self, user_id: Uuid) -> Result<Option<i32>> {
        let mut tables = self.tables.write().await;
        Ok(tables.challenges.get_mut(&user_id).map(|challenge| {
            challenge.attempts += 1;
            challenge.attempts
        }))
    }

    async fn consume_otp_challenge(&self, user_id: Uuid, code_hash: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let matches = tables
            .challenges
            .get(&user_id)
            .is_some_and(|challenge| challenge.code_hash == code_hash);
        if matches {
            tables.challenges.remove(&user_id);
        }
        Ok(matches)
    }

    async fn delete_otp_challenge(&self, user_id: Uuid) -> Result<()> {
        self.tables.write().await.challenges.remove(&user_id);
        Ok(())
    }

    async fn create_session(&self, params: &CreateSessionParams<'_>) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let session = Session {
            session_id: params.session_id_hash.to_string(),
            user_id: params.user_id,
            created_at: now,
            expires_at: params.expires_at,
            last_active_at: now,
            user_agent: params.user_agent.map(str::to_string),
            ip_address: params.ip_address.map(str::to_string),
        };
        let mut tables = self.tables.write().await;
        tables.sessions.retain(|_, s| s.expires_at >= now);
        tables.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, session_id_hash: &str) -> Result<Option<Session>> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .get(session_id_hash)
            .cloned())
    }

    async fn delete_session(&self, session_id_hash: &str) -> Result<()> {
        self.tables.write().await.sessions.remove(session_id_hash);
        Ok(())
    }

    async fn touch_session(&self, session_id_hash: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        if let Some(session) = self.tables.write().await.sessions.get_mut(session_id_hash) {
            session.last_active_at = now;
        }
        Ok(())
    }
}
