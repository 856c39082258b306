// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use otp_auth::services::auth_db::{
    CreateChallengeParams, CreateSessionParams, PgUserStore, UserStore,
};
use uuid::Uuid;

// Integration tests for the PostgreSQL store
// These tests require a running PostgreSQL instance
// Run with: DATABASE_URL=postgres://... cargo test --test pg_store_integration_test -- --ignored

async fn connect() -> PgUserStore {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for PostgreSQL tests");
    let store = PgUserStore::connect(&database_url, 2)
        .await
        .expect("Failed to connect to PostgreSQL");
    store.migrate().await.expect("Failed to run migrations");
    store
}

fn unique_email() -> String {
    format!("pg-test-{}@example.com", Uuid::now_v7())
}

#[tokio::test]
#[ignore]
async fn test_create_user_and_reject_duplicate() {
    let store = connect().await;
    let email = unique_email();

    let user = store
        .create_user(&email, "$argon2id$stub")
        .await
        .unwrap()
        .expect("first insert should succeed");
    assert_eq!(user.email, email);
    assert!(!user.email_verified);

    let duplicate = store.create_user(&email, "$argon2id$other").await.unwrap();
    assert!(duplicate.is_none());

    store.set_user_email_verified(user.user_id).await.unwrap();
    store.update_user_last_login(user.user_id).await.unwrap();
    let reloaded = store.get_user_by_id(user.user_id).await.unwrap().unwrap();
    assert!(reloaded.email_verified);
    assert!(reloaded.last_login_at.is_some());
}

#[tokio::test]
#[ignore]
async fn test_challenge_lifecycle() {
    let store = connect().await;
    let user = store
        .create_user(&unique_email(), "$argon2id$stub")
        .await
        .unwrap()
        .unwrap();
    let expires_at = chrono::Utc::now().timestamp_millis() + 600_000;

    store
        .replace_otp_challenge(&CreateChallengeParams {
            user_id: user.user_id,
            code_hash: "first",
            expires_at,
        })
        .await
        .unwrap();
    assert_eq!(
        store.record_failed_otp_attempt(user.user_id).await.unwrap(),
        Some(1)
    );

    store
        .replace_otp_challenge(&CreateChallengeParams {
            user_id: user.user_id,
            code_hash: "second",
            expires_at,
        })
        .await
        .unwrap();
    let challenge = store
        .get_otp_challenge(user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(challenge.code_hash, "second");
    assert_eq!(challenge.attempts, 0);

    assert!(!store
        .consume_otp_challenge(user.user_id, "first")
        .await
        .unwrap());
    assert!(store
        .consume_otp_challenge(user.user_id, "second")
        .await
        .unwrap());
    assert!(store
        .get_otp_challenge(user.user_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore]
async fn test_session_lifecycle() {
    let store = connect().await;
    let user = store
        .create_user(&unique_email(), "$argon2id$stub")
        .await
        .unwrap()
        .unwrap();
    let session_id = format!("hash-{}", Uuid::now_v7());

    store
        .create_session(&CreateSessionParams {
            session_id_hash: &session_id,
            user_id: user.user_id,
            expires_at: chrono::Utc::now().timestamp_millis() + 3_600_000,
            user_agent: Some("pg-test"),
            ip_address: None,
        })
        .await
        .unwrap();

    let session = store.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.user_id, user.user_id);
    assert_eq!(session.user_agent.as_deref(), Some("pg-test"));
    assert!(!session.is_expired());

    store.touch_session(&session_id).await.unwrap();
    store.delete_session(&session_id).await.unwrap();
    assert!(store.get_session(&session_id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_create_session_purges_expired() {
    let store = connect().await;
    let user = store
        .create_user(&unique_email(), "$argon2id$stub")
        .await
        .unwrap()
        .unwrap();
    let stale = format!("stale-{}", Uuid::now_v7());
    let fresh = format!("fresh-{}", Uuid::now_v7());

    store
        .create_session(&CreateSessionParams {
            session_id_hash: &stale,
            user_id: user.user_id,
            expires_at: 0,
            user_agent: None,
            ip_address: None,
        })
        .await
        .unwrap();
    store
        .create_session(&CreateSessionParams {
            session_id_hash: &fresh,
            user_id: user.user_id,
            expires_at: chrono::Utc::now().timestamp_millis() + 3_600_000,
            user_agent: None,
            ip_address: None,
        })
        .await
        .unwrap();

    assert!(store.get_session(&stale).await.unwrap().is_none());
    assert!(store.get_session(&fresh).await.unwrap().is_some());
}
