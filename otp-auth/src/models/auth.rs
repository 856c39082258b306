// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Database Models
// ============================================================================

/// User record from the database.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub email_verified: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_login_at: Option<i64>,
}

/// Pending one-time passcode for a user. At most one exists per user.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub user_id: Uuid,
    pub code_hash: String, // SHA-256 hash
    pub created_at: i64,
    pub expires_at: i64,
    pub attempts: i32,
}

impl OtpChallenge {
    /// Check if the challenge has expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        self.expires_at < now
    }
}

/// Session record from the database.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String, // SHA-256 hash
    pub user_id: Uuid,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_active_at: i64,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        self.expires_at < now
    }
}

// ============================================================================
// API Request Types
// ============================================================================

/// Request to create an account.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    /// At least 8 characters
    pub password: String,
}

/// Request to check credentials and receive a one-time passcode.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request to exchange a one-time passcode for a session.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    /// The 6-digit code from the sign-in email
    pub otp: String,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Response after a successful registration.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
}

/// Response after credentials were accepted and a passcode was sent.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub expires_in_seconds: u64,
}

/// Response after a passcode was accepted - includes session info.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
    /// Raw session token, also set as the session cookie
    pub session_token: String,
    /// RFC 3339 timestamp
    pub expires_at: String,
}

/// Generic message response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Authenticated User Context
// ============================================================================

/// Authenticated user context resolved from a session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge_expiring_at(expires_at: i64) -> OtpChallenge {
        OtpChallenge {
            user_id: Uuid::now_v7(),
            code_hash: "test".to_string(),
            created_at: 0,
            expires_at,
            attempts: 0,
        }
    }

    #[test]
    fn test_session_expiry() {
        let expired_session = Session {
            session_id: "test".to_string(),
            user_id: Uuid::now_v7(),
            created_at: 0,
            expires_at: 0, // Expired at epoch
            last_active_at: 0,
            user_agent: None,
            ip_address: None,
        };
        assert!(expired_session.is_expired());

        let future_timestamp = chrono::Utc::now().timestamp_millis() + 3600000; // 1 hour from now
        let valid_session = Session {
            expires_at: future_timestamp,
            ..expired_session
        };
        assert!(!valid_session.is_expired());
    }

    #[test]
    fn test_challenge_expiry() {
        assert!(challenge_expiring_at(0).is_expired());

        let future_timestamp = chrono::Utc::now().timestamp_millis() + 600_000;
        assert!(!challenge_expiring_at(future_timestamp).is_expired());
    }

    #[test]
    fn test_verify_request_field_names() {
        let request: VerifyOtpRequest =
            serde_json::from_str(r#"{"email":"a@example.com","otp":"123456"}"#).unwrap();
        assert_eq!(request.email, "a@example.com");
        assert_eq!(request.otp, "123456");
    }
}
