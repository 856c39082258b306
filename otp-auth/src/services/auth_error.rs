// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Errors returned by the auth service and their HTTP rendering.

use crate::models::auth::MessageResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Auth error responses.
#[derive(Debug)]
pub enum AuthError {
    InvalidEmail,
    WeakPassword { min_len: usize },
    EmailTaken,
    /// Unknown email or wrong password. Deliberately one variant.
    InvalidCredentials,
    NoPendingChallenge,
    OtpExpired,
    InvalidOtp,
    TooManyAttempts,
    InternalError(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidEmail | AuthError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::NoPendingChallenge
            | AuthError::OtpExpired
            | AuthError::InvalidOtp => StatusCode::UNAUTHORIZED,
            AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidEmail => write!(f, "Invalid email address"),
            AuthError::WeakPassword { min_len } => {
                write!(f, "Password must be at least {} characters", min_len)
            }
            AuthError::EmailTaken => write!(f, "An account with this email already exists"),
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::NoPendingChallenge => write!(f, "No pending verification, sign in again"),
            AuthError::OtpExpired => write!(f, "Verification code has expired, sign in again"),
            AuthError::InvalidOtp => write!(f, "Invalid verification code"),
            AuthError::TooManyAttempts => {
                write!(f, "Too many failed attempts, sign in again")
            }
            AuthError::InternalError(_) => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::InternalError(format!("{:#}", e))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InternalError(msg) = &self {
            tracing::error!(error = %msg, "Auth internal error");
        }
        let body = MessageResponse {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Response;

    #[test]
    fn test_auth_error_status_codes() {
        let cases = [
            (AuthError::InvalidEmail, StatusCode::BAD_REQUEST),
            (AuthError::WeakPassword { min_len: 8 }, StatusCode::BAD_REQUEST),
            (AuthError::EmailTaken, StatusCode::CONFLICT),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::NoPendingChallenge, StatusCode::UNAUTHORIZED),
            (AuthError::OtpExpired, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidOtp, StatusCode::UNAUTHORIZED),
            (AuthError::TooManyAttempts, StatusCode::TOO_MANY_REQUESTS),
            (
                AuthError::InternalError("test".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let response: Response<Body> = error.into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let error: AuthError = anyhow::anyhow!("connection refused to 10.0.0.5").into();
        let response = error.into_response();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let message: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert!(!message.success);
        assert_eq!(message.message, "Internal server error");
    }

    #[test]
    fn test_weak_password_message_names_minimum() {
        assert_eq!(
            AuthError::WeakPassword { min_len: 8 }.to_string(),
            "Password must be at least 8 characters"
        );
    }
}
