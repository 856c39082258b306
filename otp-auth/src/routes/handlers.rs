// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Controller backing the user routes with `AuthService`.

use crate::models::auth::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, VerifyOtpRequest,
    VerifyOtpResponse,
};
use crate::routes::users::AuthController;
use crate::services::auth::AuthService;
use crate::services::auth_db::UserStore;
use crate::services::email::OtpMailer;
use axum::{
    extract::{ConnectInfo, FromRequest, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_cookies::Cookie;

/// Cookie name for the session.
pub const SESSION_COOKIE_NAME: &str = "otp_auth_session";

/// Create a session cookie with the given token.
pub fn create_session_cookie(token: &str, max_age_days: u64) -> Cookie<'static> {
    let max_age_secs =
        i64::try_from(max_age_days.saturating_mul(24 * 60 * 60)).unwrap_or(i64::MAX);
    Cookie::build((SESSION_COOKIE_NAME, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(tower_cookies::cookie::SameSite::Lax)
        .max_age(tower_cookies::cookie::time::Duration::seconds(max_age_secs))
        .build()
}

/// Auth controller over a store and a mailer.
pub struct UserHandlers<S, M> {
    service: Arc<AuthService<S, M>>,
}

impl<S, M> Clone for UserHandlers<S, M> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: UserStore, M: OtpMailer> UserHandlers<S, M> {
    pub fn new(service: AuthService<S, M>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Parse a JSON body, returning the extractor's rejection as the response.
async fn parse_json<T: DeserializeOwned>(request: Request) -> Result<T, Response> {
    Json::<T>::from_request(request, &())
        .await
        .map(|Json(payload)| payload)
        .map_err(IntoResponse::into_response)
}

/// Client address. The first `X-Forwarded-For` hop is only used when
/// `trust_forwarded_for` is set, since clients can put anything there.
fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<String> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

impl<S: UserStore, M: OtpMailer> AuthController for UserHandlers<S, M> {
    async fn register_user(&self, request: Request) -> Response {
        let payload: RegisterRequest = match parse_json(request).await {
            Ok(payload) => payload,
            Err(rejection) => return rejection,
        };

        match self
            .service
            .register(&payload.email, &payload.password)
            .await
        {
            Ok(user) => (
                StatusCode::CREATED,
                Json(RegisterResponse {
                    success: true,
                    message: "Account created. Sign in to receive a verification code."
                        .to_string(),
                    user_id: user.user_id.to_string(),
                }),
            )
                .into_response(),
            Err(e) => e.into_response(),
        }
    }

    async fn login_user(&self, request: Request) -> Response {
        let payload: LoginRequest = match parse_json(request).await {
            Ok(payload) => payload,
            Err(rejection) => return rejection,
        };

        match self.service.login(&payload.email, &payload.password).await {
            Ok(expires_in_seconds) => Json(LoginResponse {
                success: true,
                message: "A verification code has been sent to your email.".to_string(),
                expires_in_seconds,
            })
            .into_response(),
            Err(e) => e.into_response(),
        }
    }

    async fn verify_otp(&self, request: Request) -> Response {
        let ip_address = client_ip(&request, self.service.config().trust_forwarded_for);
        let user_agent = user_agent(request.headers());
        let payload: VerifyOtpRequest = match parse_json(request).await {
            Ok(payload) => payload,
            Err(rejection) => return rejection,
        };

        let issued = match self
            .service
            .verify_otp(
                &payload.email,
                &payload.otp,
                user_agent.as_deref(),
                ip_address.as_deref(),
            )
            .await
        {
            Ok(issued) => issued,
            Err(e) => return e.into_response(),
        };

        let cookie =
            create_session_cookie(&issued.token, self.service.config().session_max_age_days);
        let body = VerifyOtpResponse {
            success: true,
            message: "Signed in".to_string(),
            user_id: issued.user.user_id.to_string(),
            expires_at: chrono::DateTime::from_timestamp_millis(issued.expires_at)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
            session_token: issued.token,
        };

        let mut response = Json(body).into_response();
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
        }
        response
    }
}
