// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Router construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::models::version::VersionResponse;
use crate::routes::{openapi::openapi, user_router, AuthController};
use axum::{routing::get, Json, Router};

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `OTP_AUTH_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("OTP_AUTH_VERSION");

pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "otp-auth".to_string(),
        version: VERSION.to_string(),
    })
}

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

/// Build the Axum application router around an auth controller.
pub fn create_router<C: AuthController>(controller: C) -> Router {
    Router::new()
        .route("/version", get(version_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .merge(user_router().with_state(controller))
}
