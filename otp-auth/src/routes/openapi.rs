// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! OpenAPI document for the user routes.
//!
//! Paths are assembled with the builders because the route handlers are
//! generic over the controller.

use crate::models::auth::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
    VerifyOtpRequest, VerifyOtpResponse,
};
use utoipa::openapi::path::{HttpMethod, OperationBuilder, PathItem};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::{
    ContentBuilder, InfoBuilder, PathsBuilder, Ref, Required, ResponseBuilder,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(schemas(
        RegisterRequest,
        RegisterResponse,
        LoginRequest,
        LoginResponse,
        VerifyOtpRequest,
        VerifyOtpResponse,
        MessageResponse
    )),
    tags((name = "auth", description = "Registration, password sign-in and passcode verification"))
)]
struct AuthSchemas;

/// One documented POST operation.
struct PostOperation {
    path: &'static str,
    operation_id: &'static str,
    summary: &'static str,
    request: &'static str,
    ok_status: &'static str,
    ok_body: &'static str,
    errors: &'static [(&'static str, &'static str)],
}

const OPERATIONS: [PostOperation; 3] = [
    PostOperation {
        path: "/register",
        operation_id: "register_user",
        summary: "Create a new user credential record",
        request: "RegisterRequest",
        ok_status: "201",
        ok_body: "RegisterResponse",
        errors: &[
            ("400", "Invalid email or password too short"),
            ("409", "Email already registered"),
        ],
    },
    PostOperation {
        path: "/login",
        operation_id: "login_user",
        summary: "Check credentials and email a one-time passcode",
        request: "LoginRequest",
        ok_status: "200",
        ok_body: "LoginResponse",
        errors: &[("401", "Invalid email or password")],
    },
    PostOperation {
        path: "/verify",
        operation_id: "verify_otp",
        summary: "Exchange a one-time passcode for a session",
        request: "VerifyOtpRequest",
        ok_status: "200",
        ok_body: "VerifyOtpResponse",
        errors: &[
            ("401", "Wrong, expired or missing passcode"),
            ("429", "Attempt limit reached, sign in again"),
        ],
    },
];

fn json_ref(schema: &str) -> utoipa::openapi::Content {
    ContentBuilder::new()
        .schema(Some(Ref::from_schema_name(schema)))
        .build()
}

fn path_item(op: &PostOperation) -> PathItem {
    let request_body = RequestBodyBuilder::new()
        .content("application/json", json_ref(op.request))
        .required(Some(Required::True))
        .build();

    let mut operation = OperationBuilder::new()
        .operation_id(Some(op.operation_id))
        .summary(Some(op.summary))
        .tags(Some(vec!["auth".to_string()]))
        .request_body(Some(request_body))
        .response(
            op.ok_status,
            ResponseBuilder::new()
                .description("Success")
                .content("application/json", json_ref(op.ok_body))
                .build(),
        );

    for (status, description) in op.errors {
        operation = operation.response(
            *status,
            ResponseBuilder::new()
                .description(*description)
                .content("application/json", json_ref("MessageResponse"))
                .build(),
        );
    }

    PathItem::new(HttpMethod::Post, operation.build())
}

/// Build the OpenAPI document served at `/api-docs/openapi.json`.
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = AuthSchemas::openapi();
    doc.info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(crate::app::VERSION)
        .build();

    let mut paths = PathsBuilder::new();
    for op in &OPERATIONS {
        paths = paths.path(op.path, path_item(op));
    }
    doc.paths = paths.build();
    doc
}
