// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! User authentication routes.
//!
//! The router only binds method + path to a controller method. Bodies are not
//! parsed here and responses, including errors, are returned as the
//! controller produced them.

use axum::{
    extract::{Request, State},
    response::Response,
    routing::post,
    Router,
};
use std::future::Future;

/// Handlers bound to the user routes.
pub trait AuthController: Clone + Send + Sync + 'static {
    /// POST /register - create a new user credential record.
    fn register_user(&self, request: Request) -> impl Future<Output = Response> + Send;

    /// POST /login - validate credentials and start a passcode challenge.
    fn login_user(&self, request: Request) -> impl Future<Output = Response> + Send;

    /// POST /verify - validate a submitted one-time passcode.
    fn verify_otp(&self, request: Request) -> impl Future<Output = Response> + Send;
}

/// Create the router with the three user routes.
pub fn user_router<C: AuthController>() -> Router<C> {
    Router::new()
        .route("/register", post(register_user::<C>))
        .route("/login", post(login_user::<C>))
        .route("/verify", post(verify_otp::<C>))
}

async fn register_user<C: AuthController>(
    State(controller): State<C>,
    request: Request,
) -> Response {
    controller.register_user(request).await
}

async fn login_user<C: AuthController>(State(controller): State<C>, request: Request) -> Response {
    controller.login_user(request).await
}

async fn verify_otp<C: AuthController>(State(controller): State<C>, request: Request) -> Response {
    controller.verify_otp(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, StatusCode};
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Counts calls per handler and answers with the handler's name.
    #[derive(Clone, Default)]
    struct CountingController {
        register: Arc<AtomicUsize>,
        login: Arc<AtomicUsize>,
        verify: Arc<AtomicUsize>,
    }

    impl CountingController {
        fn counts(&self) -> (usize, usize, usize) {
            (
                self.register.load(Ordering::SeqCst),
                self.login.load(Ordering::SeqCst),
                self.verify.load(Ordering::SeqCst),
            )
        }
    }

    impl AuthController for CountingController {
        async fn register_user(&self, _request: Request) -> Response {
            self.register.fetch_add(1, Ordering::SeqCst);
            "register".into_response()
        }

        async fn login_user(&self, _request: Request) -> Response {
            self.login.fetch_add(1, Ordering::SeqCst);
            "login".into_response()
        }

        async fn verify_otp(&self, _request: Request) -> Response {
            self.verify.fetch_add(1, Ordering::SeqCst);
            "verify".into_response()
        }
    }

    /// Echoes the request back, with a status and header the router must not touch.
    #[derive(Clone)]
    struct EchoController;

    impl AuthController for EchoController {
        async fn register_user(&self, request: Request) -> Response {
            let body = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .unwrap();
            (
                StatusCode::IM_A_TEAPOT,
                [("x-handler", "register")],
                body,
            )
                .into_response()
        }

        async fn login_user(&self, request: Request) -> Response {
            let content_type = request
                .headers()
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap();
            ([(header::CONTENT_TYPE, content_type)], "login").into_response()
        }

        async fn verify_otp(&self, _request: Request) -> Response {
            (StatusCode::INTERNAL_SERVER_ERROR, "handler failed").into_response()
        }
    }

    fn counting_app() -> (Router, CountingController) {
        let controller = CountingController::default();
        let app = user_router().with_state(controller.clone());
        (app, controller)
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[test]
    fn test_user_router_creation() {
        let _router: Router<CountingController> = user_router();
    }

    #[tokio::test]
    async fn test_post_register_reaches_only_register() {
        let (app, controller) = counting_app();
        let response = app
            .oneshot(request(Method::POST, "/register", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "register");
        assert_eq!(controller.counts(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_post_login_reaches_only_login() {
        let (app, controller) = counting_app();
        let response = app
            .oneshot(request(Method::POST, "/login", "{}"))
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "login");
        assert_eq!(controller.counts(), (0, 1, 0));
    }

    #[tokio::test]
    async fn test_post_verify_reaches_only_verify() {
        let (app, controller) = counting_app();
        let response = app
            .oneshot(request(Method::POST, "/verify", "{}"))
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "verify");
        assert_eq!(controller.counts(), (0, 0, 1));
    }

    #[tokio::test]
    async fn test_body_is_not_validated_by_router() {
        let (app, controller) = counting_app();
        let response = app
            .oneshot(request(Method::POST, "/register", "not json at all"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(controller.counts(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_other_methods_do_not_match() {
        let (app, controller) = counting_app();

        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            for path in ["/register", "/login", "/verify"] {
                let response = app
                    .clone()
                    .oneshot(request(method.clone(), path, ""))
                    .await
                    .unwrap();
                assert_eq!(
                    response.status(),
                    StatusCode::METHOD_NOT_ALLOWED,
                    "{method} {path}"
                );
            }
        }

        assert_eq!(controller.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_undefined_paths_do_not_match() {
        let (app, controller) = counting_app();

        for path in ["/", "/registers", "/register/extra", "/auth/login", "/verify-otp"] {
            let response = app
                .clone()
                .oneshot(request(Method::POST, path, "{}"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "POST {path}");
        }

        assert_eq!(controller.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_each_request_dispatches_exactly_once() {
        let (app, controller) = counting_app();

        let handles: Vec<_> = (0..9)
            .map(|i| {
                let app = app.clone();
                let path = ["/register", "/login", "/verify"][i % 3];
                tokio::spawn(async move {
                    app.oneshot(request(Method::POST, path, "{}"))
                        .await
                        .unwrap()
                        .status()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }
        assert_eq!(controller.counts(), (3, 3, 3));
    }

    #[tokio::test]
    async fn test_handler_response_passes_through_unchanged() {
        let app = user_router().with_state(EchoController);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/register", r#"{"email":"a@b.io"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers().get("x-handler").unwrap(), "register");
        assert_eq!(body_string(response).await, r#"{"email":"a@b.io"}"#);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/login", "{}"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let response = app
            .oneshot(request(Method::POST, "/verify", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "handler failed");
    }
}
