//! Shared harness for HTTP-level tests: the real router over the in-memory
//! store, a capturing code sender and an in-process rate limiter.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use invoicer_auth::config::AppConfig;
use invoicer_auth::delivery::MemoryCodeSender;
use invoicer_auth::rate_limit::MemoryRateLimiter;
use invoicer_auth::store::MemoryStore;
use invoicer_auth::{router, AppState};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub sender: Arc<MemoryCodeSender>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_send_limit(1000)
    }

    pub fn with_send_limit(limit: u64) -> Self {
        let config = AppConfig {
            jwt_secret: "integration-test-secret".into(),
            ..AppConfig::default()
        };
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(MemoryCodeSender::new(chrono::Duration::seconds(
            config.otp_ttl_secs,
        )));
        let limiter = Arc::new(MemoryRateLimiter::new(limit, config.otp_send_window_secs));

        let state = AppState::new(config.clone(), store.clone(), sender.clone(), limiter);
        Self {
            router: router(state, None),
            store,
            sender,
            config,
        }
    }

    pub async fn request(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::USER_AGENT, "integration-test")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::get(uri);
        if let Some(token) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.request(req.body(Body::empty()).unwrap()).await
    }

    pub async fn register(&self, username: &str, password: &str) -> StatusCode {
        self.post(
            "/auth/register",
            json!({ "username": username, "password": password }),
        )
        .await
        .0
    }

    /// Logs in and returns the token pair body; panics on failure.
    pub async fn login(&self, username: &str, password: &str) -> Value {
        let (status, body) = self
            .post(
                "/auth/login",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body
    }

    pub async fn send_otp(&self, email: &str, purpose: &str) -> (StatusCode, Value) {
        self.post("/auth/send-otp", json!({ "email": email, "purpose": purpose }))
            .await
    }

    /// Sends an OTP and returns `(ref, code)` as captured by the sender.
    pub async fn issue_otp(&self, email: &str, purpose: &str) -> (String, String) {
        let (status, body) = self.send_otp(email, purpose).await;
        assert_eq!(status, StatusCode::OK, "send-otp failed: {body}");
        let reference = body["ref"].as_str().unwrap().to_string();
        let code = self.sender.code_for(email, &reference).unwrap();
        (reference, code)
    }
}

/// A six digit code that differs from `code`.
pub fn wrong_code(code: &str) -> String {
    let first = if code.starts_with('9') { '0' } else { '9' };
    format!("{first}{}", &code[1..])
}
