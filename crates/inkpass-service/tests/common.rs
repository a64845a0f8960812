//! Common test utilities for inkpass integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use chrono::{DateTime, TimeZone, Utc};

use inkpass_core::{ManualClock, UserId};
use inkpass_service::crypto::hmac_sha256_hex;
use inkpass_service::{
    create_router, ApiError, AppState, ServiceConfig, TokenVerifier, VerifyFuture,
};
use inkpass_store::MemoryStore;

/// Accepts `test-token:<user-id>` bearer tokens.
struct TestTokens;

impl TokenVerifier for TestTokens {
    fn verify<'a>(&'a self, token: &'a str) -> VerifyFuture<'a> {
        Box::pin(async move {
            token
                .strip_prefix("test-token:")
                .and_then(|id| id.parse().ok())
                .ok_or(ApiError::Unauthorized)
        })
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The clock the ledger reads.
    pub clock: Arc<ManualClock>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
    /// The admin API key.
    pub admin_api_key: String,
    /// The payment webhook secret, when signatures are checked.
    pub webhook_secret: Option<String>,
}

/// Fixed start instant for every harness clock.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
}

impl TestHarness {
    /// Create a harness without webhook signature verification.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a harness that requires signed payment callbacks.
    pub fn with_webhook_secret(secret: &str) -> Self {
        Self::build(Some(secret.to_string()))
    }

    fn build(webhook_secret: Option<String>) -> Self {
        let service_api_key = "test-service-key".to_string();
        let admin_api_key = "test-admin-key".to_string();
        let clock = Arc::new(ManualClock::new(start_time()));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            auth_base_url: "http://localhost".into(),
            auth_audience: "inkpass".into(),
            service_api_key: Some(service_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            payment_webhook_secret: webhook_secret.clone(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            ..ServiceConfig::default()
        };

        let state = AppState::new(Arc::new(MemoryStore::new()), clock.clone(), config)
            .with_token_verifier(Arc::new(TestTokens));
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            clock,
            test_user_id: UserId::generate(),
            service_api_key,
            admin_api_key,
            webhook_secret,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        auth_header_for(&self.test_user_id)
    }

    /// Give the test user coins through the admin API.
    pub async fn fund(&self, coins: i64) {
        self.server
            .post("/v1/admin/coins")
            .add_header("x-admin-key", &self.admin_api_key)
            .json(&serde_json::json!({
                "user_id": self.test_user_id.to_string(),
                "amount": coins,
                "reason": "test funding"
            }))
            .await
            .assert_status_ok();
    }

    /// Sign a webhook body with the configured secret.
    pub fn sign(&self, body: &str) -> String {
        let secret = self
            .webhook_secret
            .as_deref()
            .expect("harness has no webhook secret");
        hmac_sha256_hex(secret, body)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Bearer header for an arbitrary user.
pub fn auth_header_for(user_id: &UserId) -> String {
    format!("Bearer test-token:{user_id}")
}
