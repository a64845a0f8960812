//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, chapters, entitlements, health, internal, payments};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for internal endpoints.
/// Chapter access checks run on every page load of the reader.
const INTERNAL_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/packages` - Packages on sale
///
/// ## Reader (JWT auth)
/// - `GET /v1/entitlements/me` - Entitlement snapshot
/// - `GET /v1/entitlements/me/transactions` - Purchase history
/// - `GET /v1/entitlements/me/writer-limits` - Writer capabilities
/// - `GET /v1/chapters/:chapter_id/access` - Chapter access check
/// - `POST /v1/chapters/:chapter_id/unlock` - Buy a chapter with coins
/// - `GET /v1/payments/:order_id` - One of the caller's payments
///
/// ## Internal (Service API Key auth, rate-limited)
/// - `GET /v1/internal/users/:user_id/chapters/:chapter_id/access`
/// - `POST /v1/internal/users/:user_id/chapters/:chapter_id/unlock`
/// - `GET /v1/internal/users/:user_id/writer-limits`
/// - `GET /v1/internal/users/:user_id/premium`
/// - `POST /v1/internal/users/:user_id/coins/debit`
///
/// ## Admin (Admin API Key auth)
/// - `POST /v1/admin/coins` - Credit coins
/// - `POST /v1/admin/premium` - Set premium expiry
/// - `POST /v1/admin/transactions` - Record a transaction without granting
/// - `POST /v1/admin/import` - Import a browser-local legacy record
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/payment` - Payment result callback
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let internal_routes = Router::new()
        .route(
            "/users/:user_id/chapters/:chapter_id/access",
            get(internal::chapter_access),
        )
        .route(
            "/users/:user_id/chapters/:chapter_id/unlock",
            post(internal::unlock_chapter),
        )
        .route("/users/:user_id/writer-limits", get(internal::writer_limits))
        .route("/users/:user_id/premium", get(internal::premium_status))
        .route("/users/:user_id/coins/debit", post(internal::debit_coins))
        .layer(ConcurrencyLimitLayer::new(INTERNAL_MAX_CONCURRENT_REQUESTS));

    let admin_routes = Router::new()
        .route("/coins", post(admin::credit_coins))
        .route("/premium", post(admin::grant_premium))
        .route("/transactions", post(admin::record_transaction))
        .route("/import", post(admin::import_legacy));

    let api_routes = Router::new()
        .route("/packages", get(payments::list_packages))
        // Entitlements
        .route("/entitlements/me", get(entitlements::get_entitlements))
        .route(
            "/entitlements/me/transactions",
            get(entitlements::list_transactions),
        )
        .route(
            "/entitlements/me/writer-limits",
            get(entitlements::get_writer_limits),
        )
        // Chapters
        .route("/chapters/:chapter_id/access", get(chapters::chapter_access))
        .route("/chapters/:chapter_id/unlock", post(chapters::unlock_chapter))
        // Payments
        .route("/payments/:order_id", get(payments::get_payment))
        .nest("/admin", admin_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        // Internal routes carry their own concurrency limit
        .nest("/internal", internal_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by the payment provider)
        .route("/webhooks/payment", post(payments::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
