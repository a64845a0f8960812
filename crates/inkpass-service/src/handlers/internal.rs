//! Internal service-to-service handlers.
//!
//! Called by the reading and writing services, authenticated with the
//! shared service API key rather than a user token.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use inkpass_core::WriterFeatureLimits;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::handlers::chapters::{access_for, unlock_for, ChapterAccessResponse, UnlockResponse};
use crate::handlers::{parse_chapter_id, parse_user_id};
use crate::state::AppState;

/// Whether a user may read a chapter.
pub async fn chapter_access(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Path((user_id, chapter_id)): Path<(String, String)>,
) -> Result<Json<ChapterAccessResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let chapter_id = parse_chapter_id(chapter_id)?;

    tracing::debug!(
        service = %service.service_name,
        user_id = %user_id,
        chapter_id = %chapter_id,
        "Internal chapter access check"
    );

    access_for(&state, &user_id, &chapter_id).map(Json)
}

/// Internal unlock request.
#[derive(Debug, Default, Deserialize)]
pub struct InternalUnlockRequest {
    /// Coins to charge; the configured price when absent.
    #[serde(default)]
    pub cost: Option<i64>,
}

/// Buy a chapter on a user's behalf.
pub async fn unlock_chapter(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Path((user_id, chapter_id)): Path<(String, String)>,
    body: Option<Json<InternalUnlockRequest>>,
) -> Result<Json<UnlockResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let chapter_id = parse_chapter_id(chapter_id)?;
    let Json(request) = body.unwrap_or_default();
    let cost = request.cost.unwrap_or(state.config.chapter_unlock_cost);

    tracing::info!(
        service = %service.service_name,
        user_id = %user_id,
        chapter_id = %chapter_id,
        cost,
        "Internal chapter unlock"
    );

    unlock_for(&state, &user_id, &chapter_id, cost).map(Json)
}

/// A user's writer capabilities.
pub async fn writer_limits(
    State(state): State<Arc<AppState>>,
    _service: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<WriterFeatureLimits>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.ledger.writer_feature_limits(&user_id)?))
}

/// Premium status response.
#[derive(Debug, Serialize)]
pub struct PremiumStatusResponse {
    /// Whether premium is active.
    pub premium_active: bool,
}

/// Whether a user's premium membership is active.
pub async fn premium_status(
    State(state): State<Arc<AppState>>,
    _service: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<PremiumStatusResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let premium_active = state.ledger.is_premium_active(&user_id)?;
    Ok(Json(PremiumStatusResponse { premium_active }))
}

/// Debit request.
#[derive(Debug, Deserialize)]
pub struct DebitCoinsRequest {
    /// Coins to take.
    pub amount: i64,
}

/// Debit response.
#[derive(Debug, Serialize)]
pub struct DebitCoinsResponse {
    /// False when the balance was too small; nothing was taken.
    pub debited: bool,
    /// Balance after the attempt.
    pub coin_balance: i64,
}

/// Spend coins on something other than a chapter.
pub async fn debit_coins(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<DebitCoinsRequest>,
) -> Result<Json<DebitCoinsResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    let spend = state.ledger.debit_coins(&user_id, body.amount)?;

    tracing::info!(
        service = %service.service_name,
        user_id = %user_id,
        amount = body.amount,
        debited = spend.outcome,
        "Internal coin debit"
    );

    Ok(Json(DebitCoinsResponse {
        debited: spend.outcome,
        coin_balance: spend.coin_balance,
    }))
}
