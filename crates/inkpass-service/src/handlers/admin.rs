//! Admin handlers: manual adjustments, reconciliation and legacy import.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkpass_core::{RecordOutcome, Transaction, TransactionStatus};
use inkpass_store::{parse_unlocked_chapters, LegacyRecord};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::entitlements::EntitlementResponse;
use crate::handlers::{parse_order_id, parse_user_id};
use crate::state::AppState;

/// Credit coins request.
#[derive(Debug, Deserialize)]
pub struct CreditCoinsRequest {
    /// Target user.
    pub user_id: String,
    /// Coins to add.
    pub amount: i64,
    /// Reason, for the audit log.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Credit coins response.
#[derive(Debug, Serialize)]
pub struct CreditCoinsResponse {
    /// Target user.
    pub user_id: String,
    /// Balance after the credit.
    pub coin_balance: i64,
}

/// Add coins to a user's balance.
pub async fn credit_coins(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<CreditCoinsRequest>,
) -> Result<Json<CreditCoinsResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        amount = body.amount,
        reason = body.reason.as_deref().unwrap_or(""),
        "Admin coin credit"
    );

    let coin_balance = state.ledger.credit_coins(&user_id, body.amount)?;
    Ok(Json(CreditCoinsResponse {
        user_id: user_id.to_string(),
        coin_balance,
    }))
}

/// Grant premium request.
#[derive(Debug, Deserialize)]
pub struct GrantPremiumRequest {
    /// Target user.
    pub user_id: String,
    /// New expiry. Replaces any existing one.
    pub expires_at: DateTime<Utc>,
}

/// Grant premium response.
#[derive(Debug, Serialize)]
pub struct GrantPremiumResponse {
    /// Target user.
    pub user_id: String,
    /// Expiry now in effect.
    pub premium_expires_at: DateTime<Utc>,
}

/// Set a user's premium expiry.
pub async fn grant_premium(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantPremiumRequest>,
) -> Result<Json<GrantPremiumResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        expires_at = %body.expires_at,
        "Admin premium grant"
    );

    state.ledger.grant_premium(&user_id, body.expires_at)?;
    Ok(Json(GrantPremiumResponse {
        user_id: user_id.to_string(),
        premium_expires_at: body.expires_at,
    }))
}

/// Record transaction request.
#[derive(Debug, Deserialize)]
pub struct RecordTransactionRequest {
    /// Target user.
    pub user_id: String,
    /// Provider order ID.
    pub order_id: String,
    /// Catalog package ID.
    pub package_id: String,
    /// Status to record.
    pub status: TransactionStatus,
}

/// Record transaction response.
#[derive(Debug, Serialize)]
pub struct RecordTransactionResponse {
    /// What the ledger did with it.
    pub outcome: RecordOutcome,
}

/// Log a transaction without granting anything.
///
/// Used to reconcile the purchase log with the provider's records.
pub async fn record_transaction(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<RecordTransactionRequest>,
) -> Result<Json<RecordTransactionResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let order_id = parse_order_id(body.order_id)?;
    let package = state.catalog.require(&body.package_id)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        order_id = %order_id,
        status = %body.status,
        "Admin transaction record"
    );

    let tx = Transaction {
        id: order_id,
        kind: package.transaction_kind(),
        amount_minor_units: package.price_minor_units(),
        status: body.status,
        created_at: state.clock.now(),
        package_label: package.label().to_string(),
    };

    let outcome = state.ledger.record_transaction(&user_id, tx)?;
    Ok(Json(RecordTransactionResponse { outcome }))
}

/// Legacy import request.
#[derive(Debug, Deserialize)]
pub struct ImportLegacyRequest {
    /// Target user.
    pub user_id: String,
    /// The browser-local record, bare or wrapped in `{ "state": ... }`.
    pub record: serde_json::Value,
    /// The browser-local unlocked-chapter array.
    #[serde(default)]
    pub unlocked_chapters: Option<serde_json::Value>,
}

/// Create a user's record from their browser-local legacy data.
pub async fn import_legacy(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<ImportLegacyRequest>,
) -> Result<Json<EntitlementResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;

    let record = LegacyRecord::from_json(&body.record.to_string())
        .map_err(|e| ApiError::BadRequest(format!("invalid legacy record: {e}")))?;
    let unlocked = match &body.unlocked_chapters {
        Some(value) => parse_unlocked_chapters(&value.to_string())
            .map_err(|e| ApiError::BadRequest(format!("invalid unlocked chapters: {e}")))?,
        None => BTreeSet::new(),
    };

    tracing::info!(admin_id = %admin.admin_id, user_id = %user_id, "Admin legacy import");

    let imported = state.ledger.import_legacy(&user_id, record, unlocked)?;
    Ok(Json(EntitlementResponse::from_snapshot(&user_id, &imported)))
}
