//! Package catalog, payment status and the payment-result callback.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use inkpass_core::{Catalog, RecordOutcome, Transaction, TransactionStatus};

use crate::auth::AuthUser;
use crate::crypto::verify_signature;
use crate::error::ApiError;
use crate::handlers::entitlements::TransactionResponse;
use crate::handlers::{parse_order_id, parse_user_id};
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 of the callback body.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

/// List the packages on sale.
pub async fn list_packages(State(state): State<Arc<AppState>>) -> Json<Catalog> {
    Json(state.catalog.as_ref().clone())
}

/// Look up one of the caller's payments.
///
/// Orders that belong to someone else are reported as missing.
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let order_id = parse_order_id(order_id)?;
    let not_found = || ApiError::NotFound(format!("Payment not found: {order_id}"));

    if state.ledger.order_owner(&order_id)? != Some(auth.user_id) {
        return Err(not_found());
    }

    let snapshot = state.ledger.snapshot(&auth.user_id)?;
    let tx = snapshot.transaction(&order_id).ok_or_else(not_found)?;
    Ok(Json(TransactionResponse::from(tx)))
}

/// Payment result reported by the provider.
#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    /// Provider order ID.
    pub order_id: String,
    /// Buyer.
    pub user_id: String,
    /// Catalog package ID.
    pub package_id: String,
    /// Result of the payment attempt.
    pub status: NotificationStatus,
    /// Amount charged, if the provider reports it.
    #[serde(default)]
    pub gross_amount: Option<i64>,
}

/// Payment result states reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Paid.
    Success,
    /// Awaiting completion.
    Pending,
    /// Rejected or errored.
    Failed,
    /// Checkout closed by the buyer before paying.
    Closed,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
    /// What the ledger did with it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RecordOutcome>,
}

/// Handle a payment-result callback.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.payment_webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing payment signature".into()))?;

        if !verify_signature(secret, &body, signature) {
            tracing::warn!("Invalid payment webhook signature");
            return Err(ApiError::BadRequest("Invalid webhook signature".into()));
        }
    }

    let notification: PaymentNotification =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        order_id = %notification.order_id,
        user_id = %notification.user_id,
        package_id = %notification.package_id,
        status = ?notification.status,
        "Received payment webhook"
    );

    let status = match notification.status {
        NotificationStatus::Success => TransactionStatus::Success,
        NotificationStatus::Pending => TransactionStatus::Pending,
        NotificationStatus::Failed => TransactionStatus::Failed,
        NotificationStatus::Closed => {
            tracing::debug!(order_id = %notification.order_id, "Checkout closed, nothing to record");
            return Ok(Json(WebhookResponse {
                received: true,
                outcome: None,
            }));
        }
    };

    let user_id = parse_user_id(&notification.user_id)?;
    let order_id = parse_order_id(notification.order_id)?;
    let package = state.catalog.require(&notification.package_id)?;

    if let Some(gross) = notification.gross_amount {
        if gross != package.price_minor_units() {
            tracing::warn!(
                order_id = %order_id,
                gross,
                price = package.price_minor_units(),
                "Payment amount does not match package price"
            );
            return Err(ApiError::BadRequest(format!(
                "gross amount {gross} does not match package price {}",
                package.price_minor_units()
            )));
        }
    }

    let tx = Transaction {
        id: order_id,
        kind: package.transaction_kind(),
        amount_minor_units: package.price_minor_units(),
        status,
        created_at: state.clock.now(),
        package_label: package.label().to_string(),
    };

    let outcome = state.ledger.settle_payment(&user_id, tx)?;

    Ok(Json(WebhookResponse {
        received: true,
        outcome: Some(outcome),
    }))
}
