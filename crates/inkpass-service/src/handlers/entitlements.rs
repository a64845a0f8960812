//! Entitlement snapshot, purchase history and writer limits for the caller.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkpass_core::{
    EntitlementState, Transaction, TransactionKind, TransactionStatus, UserId,
    WriterFeatureLimits,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Maximum page size for transaction listings.
const MAX_PAGE_SIZE: usize = 100;

/// Entitlement snapshot response.
#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    /// User ID.
    pub user_id: String,
    /// Spendable coins.
    pub coin_balance: i64,
    /// Whether premium is active.
    pub premium_active: bool,
    /// End of the premium window, if active.
    pub premium_expires_at: Option<DateTime<Utc>>,
    /// Chapters bought with coins.
    pub unlocked_chapters: Vec<String>,
    /// Writer capabilities.
    pub writer_limits: WriterFeatureLimits,
    /// Coins received through purchases.
    pub lifetime_coins_purchased: i64,
    /// Coins spent.
    pub lifetime_coins_spent: i64,
}

impl EntitlementResponse {
    /// Build from a ledger snapshot, which has already cleared a lapsed expiry.
    #[must_use]
    pub fn from_snapshot(user_id: &UserId, state: &EntitlementState) -> Self {
        let premium_active = state.premium_expires_at.is_some();
        Self {
            user_id: user_id.to_string(),
            coin_balance: state.coin_balance,
            premium_active,
            premium_expires_at: state.premium_expires_at,
            unlocked_chapters: state
                .unlocked_chapters
                .iter()
                .map(ToString::to_string)
                .collect(),
            writer_limits: WriterFeatureLimits::for_premium(premium_active),
            lifetime_coins_purchased: state.lifetime_coins_purchased,
            lifetime_coins_spent: state.lifetime_coins_spent,
        }
    }
}

/// Get the caller's entitlements.
pub async fn get_entitlements(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<EntitlementResponse>, ApiError> {
    let snapshot = state.ledger.snapshot(&auth.user_id)?;
    Ok(Json(EntitlementResponse::from_snapshot(
        &auth.user_id,
        &snapshot,
    )))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Payment order ID.
    pub id: String,
    /// What was bought.
    #[serde(flatten)]
    pub kind: TransactionKind,
    /// Price paid.
    pub amount: i64,
    /// Outcome.
    pub status: TransactionStatus,
    /// Package label.
    pub package: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            kind: tx.kind,
            amount: tx.amount_minor_units,
            status: tx.status,
            package: tx.package_label.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List the caller's purchase history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(MAX_PAGE_SIZE);
    let transactions = state
        .ledger
        .transactions(&auth.user_id, limit + 1, query.offset)?;

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Get the caller's writer capabilities.
pub async fn get_writer_limits(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<WriterFeatureLimits>, ApiError> {
    Ok(Json(state.ledger.writer_feature_limits(&auth.user_id)?))
}
