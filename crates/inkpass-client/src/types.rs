//! Request and response types for the inkpass client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkpass_core::{TransactionKind, TransactionStatus, WriterFeatureLimits};

/// A user's entitlements as reported by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntitlementSnapshot {
    /// User ID.
    pub user_id: String,
    /// Spendable coins.
    pub coin_balance: i64,
    /// Whether premium was active when the snapshot was taken.
    pub premium_active: bool,
    /// End of the premium window.
    pub premium_expires_at: Option<DateTime<Utc>>,
    /// Chapters bought with coins.
    pub unlocked_chapters: Vec<String>,
    /// Writer capabilities when the snapshot was taken.
    pub writer_limits: WriterFeatureLimits,
    /// Coins received through purchases.
    #[serde(default)]
    pub lifetime_coins_purchased: i64,
    /// Coins spent.
    #[serde(default)]
    pub lifetime_coins_spent: i64,
}

impl EntitlementSnapshot {
    /// Whether premium is active at `now`, regardless of when the snapshot was taken.
    #[must_use]
    pub fn is_premium_active_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_expires_at.is_some_and(|expires| now < expires)
    }

    /// Whether the chapter was bought with coins.
    #[must_use]
    pub fn has_unlocked(&self, chapter_id: &str) -> bool {
        self.unlocked_chapters.iter().any(|id| id == chapter_id)
    }
}

/// A purchase log entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionRecord {
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
    pub created_at: DateTime<Utc>,
}

/// A page of the purchase log.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionRecord>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// Chapter access check result.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterAccess {
    /// Chapter ID.
    pub chapter_id: String,
    /// Whether the user may read the chapter.
    pub unlocked: bool,
}

/// Unlock request body for the internal endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UnlockRequest {
    /// Coins to charge; the service's configured price when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<i64>,
}

/// Successful unlock.
#[derive(Debug, Clone, Deserialize)]
pub struct UnlockResult {
    /// Chapter ID.
    pub chapter_id: String,
    /// Always true.
    pub unlocked: bool,
    /// Nothing was charged because the chapter was already owned.
    pub already_unlocked: bool,
    /// Balance after the unlock.
    pub coin_balance: i64,
}

/// Premium status.
#[derive(Debug, Clone, Deserialize)]
pub struct PremiumStatus {
    /// Whether premium is active.
    pub premium_active: bool,
}

/// Debit request body.
#[derive(Debug, Clone, Serialize)]
pub struct DebitRequest {
    /// Coins to take.
    pub amount: i64,
}

/// Debit result.
#[derive(Debug, Clone, Deserialize)]
pub struct DebitResult {
    /// False when the balance was too small.
    pub debited: bool,
    /// Balance after the attempt.
    pub coin_balance: i64,
}

/// Coin bundle on sale.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinPackageInfo {
    /// Package ID.
    pub id: String,
    /// Base coins.
    pub coins: i64,
    /// Bonus coins.
    pub bonus_coins: i64,
    /// Price in IDR.
    pub price_minor_units: i64,
    /// Display label.
    pub label: String,
    /// Highlighted in the storefront.
    pub popular: bool,
}

/// Premium window on sale.
#[derive(Debug, Clone, Deserialize)]
pub struct PremiumPackageInfo {
    /// Package ID.
    pub id: String,
    /// Calendar months.
    pub months: u32,
    /// Price in IDR.
    pub price_minor_units: i64,
    /// Display label.
    pub label: String,
    /// Highlighted in the storefront.
    pub popular: bool,
    /// Advertised discount, in percent.
    pub discount_percent: u8,
}

/// Packages on sale.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageList {
    /// Coin bundles.
    pub coins: Vec<CoinPackageInfo>,
    /// Premium windows.
    pub premium: Vec<PremiumPackageInfo>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn transaction_record_reads_flattened_kind() {
        let record: TransactionRecord = serde_json::from_value(serde_json::json!({
            "id": "order-1",
            "type": "premium",
            "months": 3,
            "amount": 129_000,
            "status": "pending",
            "package": "3 Months Premium",
            "created_at": "2026-01-15T12:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.kind, TransactionKind::PremiumPurchase { months: 3 });
        assert_eq!(record.status, TransactionStatus::Pending);
    }

    #[test]
    fn premium_is_judged_against_the_given_instant() {
        let expires = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let snapshot = EntitlementSnapshot {
            user_id: "u".into(),
            coin_balance: 0,
            premium_active: true,
            premium_expires_at: Some(expires),
            unlocked_chapters: vec!["ch-1".into()],
            writer_limits: WriterFeatureLimits::PREMIUM,
            lifetime_coins_purchased: 0,
            lifetime_coins_spent: 0,
        };

        assert!(snapshot.is_premium_active_at(expires - chrono::Duration::seconds(1)));
        assert!(!snapshot.is_premium_active_at(expires));
        assert!(snapshot.has_unlocked("ch-1"));
        assert!(!snapshot.has_unlocked("ch-2"));
    }
}
