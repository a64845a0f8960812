//! Purchase transaction types for inkpass.
//!
//! Every coin or premium purchase attempt reported by the payment provider becomes a
//! transaction in the user's audit log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderId;

/// A purchase attempt and its outcome.
///
/// Transactions are identified by the payment provider's order id and are kept
/// newest-first in the entitlement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Payment-order id from the provider.
    pub id: OrderId,

    /// What was bought, and what a successful settlement grants.
    pub kind: TransactionKind,

    /// Price paid, in the smallest currency unit.
    pub amount_minor_units: i64,

    /// Outcome reported by the provider.
    pub status: TransactionStatus,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,

    /// Human-readable package descriptor.
    pub package_label: String,
}

impl Transaction {
    /// Create a coin purchase transaction.
    #[must_use]
    pub fn coin_purchase(
        id: OrderId,
        coins: i64,
        amount_minor_units: i64,
        status: TransactionStatus,
        package_label: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: TransactionKind::CoinPurchase { coins },
            amount_minor_units,
            status,
            created_at,
            package_label: package_label.into(),
        }
    }

    /// Create a premium purchase transaction.
    #[must_use]
    pub fn premium_purchase(
        id: OrderId,
        months: u32,
        amount_minor_units: i64,
        status: TransactionStatus,
        package_label: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: TransactionKind::PremiumPurchase { months },
            amount_minor_units,
            status,
            created_at,
            package_label: package_label.into(),
        }
    }

    /// Whether the provider reported the payment as completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }
}

/// What a transaction purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    /// Coins, bonus included.
    #[serde(rename = "coins")]
    CoinPurchase {
        /// Coins credited on success.
        coins: i64,
    },

    /// A premium window.
    #[serde(rename = "premium")]
    PremiumPurchase {
        /// Calendar months of premium granted on success.
        months: u32,
    },
}

impl TransactionKind {
    /// Short wire name (`"coins"` or `"premium"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CoinPurchase { .. } => "coins",
            Self::PremiumPurchase { .. } => "premium",
        }
    }
}

/// Outcome of a purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting completion on the provider side.
    Pending,

    /// Paid.
    Success,

    /// Rejected or errored.
    Failed,
}

impl TransactionStatus {
    /// Whether the status can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Short wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str) -> OrderId {
        OrderId::new(id).unwrap()
    }

    #[test]
    fn coin_purchase_transaction() {
        let tx = Transaction::coin_purchase(
            order("ord-1"),
            550,
            45_000,
            TransactionStatus::Success,
            "500 Coins + 50 Bonus",
            Utc::now(),
        );

        assert_eq!(tx.kind, TransactionKind::CoinPurchase { coins: 550 });
        assert_eq!(tx.amount_minor_units, 45_000);
        assert!(tx.is_success());
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let kind = TransactionKind::PremiumPurchase { months: 3 };
        let json = serde_json::to_value(kind).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "premium", "months": 3 }));
        assert_eq!(kind.as_str(), "premium");

        let coins: TransactionKind =
            serde_json::from_value(serde_json::json!({ "type": "coins", "coins": 100 })).unwrap();
        assert_eq!(coins, TransactionKind::CoinPurchase { coins: 100 });
    }

    #[test]
    fn status_terminality() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert_eq!(TransactionStatus::Failed.to_string(), "failed");
    }
}
