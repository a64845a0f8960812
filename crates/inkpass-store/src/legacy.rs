//! Migration of browser-local (schema 0) records.
//!
//! Before entitlements moved server-side, each browser persisted its own record as JSON:
//!
//! ```json
//! { "coins": 120, "isPremium": true, "premiumUntil": "2024-07-01T00:00:00.000Z",
//!   "transactions": [{ "id": "...", "type": "coins", "amount": 45000,
//!                      "status": "success", "date": "...", "package": "500 Coins + 50 Bonus" }] }
//! ```
//!
//! optionally wrapped as `{ "state": { ... }, "version": 0 }`, with the unlocked chapters
//! kept separately as a JSON array. The cached `isPremium` flag is discarded; premium is
//! re-derived from `premiumUntil`.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use inkpass_core::{
    Catalog, ChapterId, EntitlementState, OrderId, Package, Transaction, TransactionKind,
    TransactionStatus,
};

use crate::error::{Result, StoreError};

/// A schema 0 entitlement record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    /// Coin balance.
    #[serde(default)]
    pub coins: i64,
    /// Cached premium flag. Ignored on migration.
    #[serde(default)]
    pub is_premium: bool,
    /// Premium expiry.
    #[serde(default)]
    pub premium_until: Option<DateTime<Utc>>,
    /// Purchase log, newest first.
    #[serde(default)]
    pub transactions: Vec<LegacyTransaction>,
}

/// A schema 0 transaction entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyTransaction {
    /// Payment order id.
    pub id: String,
    /// `"coins"` or `"premium"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Price paid.
    pub amount: i64,
    /// `"success"`, `"pending"` or `"failed"`.
    pub status: String,
    /// Creation time.
    pub date: DateTime<Utc>,
    /// Package label.
    #[serde(rename = "package", default)]
    pub package_label: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyDocument {
    Wrapped { state: LegacyRecord },
    Bare(LegacyRecord),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyChapterId {
    Number(u64),
    Text(String),
}

impl LegacyRecord {
    /// Parse a record, accepting both the bare and the `{ "state": ... }` form.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: LegacyDocument =
            serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(match document {
            LegacyDocument::Wrapped { state } => state,
            LegacyDocument::Bare(record) => record,
        })
    }

    /// Convert into a current-schema state.
    ///
    /// - Grant payloads are recovered from the catalog by package label; unknown labels
    ///   keep a zero payload.
    /// - Repeated order ids collapse to the newest entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` for negative balances, non-positive prices,
    /// unknown kinds or statuses, and invalid ids.
    pub fn migrate(
        self,
        unlocked_chapters: BTreeSet<ChapterId>,
        catalog: &Catalog,
        now: DateTime<Utc>,
    ) -> Result<EntitlementState> {
        if self.coins < 0 {
            return Err(StoreError::Migration(format!(
                "negative coin balance: {}",
                self.coins
            )));
        }

        let mut seen = HashSet::new();
        let mut transactions = Vec::with_capacity(self.transactions.len());
        for entry in self.transactions {
            if !seen.insert(entry.id.clone()) {
                tracing::debug!(order_id = %entry.id, "Dropping repeated legacy transaction");
                continue;
            }
            transactions.push(entry.into_transaction(catalog)?);
        }

        let created_at = transactions
            .iter()
            .map(|tx| tx.created_at)
            .min()
            .map_or(now, |earliest| earliest.min(now));

        Ok(EntitlementState {
            coin_balance: self.coins,
            premium_expires_at: self.premium_until,
            unlocked_chapters,
            transactions,
            lifetime_coins_purchased: 0,
            lifetime_coins_spent: 0,
            created_at,
            updated_at: now,
        })
    }
}

impl LegacyTransaction {
    fn into_transaction(self, catalog: &Catalog) -> Result<Transaction> {
        let id = OrderId::new(self.id).map_err(|e| StoreError::Migration(e.to_string()))?;

        if self.amount <= 0 {
            return Err(StoreError::Migration(format!(
                "transaction {id} has non-positive amount {}",
                self.amount
            )));
        }

        let package = catalog.find_by_label(&self.package_label);
        let kind = match self.kind.as_str() {
            "coins" => match package {
                Some(Package::Coins(p)) => TransactionKind::CoinPurchase {
                    coins: p.total_coins(),
                },
                _ => TransactionKind::CoinPurchase { coins: 0 },
            },
            "premium" => match package {
                Some(Package::Premium(p)) => TransactionKind::PremiumPurchase { months: p.months },
                _ => TransactionKind::PremiumPurchase { months: 0 },
            },
            other => {
                return Err(StoreError::Migration(format!(
                    "transaction {id} has unknown type {other:?}"
                )))
            }
        };

        let status = match self.status.as_str() {
            "pending" => TransactionStatus::Pending,
            "success" => TransactionStatus::Success,
            "failed" => TransactionStatus::Failed,
            other => {
                return Err(StoreError::Migration(format!(
                    "transaction {id} has unknown status {other:?}"
                )))
            }
        };

        Ok(Transaction {
            id,
            kind,
            amount_minor_units: self.amount,
            status,
            created_at: self.date,
            package_label: self.package_label,
        })
    }
}

/// Parse a schema 0 unlocked-chapter array. Ids may be numbers or strings.
///
/// # Errors
///
/// Returns `StoreError::Serialization` for malformed JSON and `StoreError::Migration`
/// for invalid ids.
pub fn parse_unlocked_chapters(json: &str) -> Result<BTreeSet<ChapterId>> {
    let ids: Vec<LegacyChapterId> =
        serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))?;

    ids.into_iter()
        .map(|id| {
            let raw = match id {
                LegacyChapterId::Number(n) => n.to_string(),
                LegacyChapterId::Text(s) => s,
            };
            ChapterId::new(raw).map_err(|e| StoreError::Migration(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const RECORD: &str = r#"{
        "coins": 120,
        "isPremium": true,
        "premiumUntil": "2031-07-01T00:00:00.000Z",
        "transactions": [
            { "id": "ORD-3", "type": "premium", "amount": 129000, "status": "success",
              "date": "2031-04-01T10:00:00.000Z", "package": "3 Months Premium" },
            { "id": "ORD-2", "type": "coins", "amount": 45000, "status": "pending",
              "date": "2031-03-01T10:00:00.000Z", "package": "500 Coins + 50 Bonus" },
            { "id": "ORD-2", "type": "coins", "amount": 45000, "status": "pending",
              "date": "2031-03-01T09:59:00.000Z", "package": "500 Coins + 50 Bonus" },
            { "id": "ORD-1", "type": "coins", "amount": 5000, "status": "success",
              "date": "2031-02-01T10:00:00.000Z", "package": "Launch Promo" }
        ]
    }"#;

    fn now() -> DateTime<Utc> {
        "2031-05-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn migrates_bare_record() {
        let record = LegacyRecord::from_json(RECORD).unwrap();
        let state = record
            .migrate(BTreeSet::new(), &Catalog::default(), now())
            .unwrap();

        assert_eq!(state.coin_balance, 120);
        assert_eq!(
            state.premium_expires_at,
            Some("2031-07-01T00:00:00Z".parse().unwrap())
        );
        assert!(state.is_premium_active(now()));

        let ids: Vec<_> = state.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["ORD-3", "ORD-2", "ORD-1"]);
        assert_eq!(
            state.transactions[0].kind,
            TransactionKind::PremiumPurchase { months: 3 }
        );
        assert_eq!(
            state.transactions[1].kind,
            TransactionKind::CoinPurchase { coins: 550 }
        );
        assert_eq!(
            state.transactions[1].created_at,
            "2031-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            state.transactions[2].kind,
            TransactionKind::CoinPurchase { coins: 0 }
        );
        assert_eq!(
            state.created_at,
            "2031-02-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn accepts_wrapped_record() {
        let wrapped = format!(r#"{{ "state": {RECORD}, "version": 0 }}"#);
        let record = LegacyRecord::from_json(&wrapped).unwrap();
        assert_eq!(record.coins, 120);
        assert!(record.is_premium);
    }

    #[test]
    fn stale_premium_flag_is_ignored() {
        let record = LegacyRecord::from_json(
            r#"{ "coins": 0, "isPremium": true, "premiumUntil": "2031-01-01T00:00:00Z" }"#,
        )
        .unwrap();
        let state = record
            .migrate(BTreeSet::new(), &Catalog::default(), now())
            .unwrap();

        assert!(!state.is_premium_active(now()));
        assert!(state.is_premium_active(now() - Duration::days(365)));
    }

    #[test]
    fn negative_balance_is_rejected() {
        let record = LegacyRecord::from_json(r#"{ "coins": -5 }"#).unwrap();
        assert!(matches!(
            record.migrate(BTreeSet::new(), &Catalog::default(), now()),
            Err(StoreError::Migration(_))
        ));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let record = LegacyRecord::from_json(
            r#"{ "transactions": [{ "id": "x", "type": "coins", "amount": 1,
                 "status": "refunded", "date": "2031-01-01T00:00:00Z" }] }"#,
        )
        .unwrap();
        assert!(record
            .migrate(BTreeSet::new(), &Catalog::default(), now())
            .is_err());
    }

    #[test]
    fn unlocked_ids_may_be_numbers_or_strings() {
        let unlocked = parse_unlocked_chapters(r#"[12, "ch-7", 12]"#).unwrap();
        let ids: Vec<_> = unlocked.iter().map(ChapterId::as_str).collect();
        assert_eq!(ids, ["12", "ch-7"]);

        assert!(parse_unlocked_chapters(r#"[""]"#).is_err());
        assert!(parse_unlocked_chapters("{}").is_err());
    }
}
