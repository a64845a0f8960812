//! On-disk entitlement record.
//!
//! The stored shape is kept separate from [`EntitlementState`] so the two can evolve
//! independently. The unlocked set is not part of the record; backends store it under
//! its own key and hand it back to [`EntitlementRecord::into_state`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkpass_core::{ChapterId, EntitlementState, Transaction};

use crate::error::{Result, StoreError};

/// Schema version written by this build.
///
/// Version 0 is the browser-local layout handled by [`crate::legacy`].
pub const SCHEMA_VERSION: u32 = 1;

/// Persisted form of an entitlement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Layout version of this record.
    pub schema_version: u32,
    /// Optimistic concurrency version, bumped on every write.
    pub version: u64,
    /// Coin balance.
    pub coins: i64,
    /// Premium expiry.
    pub premium_until: Option<DateTime<Utc>>,
    /// Purchase log, newest first.
    pub transactions: Vec<Transaction>,
    /// Coins received through settled purchases.
    #[serde(default)]
    pub lifetime_coins_purchased: i64,
    /// Coins spent.
    #[serde(default)]
    pub lifetime_coins_spent: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl EntitlementRecord {
    /// Build the record for `state` at `version`.
    #[must_use]
    pub fn from_state(state: &EntitlementState, version: u64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            version,
            coins: state.coin_balance,
            premium_until: state.premium_expires_at,
            transactions: state.transactions.clone(),
            lifetime_coins_purchased: state.lifetime_coins_purchased,
            lifetime_coins_spent: state.lifetime_coins_spent,
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }

    /// Reject records from a newer schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnsupportedSchema` if `schema_version > SCHEMA_VERSION`.
    pub fn check_schema(&self) -> Result<()> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found: self.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    /// Rebuild the domain state from this record and its unlocked set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnsupportedSchema` for records from a newer schema.
    pub fn into_state(self, unlocked_chapters: BTreeSet<ChapterId>) -> Result<EntitlementState> {
        self.check_schema()?;
        Ok(EntitlementState {
            coin_balance: self.coins,
            premium_expires_at: self.premium_until,
            unlocked_chapters,
            transactions: self.transactions,
            lifetime_coins_purchased: self.lifetime_coins_purchased,
            lifetime_coins_spent: self.lifetime_coins_spent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
