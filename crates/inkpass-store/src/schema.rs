//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Versioned entitlement records, keyed by `user_id`.
    pub const ENTITLEMENTS: &str = "entitlements";

    /// Unlocked chapter ids, keyed by `user_id`.
    pub const UNLOCKED_CHAPTERS: &str = "unlocked_chapters";

    /// Index: payment order id to owning `user_id` (16 bytes).
    pub const PAYMENT_ORDERS: &str = "payment_orders";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::ENTITLEMENTS, cf::UNLOCKED_CHAPTERS, cf::PAYMENT_ORDERS]
}
