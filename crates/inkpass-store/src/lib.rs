//! Storage layer for inkpass.
//!
//! This crate persists one entitlement record per user and enforces optimistic
//! concurrency on every write.
//!
//! # Architecture
//!
//! The `RocksDB` backend uses the following column families:
//!
//! - `entitlements`: Versioned entitlement records, keyed by `user_id`
//! - `unlocked_chapters`: Unlocked chapter ids, keyed by `user_id`
//! - `payment_orders`: Index from payment order id to owning `user_id`
//!
//! A record and its unlocked set are always written in the same batch. Each record
//! carries a `version`; [`Store::put_entitlement`] only succeeds if the caller saw the
//! latest one.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use inkpass_core::{EntitlementState, UserId};
//! use inkpass_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/inkpass-db").unwrap();
//!
//! let user_id = UserId::generate();
//! let state = EntitlementState::new(Utc::now());
//! let version = store.put_entitlement(&user_id, &state, 0).unwrap();
//!
//! let stored = store.get_entitlement(&user_id).unwrap().unwrap();
//! assert_eq!(stored.version, version);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod legacy;
pub mod memory;
pub mod record;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use legacy::{parse_unlocked_chapters, LegacyRecord, LegacyTransaction};
pub use memory::MemoryStore;
pub use record::{EntitlementRecord, SCHEMA_VERSION};
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use inkpass_core::{EntitlementState, OrderId, UserId};

/// A stored value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The value.
    pub value: T,
    /// Version to pass back as `expected_version` when writing.
    pub version: u64,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Entitlement Operations
    // =========================================================================

    /// Get a user's entitlement record and its version.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the record was written by
    /// a newer schema.
    fn get_entitlement(&self, user_id: &UserId) -> Result<Option<Versioned<EntitlementState>>>;

    /// Write a user's entitlement record if it is still at `expected_version`.
    ///
    /// `expected_version == 0` means the record must not exist yet. The record, its
    /// unlocked set and the order index are written atomically. Returns the new version.
    ///
    /// # Errors
    ///
    /// - `StoreError::VersionConflict` if another write got there first.
    /// - `StoreError::OrderConflict` if a logged order id belongs to another user.
    fn put_entitlement(
        &self,
        user_id: &UserId,
        state: &EntitlementState,
        expected_version: u64,
    ) -> Result<u64>;

    // =========================================================================
    // Payment Order Index
    // =========================================================================

    /// The user whose log holds this order id, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn order_owner(&self, order_id: &OrderId) -> Result<Option<UserId>>;
}
