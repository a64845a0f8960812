//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
    WriteBatch,
};

use inkpass_core::{ChapterId, EntitlementState, OrderId, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::record::EntitlementRecord;
use crate::schema::{all_column_families, cf};
use crate::{Store, Versioned};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes the version check and the batch write of `put_entitlement`.
    commit_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_record(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>> {
        let cf = self.cf(cf::ENTITLEMENTS)?;
        let key = keys::entitlement_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_unlocked(&self, user_id: &UserId) -> Result<BTreeSet<ChapterId>> {
        let cf = self.cf(cf::UNLOCKED_CHAPTERS)?;
        let key = keys::entitlement_key(user_id);

        Ok(self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize::<Vec<ChapterId>>(&data))
            .transpose()?
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Entitlement Operations
    // =========================================================================

    fn get_entitlement(&self, user_id: &UserId) -> Result<Option<Versioned<EntitlementState>>> {
        let Some(record) = self.get_record(user_id)? else {
            return Ok(None);
        };

        let version = record.version;
        let unlocked = self.get_unlocked(user_id)?;
        Ok(Some(Versioned {
            value: record.into_state(unlocked)?,
            version,
        }))
    }

    fn put_entitlement(
        &self,
        user_id: &UserId,
        state: &EntitlementState,
        expected_version: u64,
    ) -> Result<u64> {
        let _guard = self
            .commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous = self.get_record(user_id)?;
        let actual = previous.as_ref().map_or(0, |r| r.version);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }

        let known: HashSet<&OrderId> = previous
            .as_ref()
            .map(|r| r.transactions.iter().map(|tx| &tx.id).collect())
            .unwrap_or_default();

        let cf_entitlements = self.cf(cf::ENTITLEMENTS)?;
        let cf_unlocked = self.cf(cf::UNLOCKED_CHAPTERS)?;
        let cf_orders = self.cf(cf::PAYMENT_ORDERS)?;

        let version = actual + 1;
        let key = keys::entitlement_key(user_id);
        let record_value = Self::serialize(&EntitlementRecord::from_state(state, version))?;
        let unlocked: Vec<&ChapterId> = state.unlocked_chapters.iter().collect();
        let unlocked_value = Self::serialize(&unlocked)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_entitlements, &key, &record_value);
        batch.put_cf(&cf_unlocked, &key, &unlocked_value);

        for tx in state.transactions.iter().filter(|tx| !known.contains(&tx.id)) {
            if let Some(owner) = self.order_owner(&tx.id)? {
                if &owner != user_id {
                    return Err(StoreError::OrderConflict {
                        order_id: tx.id.to_string(),
                    });
                }
            }
            batch.put_cf(&cf_orders, keys::order_key(&tx.id), &key);
        }

        // Write atomically
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(user_id = %user_id, version, "Committed entitlement record");
        Ok(version)
    }

    // =========================================================================
    // Payment Order Index
    // =========================================================================

    fn order_owner(&self, order_id: &OrderId) -> Result<Option<UserId>> {
        let cf = self.cf(cf::PAYMENT_ORDERS)?;

        let Some(value) = self
            .db
            .get_cf(&cf, keys::order_key(order_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        keys::decode_user_id(&value).map(Some).ok_or_else(|| {
            StoreError::Serialization(format!("malformed owner for order {order_id}"))
        })
    }
}
