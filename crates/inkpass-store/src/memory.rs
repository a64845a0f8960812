//! In-memory storage implementation.
//!
//! Used by tests and by service builds without the `rocksdb-backend` feature. State is
//! lost when the store is dropped.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use inkpass_core::{ChapterId, EntitlementState, OrderId, UserId};

use crate::error::{Result, StoreError};
use crate::record::EntitlementRecord;
use crate::{Store, Versioned};

#[derive(Default)]
struct Inner {
    records: HashMap<UserId, EntitlementRecord>,
    unlocked: HashMap<UserId, BTreeSet<ChapterId>>,
    orders: HashMap<OrderId, UserId>,
}

/// Memory-backed storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn get_entitlement(&self, user_id: &UserId) -> Result<Option<Versioned<EntitlementState>>> {
        let inner = self.lock();
        let Some(record) = inner.records.get(user_id).cloned() else {
            return Ok(None);
        };

        let version = record.version;
        let unlocked = inner.unlocked.get(user_id).cloned().unwrap_or_default();
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
        let mut inner = self.lock();

        let actual = inner.records.get(user_id).map_or(0, |r| r.version);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }

        for tx in &state.transactions {
            if let Some(owner) = inner.orders.get(&tx.id) {
                if owner != user_id {
                    return Err(StoreError::OrderConflict {
                        order_id: tx.id.to_string(),
                    });
                }
            }
        }

        let version = actual + 1;
        inner
            .records
            .insert(*user_id, EntitlementRecord::from_state(state, version));
        inner
            .unlocked
            .insert(*user_id, state.unlocked_chapters.clone());
        for tx in &state.transactions {
            inner.orders.insert(tx.id.clone(), *user_id);
        }

        Ok(version)
    }

    fn order_owner(&self, order_id: &OrderId) -> Result<Option<UserId>> {
        Ok(self.lock().orders.get(order_id).copied())
    }
}
