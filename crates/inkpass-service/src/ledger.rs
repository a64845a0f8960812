//! The entitlement ledger.
//!
//! [`Entitlements`] is the capability handlers and other components are given;
//! [`EntitlementLedger`] implements it over a [`Store`] and a [`Clock`]. Each mutating
//! operation loads the user's record, applies the state transition from
//! `inkpass-core`, and commits with compare-and-swap on the record version. A commit
//! that loses a race is retried from a fresh read.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use inkpass_core::{
    ChapterId, Clock, EntitlementError, EntitlementState, OrderId, PremiumGrantPolicy,
    RecordOutcome, Transaction, UnlockOutcome, UserId, WriterFeatureLimits,
};
use inkpass_store::{LegacyRecord, Store, StoreError, Versioned};

use crate::config::DEFAULT_COMMIT_ATTEMPTS;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// The result of a coin-spending operation and the balance it left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spend<T> {
    /// What the operation reported.
    pub outcome: T,
    /// Coin balance in the committed record.
    pub coin_balance: i64,
}

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The state transition was rejected.
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),

    /// Storage failed.
    #[error(transparent)]
    Store(StoreError),

    /// Every commit attempt lost a race with a concurrent writer.
    #[error("too much contention: gave up after {attempts} attempts")]
    Contention {
        /// Attempts made.
        attempts: u32,
    },

    /// The payment order is already logged for another user.
    #[error("order {0} belongs to another user")]
    OrderConflict(String),

    /// The user already has a record.
    #[error("entitlement record already exists for {0}")]
    AlreadyExists(UserId),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderConflict { order_id } => Self::OrderConflict(order_id),
            other => Self::Store(other),
        }
    }
}

/// Entitlement operations for a user.
///
/// Every operation is all-or-nothing: an error, a refused debit or a refused unlock
/// leaves the stored record untouched.
pub trait Entitlements: Send + Sync {
    /// Set the premium expiry, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be committed.
    fn grant_premium(&self, user_id: &UserId, expires_at: DateTime<Utc>) -> Result<()>;

    /// Add coins. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a non-positive or overflowing amount.
    fn credit_coins(&self, user_id: &UserId, amount: i64) -> Result<i64>;

    /// Spend coins if the balance covers them. Returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a non-positive amount.
    fn debit_coins(&self, user_id: &UserId, amount: i64) -> Result<Spend<bool>>;

    /// Log a transaction without applying any grant.
    ///
    /// # Errors
    ///
    /// Returns `ConflictingTransaction` if the order id is logged with an incompatible
    /// status.
    fn record_transaction(&self, user_id: &UserId, tx: Transaction) -> Result<RecordOutcome>;

    /// Buy permanent access to a chapter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a non-positive cost.
    fn unlock_chapter(
        &self,
        user_id: &UserId,
        chapter_id: &ChapterId,
        cost: i64,
    ) -> Result<Spend<UnlockOutcome>>;

    /// Whether the user may read the chapter now.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn is_chapter_unlocked(&self, user_id: &UserId, chapter_id: &ChapterId) -> Result<bool>;

    /// Whether premium is active now. A lapsed window is cleared and persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or committed.
    fn is_premium_active(&self, user_id: &UserId) -> Result<bool>;

    /// Writer capabilities now.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn writer_feature_limits(&self, user_id: &UserId) -> Result<WriterFeatureLimits>;

    /// Record a payment result and apply its grant the first time it succeeds.
    ///
    /// # Errors
    ///
    /// - `OrderConflict` if the order id is logged for another user.
    /// - `ConflictingTransaction` if it is logged with an incompatible status.
    fn settle_payment(&self, user_id: &UserId, tx: Transaction) -> Result<RecordOutcome>;

    /// The full record, created zero-valued on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or committed.
    fn snapshot(&self, user_id: &UserId) -> Result<EntitlementState>;

    /// A newest-first page of the purchase log.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn transactions(&self, user_id: &UserId, limit: usize, offset: usize)
        -> Result<Vec<Transaction>>;

    /// The user whose log holds this order id, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn order_owner(&self, order_id: &OrderId) -> Result<Option<UserId>>;

    /// Create a user's record from a browser-local legacy record.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the user already has a record.
    /// - `Store(Migration)` if the legacy record is invalid.
    fn import_legacy(
        &self,
        user_id: &UserId,
        record: LegacyRecord,
        unlocked_chapters: BTreeSet<ChapterId>,
    ) -> Result<EntitlementState>;
}

/// [`Entitlements`] backed by a [`Store`].
pub struct EntitlementLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    catalog: Arc<inkpass_core::Catalog>,
    policy: PremiumGrantPolicy,
    commit_attempts: u32,
}

impl EntitlementLedger {
    /// Create a ledger with the default grant policy and retry budget.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            catalog: Arc::new(inkpass_core::Catalog::default()),
            policy: PremiumGrantPolicy::default(),
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    /// Set how premium purchases move an existing expiry.
    #[must_use]
    pub fn with_policy(mut self, policy: PremiumGrantPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the number of commit attempts (at least one).
    #[must_use]
    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts.max(1);
        self
    }

    /// Set the catalog legacy imports resolve package labels against.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<inkpass_core::Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Read a user's record, or a fresh zero-valued one (version 0) if none exists.
    fn load(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Versioned<EntitlementState>> {
        Ok(self
            .store
            .get_entitlement(user_id)?
            .unwrap_or_else(|| Versioned {
                value: EntitlementState::new(now),
                version: 0,
            }))
    }

    /// Apply `op` to the user's record and commit the result.
    ///
    /// Nothing is written when `op` fails or leaves the state unchanged, unless
    /// `create` asks for a missing record to be persisted anyway.
    fn mutate<T>(
        &self,
        user_id: &UserId,
        create: bool,
        mut op: impl FnMut(&mut EntitlementState, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        for attempt in 1..=self.commit_attempts {
            let now = self.clock.now();
            let Versioned {
                value: mut state,
                version,
            } = self.load(user_id, now)?;

            let before = state.clone();
            let value = op(&mut state, now)?;

            let must_create = create && version == 0;
            if state == before && !must_create {
                return Ok(value);
            }

            match self.store.put_entitlement(user_id, &state, version) {
                Ok(new_version) => {
                    tracing::debug!(user_id = %user_id, version = new_version, "Ledger commit");
                    return Ok(value);
                }
                Err(StoreError::VersionConflict { expected, actual }) => {
                    tracing::debug!(
                        user_id = %user_id,
                        attempt,
                        expected,
                        actual,
                        "Ledger commit lost a race, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            user_id = %user_id,
            attempts = self.commit_attempts,
            "Ledger commit gave up"
        );
        Err(LedgerError::Contention {
            attempts: self.commit_attempts,
        })
    }

    /// Evaluate `read` against the current record without writing.
    fn read<T>(
        &self,
        user_id: &UserId,
        read: impl FnOnce(&EntitlementState, DateTime<Utc>) -> T,
    ) -> Result<T> {
        let now = self.clock.now();
        let record = self.load(user_id, now)?;
        Ok(read(&record.value, now))
    }
}

impl Entitlements for EntitlementLedger {
    fn grant_premium(&self, user_id: &UserId, expires_at: DateTime<Utc>) -> Result<()> {
        self.mutate(user_id, true, |state, now| {
            state.grant_premium(expires_at, now);
            Ok(())
        })?;

        tracing::info!(user_id = %user_id, expires_at = %expires_at, "Premium granted");
        Ok(())
    }

    fn credit_coins(&self, user_id: &UserId, amount: i64) -> Result<i64> {
        let balance = self.mutate(user_id, true, |state, now| {
            Ok(state.credit_coins(amount, now)?)
        })?;

        tracing::info!(user_id = %user_id, amount, balance, "Coins credited");
        Ok(balance)
    }

    fn debit_coins(&self, user_id: &UserId, amount: i64) -> Result<Spend<bool>> {
        let spend = self.mutate(user_id, false, |state, now| {
            Ok(Spend {
                outcome: state.debit_coins(amount, now)?,
                coin_balance: state.coin_balance,
            })
        })?;

        if spend.outcome {
            tracing::info!(user_id = %user_id, amount, "Coins debited");
        } else {
            tracing::debug!(user_id = %user_id, amount, "Debit refused, insufficient coins");
        }
        Ok(spend)
    }

    fn record_transaction(&self, user_id: &UserId, tx: Transaction) -> Result<RecordOutcome> {
        let order_id = tx.id.clone();
        let outcome = self.mutate(user_id, false, |state, now| {
            Ok(state.record_transaction(tx.clone(), now)?)
        })?;

        tracing::info!(
            user_id = %user_id,
            order_id = %order_id,
            outcome = outcome.as_str(),
            "Transaction recorded"
        );
        Ok(outcome)
    }

    fn unlock_chapter(
        &self,
        user_id: &UserId,
        chapter_id: &ChapterId,
        cost: i64,
    ) -> Result<Spend<UnlockOutcome>> {
        let spend = self.mutate(user_id, false, |state, now| {
            Ok(Spend {
                outcome: state.unlock_chapter(chapter_id, cost, now)?,
                coin_balance: state.coin_balance,
            })
        })?;

        match spend.outcome {
            UnlockOutcome::Unlocked => {
                tracing::info!(user_id = %user_id, chapter_id = %chapter_id, cost, "Chapter unlocked");
            }
            UnlockOutcome::AlreadyUnlocked => {
                tracing::debug!(user_id = %user_id, chapter_id = %chapter_id, "Chapter already unlocked");
            }
            UnlockOutcome::InsufficientCoins { balance, required } => {
                tracing::debug!(
                    user_id = %user_id,
                    chapter_id = %chapter_id,
                    balance,
                    required,
                    "Unlock refused, insufficient coins"
                );
            }
        }
        Ok(spend)
    }

    fn is_chapter_unlocked(&self, user_id: &UserId, chapter_id: &ChapterId) -> Result<bool> {
        self.read(user_id, |state, now| {
            state.is_chapter_unlocked(chapter_id, now)
        })
    }

    fn is_premium_active(&self, user_id: &UserId) -> Result<bool> {
        self.mutate(user_id, false, |state, now| Ok(state.observe_premium(now)))
    }

    fn writer_feature_limits(&self, user_id: &UserId) -> Result<WriterFeatureLimits> {
        self.read(user_id, EntitlementState::writer_feature_limits)
    }

    fn settle_payment(&self, user_id: &UserId, tx: Transaction) -> Result<RecordOutcome> {
        if let Some(owner) = self.store.order_owner(&tx.id)? {
            if &owner != user_id {
                tracing::warn!(
                    user_id = %user_id,
                    owner = %owner,
                    order_id = %tx.id,
                    "Payment result for an order owned by another user"
                );
                return Err(LedgerError::OrderConflict(tx.id.to_string()));
            }
        }

        let order_id = tx.id.clone();
        let status = tx.status;
        let policy = self.policy;
        let outcome = self.mutate(user_id, false, |state, now| {
            Ok(state.settle_payment(tx.clone(), policy, now)?)
        })?;

        tracing::info!(
            user_id = %user_id,
            order_id = %order_id,
            status = %status,
            outcome = outcome.as_str(),
            "Payment settled"
        );
        Ok(outcome)
    }

    fn snapshot(&self, user_id: &UserId) -> Result<EntitlementState> {
        self.mutate(user_id, true, |state, now| {
            state.observe_premium(now);
            Ok(state.clone())
        })
    }

    fn transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        self.read(user_id, |state, _| {
            state.transactions_page(limit, offset).to_vec()
        })
    }

    fn order_owner(&self, order_id: &OrderId) -> Result<Option<UserId>> {
        Ok(self.store.order_owner(order_id)?)
    }

    fn import_legacy(
        &self,
        user_id: &UserId,
        record: LegacyRecord,
        unlocked_chapters: BTreeSet<ChapterId>,
    ) -> Result<EntitlementState> {
        if self.store.get_entitlement(user_id)?.is_some() {
            return Err(LedgerError::AlreadyExists(*user_id));
        }

        let now = self.clock.now();
        let mut state = record.migrate(unlocked_chapters, &self.catalog, now)?;
        state.observe_premium(now);
        match self.store.put_entitlement(user_id, &state, 0) {
            Ok(_) => {}
            Err(StoreError::VersionConflict { .. }) => {
                return Err(LedgerError::AlreadyExists(*user_id));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            user_id = %user_id,
            coins = state.coin_balance,
            transactions = state.transactions.len(),
            unlocked = state.unlocked_chapters.len(),
            "Legacy record imported"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Months};
    use inkpass_core::{ManualClock, TransactionStatus};
    use inkpass_store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixture {
        ledger: EntitlementLedger,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        user: UserId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let ledger = EntitlementLedger::new(store.clone(), clock.clone());
        Fixture {
            ledger,
            store,
            clock,
            user: UserId::generate(),
        }
    }

    fn chapter(id: &str) -> ChapterId {
        ChapterId::new(id).unwrap()
    }

    fn coins_tx(order: &str, coins: i64, status: TransactionStatus) -> Transaction {
        Transaction::coin_purchase(
            OrderId::new(order).unwrap(),
            coins,
            45_000,
            status,
            "500 Coins + 50 Bonus",
            Utc::now(),
        )
    }

    fn stored_version(f: &Fixture) -> u64 {
        f.store.get_entitlement(&f.user).unwrap().map_or(0, |v| v.version)
    }

    #[test]
    fn snapshot_creates_zero_record() {
        let f = fixture();
        assert_eq!(stored_version(&f), 0);

        let state = f.ledger.snapshot(&f.user).unwrap();
        assert_eq!(state.coin_balance, 0);
        assert_eq!(stored_version(&f), 1);

        f.ledger.snapshot(&f.user).unwrap();
        assert_eq!(stored_version(&f), 1);
    }

    #[test]
    fn refused_debit_does_not_commit() {
        let f = fixture();
        let refused = f.ledger.debit_coins(&f.user, 5).unwrap();
        assert_eq!(
            refused,
            Spend {
                outcome: false,
                coin_balance: 0
            }
        );
        assert_eq!(stored_version(&f), 0);

        f.ledger.credit_coins(&f.user, 8).unwrap();
        let spent = f.ledger.debit_coins(&f.user, 5).unwrap();
        assert!(spent.outcome);
        assert_eq!(spent.coin_balance, 3);
        assert_eq!(f.ledger.snapshot(&f.user).unwrap().coin_balance, 3);
    }

    #[test]
    fn invalid_amount_is_an_error() {
        let f = fixture();
        assert!(matches!(
            f.ledger.credit_coins(&f.user, 0),
            Err(LedgerError::Entitlement(EntitlementError::InvalidAmount(_)))
        ));
        assert!(f.ledger.debit_coins(&f.user, -1).is_err());
        assert_eq!(stored_version(&f), 0);
    }

    #[test]
    fn unlock_flow() {
        let f = fixture();
        f.ledger.credit_coins(&f.user, 15).unwrap();

        let first = f.ledger.unlock_chapter(&f.user, &chapter("1"), 10).unwrap();
        let second = f.ledger.unlock_chapter(&f.user, &chapter("2"), 10).unwrap();
        let again = f.ledger.unlock_chapter(&f.user, &chapter("1"), 10).unwrap();

        assert_eq!(first.outcome, UnlockOutcome::Unlocked);
        assert_eq!(first.coin_balance, 5);
        assert_eq!(
            second.outcome,
            UnlockOutcome::InsufficientCoins {
                balance: 5,
                required: 10
            }
        );
        assert_eq!(again.outcome, UnlockOutcome::AlreadyUnlocked);
        assert_eq!(again.coin_balance, 5);
        assert!(f.ledger.is_chapter_unlocked(&f.user, &chapter("1")).unwrap());
        assert!(!f.ledger.is_chapter_unlocked(&f.user, &chapter("2")).unwrap());
        assert_eq!(f.ledger.snapshot(&f.user).unwrap().coin_balance, 5);
    }

    #[test]
    fn premium_lapse_is_persisted_on_read() {
        let f = fixture();
        let now = f.clock.now();
        f.ledger
            .grant_premium(&f.user, now + Duration::days(30))
            .unwrap();

        assert!(f.ledger.is_premium_active(&f.user).unwrap());
        assert!(f.ledger.is_chapter_unlocked(&f.user, &chapter("9")).unwrap());
        assert!(f.ledger.writer_feature_limits(&f.user).unwrap().can_publish);

        f.clock.advance(Duration::days(31));
        assert!(!f.ledger.writer_feature_limits(&f.user).unwrap().can_publish);
        assert!(!f.ledger.is_premium_active(&f.user).unwrap());

        let stored = f.store.get_entitlement(&f.user).unwrap().unwrap();
        assert!(stored.value.premium_expires_at.is_none());
    }

    #[test]
    fn settlement_is_idempotent() {
        let f = fixture();

        let pending = f
            .ledger
            .settle_payment(&f.user, coins_tx("ord-1", 550, TransactionStatus::Pending))
            .unwrap();
        let settled = f
            .ledger
            .settle_payment(&f.user, coins_tx("ord-1", 550, TransactionStatus::Success))
            .unwrap();
        let replay = f
            .ledger
            .settle_payment(&f.user, coins_tx("ord-1", 550, TransactionStatus::Success))
            .unwrap();

        assert_eq!(pending, RecordOutcome::Appended);
        assert_eq!(settled, RecordOutcome::Settled);
        assert_eq!(replay, RecordOutcome::Duplicate);

        let state = f.ledger.snapshot(&f.user).unwrap();
        assert_eq!(state.coin_balance, 550);
        assert_eq!(state.transactions.len(), 1);
    }

    #[test]
    fn premium_settlement_uses_policy() {
        let f = fixture();
        let ledger = EntitlementLedger::new(f.store.clone(), f.clock.clone())
            .with_policy(PremiumGrantPolicy::Extend);
        let now = f.clock.now();
        let current = now + Duration::days(10);
        ledger.grant_premium(&f.user, current).unwrap();

        let tx = Transaction::premium_purchase(
            OrderId::new("ord-p").unwrap(),
            1,
            49_000,
            TransactionStatus::Success,
            "1 Month Premium",
            now,
        );
        ledger.settle_payment(&f.user, tx).unwrap();

        let state = ledger.snapshot(&f.user).unwrap();
        assert_eq!(
            state.premium_expires_at,
            current.checked_add_months(Months::new(1))
        );
    }

    #[test]
    fn order_owned_by_another_user_is_rejected() {
        let f = fixture();
        let other = UserId::generate();
        f.ledger
            .settle_payment(&f.user, coins_tx("ord-1", 550, TransactionStatus::Success))
            .unwrap();

        let err = f
            .ledger
            .settle_payment(&other, coins_tx("ord-1", 550, TransactionStatus::Success))
            .unwrap_err();

        assert!(matches!(err, LedgerError::OrderConflict(_)));
        assert_eq!(
            f.ledger
                .order_owner(&OrderId::new("ord-1").unwrap())
                .unwrap(),
            Some(f.user)
        );
        assert_eq!(f.ledger.snapshot(&other).unwrap().coin_balance, 0);
    }

    #[test]
    fn conflicting_status_is_rejected() {
        let f = fixture();
        f.ledger
            .record_transaction(&f.user, coins_tx("ord-1", 550, TransactionStatus::Failed))
            .unwrap();

        let err = f
            .ledger
            .record_transaction(&f.user, coins_tx("ord-1", 550, TransactionStatus::Success))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Entitlement(EntitlementError::ConflictingTransaction { .. })
        ));
    }

    #[test]
    fn transactions_page_newest_first() {
        let f = fixture();
        for i in 0..5 {
            f.ledger
                .record_transaction(
                    &f.user,
                    coins_tx(&format!("ord-{i}"), 100, TransactionStatus::Failed),
                )
                .unwrap();
        }

        let page = f.ledger.transactions(&f.user, 2, 1).unwrap();
        let ids: Vec<_> = page.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["ord-3", "ord-2"]);
    }

    #[test]
    fn import_requires_fresh_user() {
        let f = fixture();
        let record = LegacyRecord::from_json(r#"{ "coins": 40 }"#).unwrap();
        let unlocked = inkpass_store::parse_unlocked_chapters("[1, 2]").unwrap();

        let state = f
            .ledger
            .import_legacy(&f.user, record.clone(), unlocked.clone())
            .unwrap();
        assert_eq!(state.coin_balance, 40);
        assert!(f.ledger.is_chapter_unlocked(&f.user, &chapter("2")).unwrap());

        assert!(matches!(
            f.ledger.import_legacy(&f.user, record, unlocked),
            Err(LedgerError::AlreadyExists(_))
        ));
    }

    /// A store whose first `failures` writes lose a race.
    struct RacingStore {
        inner: MemoryStore,
        failures: AtomicU32,
    }

    impl Store for RacingStore {
        fn get_entitlement(
            &self,
            user_id: &UserId,
        ) -> inkpass_store::Result<Option<Versioned<EntitlementState>>> {
            self.inner.get_entitlement(user_id)
        }

        fn put_entitlement(
            &self,
            user_id: &UserId,
            state: &EntitlementState,
            expected_version: u64,
        ) -> inkpass_store::Result<u64> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::VersionConflict {
                    expected: expected_version,
                    actual: expected_version + 1,
                });
            }
            self.inner.put_entitlement(user_id, state, expected_version)
        }

        fn order_owner(&self, order_id: &OrderId) -> inkpass_store::Result<Option<UserId>> {
            self.inner.order_owner(order_id)
        }
    }

    fn racing_ledger(failures: u32, attempts: u32) -> EntitlementLedger {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(failures),
        });
        EntitlementLedger::new(store, Arc::new(ManualClock::default()))
            .with_commit_attempts(attempts)
    }

    #[test]
    fn lost_race_is_retried() {
        let ledger = racing_ledger(2, 3);
        let user = UserId::generate();
        assert_eq!(ledger.credit_coins(&user, 10).unwrap(), 10);
    }

    #[test]
    fn persistent_contention_gives_up() {
        let ledger = racing_ledger(10, 3);
        let user = UserId::generate();
        assert!(matches!(
            ledger.credit_coins(&user, 10),
            Err(LedgerError::Contention { attempts: 3 })
        ));
    }

    #[test]
    fn concurrent_credits_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(
            EntitlementLedger::new(store, Arc::new(ManualClock::default()))
                .with_commit_attempts(1_000),
        );
        let user = UserId::generate();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        ledger.credit_coins(&user, 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.snapshot(&user).unwrap().coin_balance, 200);
    }
}
