//! Entitlement state for a single user.
//!
//! `EntitlementState` is the coin balance, premium window, unlocked-chapter set and
//! purchase log of one account, together with the state transitions that are allowed
//! on them. Every transition takes `now` explicitly; nothing here reads the clock.
//!
//! Premium is never stored as a flag. It is derived from `premium_expires_at` at the
//! instant of the read, and a read that finds the window closed clears the expiry
//! ([`EntitlementState::observe_premium`]). There is no background sweep.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EntitlementError, Result};
use crate::ids::{ChapterId, OrderId};
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};

// ============================================================================
// Constants
// ============================================================================

/// Sentinel for "no limit" in [`WriterFeatureLimits`].
pub const UNLIMITED: i32 = -1;

/// Novels a writer without premium may create.
pub const FREE_MAX_NOVELS: i32 = 1;

/// Chapters a writer without premium may create.
pub const FREE_MAX_CHAPTERS: i32 = 5;

/// The entitlement record of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementState {
    /// Spendable coins. Never negative.
    pub coin_balance: i64,

    /// End of the premium window, if one was granted and has not been seen to lapse.
    pub premium_expires_at: Option<DateTime<Utc>>,

    /// Chapters bought with coins. Only ever grows.
    pub unlocked_chapters: BTreeSet<ChapterId>,

    /// Purchase log, newest first.
    pub transactions: Vec<Transaction>,

    /// Coins received through settled coin purchases.
    pub lifetime_coins_purchased: i64,

    /// Coins spent on unlocks and debits.
    pub lifetime_coins_spent: i64,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl EntitlementState {
    /// Create a zero-valued record.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            coin_balance: 0,
            premium_expires_at: None,
            unlocked_chapters: BTreeSet::new(),
            transactions: Vec::new(),
            lifetime_coins_purchased: 0,
            lifetime_coins_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    // ========================================================================
    // Premium
    // ========================================================================

    /// Whether premium is active at `now`.
    #[must_use]
    pub fn is_premium_active(&self, now: DateTime<Utc>) -> bool {
        self.premium_expires_at.is_some_and(|expires| now < expires)
    }

    /// Check premium at `now`, clearing the expiry if the window has closed.
    ///
    /// Returns whether premium is active.
    pub fn observe_premium(&mut self, now: DateTime<Utc>) -> bool {
        match self.premium_expires_at {
            Some(expires) if now >= expires => {
                self.premium_expires_at = None;
                self.touch(now);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Set the premium expiry, replacing any previous one.
    ///
    /// Durations do not stack: granting twice keeps only the second expiry.
    pub fn grant_premium(&mut self, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.premium_expires_at = Some(expires_at);
        self.touch(now);
    }

    /// Compute the expiry a purchase of `months` should grant under `policy`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a zero duration or one that overflows the calendar.
    pub fn premium_expiry_for(
        &self,
        months: u32,
        policy: PremiumGrantPolicy,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        if months == 0 {
            return Err(EntitlementError::InvalidAmount(
                "premium duration must be at least one month".into(),
            ));
        }

        let base = match policy {
            PremiumGrantPolicy::Overwrite => now,
            PremiumGrantPolicy::Extend => self
                .premium_expires_at
                .filter(|expires| *expires > now)
                .unwrap_or(now),
        };

        base.checked_add_months(Months::new(months)).ok_or_else(|| {
            EntitlementError::InvalidAmount(format!("premium duration overflows: {months} months"))
        })
    }

    // ========================================================================
    // Coins
    // ========================================================================

    /// Add coins to the balance.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if `amount <= 0` or the balance would overflow.
    pub fn credit_coins(&mut self, amount: i64, now: DateTime<Utc>) -> Result<i64> {
        ensure_positive(amount, "credit")?;
        let balance = self.coin_balance.checked_add(amount).ok_or_else(|| {
            EntitlementError::InvalidAmount(format!("credit of {amount} overflows balance"))
        })?;

        self.coin_balance = balance;
        self.touch(now);
        Ok(balance)
    }

    /// Spend coins if the balance covers `amount`.
    ///
    /// Returns `false` and leaves the record untouched when it does not.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if `amount <= 0`.
    pub fn debit_coins(&mut self, amount: i64, now: DateTime<Utc>) -> Result<bool> {
        ensure_positive(amount, "debit")?;
        if self.coin_balance < amount {
            return Ok(false);
        }

        self.coin_balance -= amount;
        self.lifetime_coins_spent = self.lifetime_coins_spent.saturating_add(amount);
        self.touch(now);
        Ok(true)
    }

    // ========================================================================
    // Chapters
    // ========================================================================

    /// Buy permanent access to a chapter.
    ///
    /// A chapter that is already unlocked is reported as such and costs nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if `cost <= 0`.
    pub fn unlock_chapter(
        &mut self,
        chapter_id: &ChapterId,
        cost: i64,
        now: DateTime<Utc>,
    ) -> Result<UnlockOutcome> {
        ensure_positive(cost, "unlock cost")?;
        if self.unlocked_chapters.contains(chapter_id) {
            return Ok(UnlockOutcome::AlreadyUnlocked);
        }

        let balance = self.coin_balance;
        if !self.debit_coins(cost, now)? {
            return Ok(UnlockOutcome::InsufficientCoins {
                balance,
                required: cost,
            });
        }

        self.unlocked_chapters.insert(chapter_id.clone());
        Ok(UnlockOutcome::Unlocked)
    }

    /// Whether the chapter is readable at `now`: premium is active or it was bought.
    #[must_use]
    pub fn is_chapter_unlocked(&self, chapter_id: &ChapterId, now: DateTime<Utc>) -> bool {
        self.is_premium_active(now) || self.unlocked_chapters.contains(chapter_id)
    }

    /// Writer capabilities at `now`.
    #[must_use]
    pub fn writer_feature_limits(&self, now: DateTime<Utc>) -> WriterFeatureLimits {
        WriterFeatureLimits::for_premium(self.is_premium_active(now))
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Look up a logged transaction by order id.
    #[must_use]
    pub fn transaction(&self, order_id: &OrderId) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| &tx.id == order_id)
    }

    /// A newest-first page of the log.
    #[must_use]
    pub fn transactions_page(&self, limit: usize, offset: usize) -> &[Transaction] {
        let start = offset.min(self.transactions.len());
        let end = start.saturating_add(limit).min(self.transactions.len());
        &self.transactions[start..end]
    }

    /// Add a transaction to the log, at most once per order id.
    ///
    /// - unseen order id: prepended (`Appended`)
    /// - same order id, same status: ignored (`Duplicate`)
    /// - pending arriving after a final status: ignored (`Duplicate`)
    /// - pending entry receiving a terminal status: status updated in place (`Settled`)
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the price is not positive.
    /// - `MismatchedTransaction` if a known order id carries another package or price.
    /// - `ConflictingTransaction` for any other status change of a known order.
    pub fn record_transaction(
        &mut self,
        tx: Transaction,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        ensure_positive(tx.amount_minor_units, "transaction amount")?;

        let Some(existing) = self.transactions.iter_mut().find(|t| t.id == tx.id) else {
            self.transactions.insert(0, tx);
            self.touch(now);
            return Ok(RecordOutcome::Appended);
        };

        if existing.kind != tx.kind || existing.amount_minor_units != tx.amount_minor_units {
            return Err(EntitlementError::MismatchedTransaction {
                order_id: tx.id.to_string(),
            });
        }

        if existing.status == tx.status
            || (existing.status.is_terminal() && tx.status == TransactionStatus::Pending)
        {
            return Ok(RecordOutcome::Duplicate);
        }

        if existing.status == TransactionStatus::Pending && tx.status.is_terminal() {
            existing.status = tx.status;
            self.touch(now);
            return Ok(RecordOutcome::Settled);
        }

        Err(EntitlementError::ConflictingTransaction {
            order_id: tx.id.to_string(),
            recorded: existing.status,
            incoming: tx.status,
        })
    }

    /// Record a payment result and, the first time it reports success, apply its grant.
    ///
    /// The grant comes from the logged entry for the order. Coin purchases credit the
    /// package coins; premium purchases move the expiry as decided by `policy`. Replays
    /// of an already-applied result change nothing. On error the record is left exactly
    /// as it was.
    ///
    /// # Errors
    ///
    /// Same as [`record_transaction`](Self::record_transaction), plus `InvalidAmount`
    /// for a grant that cannot be applied.
    pub fn settle_payment(
        &mut self,
        tx: Transaction,
        policy: PremiumGrantPolicy,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        let mut next = self.clone();
        let order_id = tx.id.clone();
        let succeeded = tx.is_success();

        let outcome = next.record_transaction(tx, now)?;
        let grant = next
            .transaction(&order_id)
            .map(|logged| logged.kind)
            .filter(|_| succeeded && outcome != RecordOutcome::Duplicate);
        if let Some(grant) = grant {
            match grant {
                TransactionKind::CoinPurchase { coins } => {
                    next.credit_coins(coins, now)?;
                    next.lifetime_coins_purchased =
                        next.lifetime_coins_purchased.saturating_add(coins);
                }
                TransactionKind::PremiumPurchase { months } => {
                    let expires_at = next.premium_expiry_for(months, policy, now)?;
                    next.grant_premium(expires_at, now);
                }
            }
        }

        *self = next;
        Ok(outcome)
    }
}

fn ensure_positive(amount: i64, what: &str) -> Result<()> {
    if amount <= 0 {
        return Err(EntitlementError::InvalidAmount(format!(
            "{what} must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// Result of [`EntitlementState::record_transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// First time this order id was seen.
    Appended,
    /// Already recorded with the same status; nothing changed.
    Duplicate,
    /// A pending entry moved to its final status.
    Settled,
}

impl RecordOutcome {
    /// Short wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Appended => "appended",
            Self::Duplicate => "duplicate",
            Self::Settled => "settled",
        }
    }
}

/// Result of [`EntitlementState::unlock_chapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Coins were spent and the chapter added.
    Unlocked,
    /// The chapter was already bought; no coins spent.
    AlreadyUnlocked,
    /// The balance does not cover the cost; nothing changed.
    InsufficientCoins {
        /// Balance at the time of the attempt.
        balance: i64,
        /// Cost of the chapter.
        required: i64,
    },
}

impl UnlockOutcome {
    /// Whether the caller now has access to the chapter.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Unlocked | Self::AlreadyUnlocked)
    }
}

/// How a premium purchase moves an existing expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumGrantPolicy {
    /// The new window starts now, discarding any remaining time.
    #[default]
    Overwrite,
    /// The new window starts at the current expiry if that is still in the future.
    Extend,
}

impl FromStr for PremiumGrantPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "extend" => Ok(Self::Extend),
            other => Err(format!("unknown premium grant policy: {other}")),
        }
    }
}

impl fmt::Display for PremiumGrantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Extend => f.write_str("extend"),
        }
    }
}

/// What a writer may do, as a function of premium status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterFeatureLimits {
    /// Novels allowed, or [`UNLIMITED`].
    pub max_novels: i32,
    /// Chapters allowed, or [`UNLIMITED`].
    pub max_chapters: i32,
    /// May publish novels and chapters.
    pub can_publish: bool,
    /// May earn revenue from readers.
    pub can_earn_revenue: bool,
    /// May use the advanced editor.
    pub can_use_advanced_editor: bool,
    /// May view analytics.
    pub can_access_analytics: bool,
}

impl WriterFeatureLimits {
    /// Limits while premium is active.
    pub const PREMIUM: Self = Self {
        max_novels: UNLIMITED,
        max_chapters: UNLIMITED,
        can_publish: true,
        can_earn_revenue: true,
        can_use_advanced_editor: true,
        can_access_analytics: true,
    };

    /// Limits without premium.
    pub const FREE: Self = Self {
        max_novels: FREE_MAX_NOVELS,
        max_chapters: FREE_MAX_CHAPTERS,
        can_publish: false,
        can_earn_revenue: false,
        can_use_advanced_editor: false,
        can_access_analytics: false,
    };

    /// Pick the limits for a premium status.
    #[must_use]
    pub const fn for_premium(premium_active: bool) -> Self {
        if premium_active {
            Self::PREMIUM
        } else {
            Self::FREE
        }
    }

    /// Whether a writer holding `existing` novels may create another.
    #[must_use]
    pub fn allows_another_novel(&self, existing: u32) -> bool {
        within_limit(self.max_novels, existing)
    }

    /// Whether a novel holding `existing` chapters may get another.
    #[must_use]
    pub fn allows_another_chapter(&self, existing: u32) -> bool {
        within_limit(self.max_chapters, existing)
    }
}

fn within_limit(limit: i32, existing: u32) -> bool {
    limit == UNLIMITED || u32::try_from(limit).is_ok_and(|max| existing < max)
}
