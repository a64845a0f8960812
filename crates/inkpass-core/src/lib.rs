//! Core types and state transitions for inkpass.
//!
//! This crate provides the foundational types of the reading platform's access model:
//!
//! - **Identifiers**: `UserId`, `ChapterId`, `OrderId`
//! - **Entitlements**: `EntitlementState`, `WriterFeatureLimits`, `UnlockOutcome`
//! - **Transactions**: `Transaction`, `TransactionKind`, `TransactionStatus`
//! - **Catalog**: `Catalog`, `CoinPackage`, `PremiumPackage`
//! - **Time**: `Clock`, `SystemClock`, `ManualClock`
//!
//! # Coins and Premium
//!
//! Coins are spent to unlock single chapters permanently. Premium is a time-boxed
//! window that opens every chapter and the full writer toolset while it lasts.
//!
//! - Coin balance is an `i64` that never goes negative
//! - Premium activity is derived from the stored expiry at read time, never stored
//! - Prices are in IDR, which has no minor unit in practice

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod clock;
pub mod entitlement;
pub mod error;
pub mod ids;
pub mod transaction;

pub use catalog::{
    Catalog, CoinPackage, Package, PremiumPackage, COIN_PACKAGES, DEFAULT_CHAPTER_UNLOCK_COST,
    PREMIUM_PACKAGES,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entitlement::{
    EntitlementState, PremiumGrantPolicy, RecordOutcome, UnlockOutcome, WriterFeatureLimits,
    FREE_MAX_CHAPTERS, FREE_MAX_NOVELS, UNLIMITED,
};
pub use error::{EntitlementError, Result};
pub use ids::{ChapterId, IdError, OrderId, UserId};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
