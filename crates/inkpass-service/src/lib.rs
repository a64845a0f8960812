//! Inkpass HTTP API Service.
//!
//! This crate is the single authority over reader entitlements:
//!
//! - Coin balance, chapter unlocks and premium status
//! - Purchase history
//! - Payment-result callbacks from the payment provider
//! - Legacy record import and manual adjustments for admins
//!
//! All state changes go through [`EntitlementLedger`], which commits each operation
//! against the store with optimistic versioning.
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **JWT bearer tokens** - For readers and writers
//! 2. **Service API keys** - For other platform services (reader, editor)
//! 3. **Admin API keys** - For support tooling

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers call the synchronous ledger

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod routes;
pub mod state;

pub use auth::{JwksVerifier, TokenVerifier, VerifyFuture};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use ledger::{EntitlementLedger, Entitlements, LedgerError, Spend};
pub use routes::create_router;
pub use state::AppState;
