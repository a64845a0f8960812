//! Error types for inkpass entitlement operations.

use crate::ids::IdError;
use crate::transaction::TransactionStatus;

/// Result type for entitlement operations.
pub type Result<T> = std::result::Result<T, EntitlementError>;

/// Errors that can occur when applying an entitlement operation.
///
/// Running out of coins is not an error: debits and unlocks report it through their
/// return value, since callers are expected to branch on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementError {
    /// Non-positive or overflowing amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A transaction with this order id was already recorded with an incompatible status.
    #[error("conflicting transaction {order_id}: recorded as {recorded}, received {incoming}")]
    ConflictingTransaction {
        /// The order id.
        order_id: String,
        /// Status already in the log.
        recorded: TransactionStatus,
        /// Status carried by the rejected transaction.
        incoming: TransactionStatus,
    },

    /// A known order id arrived with a different package or price than was logged.
    #[error("mismatched transaction {order_id}: does not match the logged purchase")]
    MismatchedTransaction {
        /// The order id.
        order_id: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Package id not present in the catalog.
    #[error("unknown package: {0}")]
    UnknownPackage(String),

    /// A legacy record could not be migrated.
    #[error("migration error: {0}")]
    Migration(String),
}
