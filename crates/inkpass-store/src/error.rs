//! Error types for inkpass storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The record changed since it was read.
    #[error("version conflict: expected={expected}, actual={actual}")]
    VersionConflict {
        /// Version the writer read.
        expected: u64,
        /// Version currently stored (0 if absent).
        actual: u64,
    },

    /// A payment order id is already logged for a different user.
    #[error("order {order_id} belongs to another user")]
    OrderConflict {
        /// The order id.
        order_id: String,
    },

    /// The record was written by a newer schema than this build understands.
    #[error("unsupported schema version: {found} (supported up to {supported})")]
    UnsupportedSchema {
        /// Schema version on disk.
        found: u32,
        /// Newest schema version this build reads.
        supported: u32,
    },

    /// A legacy record could not be migrated.
    #[error("migration error: {0}")]
    Migration(String),
}
