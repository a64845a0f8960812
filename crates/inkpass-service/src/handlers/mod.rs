//! API handlers.

pub mod admin;
pub mod chapters;
pub mod entitlements;
pub mod health;
pub mod internal;
pub mod payments;

use inkpass_core::{ChapterId, OrderId, UserId};

use crate::error::ApiError;

/// Parse a user id from a path or body field.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid user id: {raw}")))
}

/// Parse a chapter id from a path segment.
pub(crate) fn parse_chapter_id(raw: String) -> Result<ChapterId, ApiError> {
    ChapterId::new(raw).map_err(|e| ApiError::BadRequest(format!("invalid chapter id: {e}")))
}

/// Parse a payment order id.
pub(crate) fn parse_order_id(raw: String) -> Result<OrderId, ApiError> {
    OrderId::new(raw).map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))
}
