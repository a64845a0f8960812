//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.

use inkpass_core::{OrderId, UserId};

/// Create an entitlement key from a user ID.
///
/// The same key addresses the record and the unlocked set, in separate column families.
#[must_use]
pub fn entitlement_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a payment order key from an order ID.
#[must_use]
pub fn order_key(order_id: &OrderId) -> Vec<u8> {
    order_id.as_str().as_bytes().to_vec()
}

/// Decode a user ID stored as a 16-byte index value.
///
/// Returns `None` for values of the wrong length.
#[must_use]
pub fn decode_user_id(value: &[u8]) -> Option<UserId> {
    let bytes: [u8; 16] = value.try_into().ok()?;
    Some(UserId::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entitlement_key_length() {
        let user_id = UserId::generate();
        let key = entitlement_key(&user_id);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn order_key_is_raw_id() {
        let order_id = OrderId::new("INK-1717171717-ab12").unwrap();
        assert_eq!(order_key(&order_id), b"INK-1717171717-ab12".to_vec());
    }

    #[test]
    fn user_id_value_roundtrip() {
        let user_id = UserId::generate();
        let value = entitlement_key(&user_id);
        assert_eq!(decode_user_id(&value), Some(user_id));
        assert_eq!(decode_user_id(&value[..15]), None);
    }
}
