//! Key helpers.
//!
//! Partition and row keys may not contain `/`, `\`, `#`, `?` or control
//! characters. Free text is stored as a key after URL-safe base64 encoding,
//! whose `-` and `_` are allowed in keys. Keys written with the standard
//! alphabet by earlier versions still decode.

use crate::error::{TableError, TableResult};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use uuid::Uuid;

/// A fresh random identifier: 32 lowercase hex digits, no hyphens.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// URL-safe base64 of the UTF-8 bytes of `value`.
pub fn encode_key(value: &str) -> String {
    URL_SAFE.encode(value.as_bytes())
}

/// Reverses [`encode_key`]. Also accepts the standard alphabet.
pub fn decode_key(encoded: &str) -> TableResult<String> {
    let engine = if encoded.contains(['+', '/']) {
        STANDARD
    } else {
        URL_SAFE
    };
    let bytes = engine
        .decode(encoded)
        .map_err(|e| TableError::invalid_argument("encoded", format!("not base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| TableError::invalid_argument("encoded", format!("not UTF-8: {e}")))
}
