//! Little-endian integer codec and record concatenation
//!
//! Every integer stored on the card, the counters included, is a little-endian
//! `u32` occupying exactly one page.

use bytes::{BufMut, Bytes, BytesMut};

/// Encode a `u32` as four little-endian bytes
#[must_use]
pub const fn int_to_bytes(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Decode four little-endian bytes into a `u32`
///
/// # Panics
///
/// Panics if `bytes` is not exactly four bytes long. Field widths come from the
/// memory map, so a wrong length is a programming error.
#[must_use]
pub fn bytes_to_int(bytes: &[u8]) -> u32 {
    assert_eq!(bytes.len(), 4, "integer fields are exactly one page wide");
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Concatenate buffers in order into a single record
#[must_use]
pub fn concat(parts: &[&[u8]]) -> Bytes {
    let total_size = parts.iter().map(|part| part.len()).sum();
    let mut out = BytesMut::with_capacity(total_size);
    for part in parts {
        out.put_slice(part);
    }
    out.freeze()
}
