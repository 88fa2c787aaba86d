//! Cryptographic primitives: per-card key derivation and the ticket MAC.

mod kdf;
mod mac;

pub use kdf::{DerivedKey, derive_auth_key};
pub use mac::{MacEngine, MacTag};

/// Length of the SHA-256 digest a card key is derived from.
pub const DERIVED_KEY_LEN: usize = 32;
/// Length of the key the card stores and authenticates with.
pub const CARD_KEY_LEN: usize = 16;
/// Length of the stored MAC tag (one page).
pub const MAC_TAG_LEN: usize = 4;
