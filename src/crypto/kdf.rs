//! Per-card authentication key derivation: `SHA-256(uid || master_secret)`.

use core::fmt;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{CARD_KEY_LEN, DERIVED_KEY_LEN};

/// Key derived for one card. Wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey(Zeroizing<[u8; DERIVED_KEY_LEN]>);

impl DerivedKey {
    /// Borrow the full digest.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.0
    }

    /// The 16-byte prefix written to the card's key pages.
    #[must_use]
    pub fn card_key(&self) -> Zeroizing<[u8; CARD_KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; CARD_KEY_LEN]);
        key.copy_from_slice(&self.0[..CARD_KEY_LEN]);
        key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DerivedKey").field(&"[REDACTED]").finish()
    }
}

/// Derive the authentication key for the card identified by `uid`.
#[must_use]
pub fn derive_auth_key(uid: &[u8], master_secret: &[u8]) -> DerivedKey {
    let mut input = Zeroizing::new(Vec::with_capacity(uid.len() + master_secret.len()));
    input.extend_from_slice(uid);
    input.extend_from_slice(master_secret);

    let mut digest = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    digest.copy_from_slice(&Sha256::digest(input.as_slice()));
    DerivedKey(digest)
}
