//! HMAC-SHA256 over the canonical ticket record, truncated to one card page.

use core::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::MAC_TAG_LEN;

type HmacSha256 = Hmac<Sha256>;

/// Stored MAC tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacTag([u8; MAC_TAG_LEN]);

impl MacTag {
    /// Construct from a fixed-size array.
    #[must_use]
    pub const fn from_array(bytes: [u8; MAC_TAG_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; MAC_TAG_LEN] {
        &self.0
    }
}

/// Computes and verifies ticket MACs under the issuer's shared key.
#[derive(Clone)]
pub struct MacEngine {
    key: Zeroizing<Vec<u8>>,
}

impl MacEngine {
    /// Create an engine keyed with `key`.
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: Zeroizing::new(key.to_vec()),
        }
    }

    /// Compute the tag for `record`.
    #[must_use]
    pub fn generate_mac(&self, record: &[u8]) -> MacTag {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC key size is always valid");
        mac.update(record);
        let digest = mac.finalize().into_bytes();

        let mut tag = [0u8; MAC_TAG_LEN];
        tag.copy_from_slice(&digest[..MAC_TAG_LEN]);
        MacTag(tag)
    }

    /// Check `tag` against `record` in constant time.
    #[must_use]
    pub fn verify_mac(&self, record: &[u8], tag: &MacTag) -> bool {
        let expected = self.generate_mac(record);
        bool::from(expected.0[..].ct_eq(&tag.0[..]))
    }
}

impl fmt::Debug for MacEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacEngine")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
