//! Engine configuration and issuer secrets.

use core::fmt;

use zeroize::Zeroizing;

use crate::protocol::{
    APP_TAG_LEN, CURRENT_APP_TAG, MAX_COUNTER_VALUE, MAX_RIDES_ALLOWED, MIN_RIDES_ALLOWED,
};

/// Counter bounds enforced at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SafeLimits {
    /// Upper bound of the usage counter.
    pub max_counter_value: u32,
    /// Maximum rides a single issuance may add.
    pub max_rides_allowed: u32,
    /// Counter headroom below which a card is retired instead of topped up.
    pub min_rides_allowed: u32,
}

impl Default for SafeLimits {
    fn default() -> Self {
        Self {
            max_counter_value: MAX_COUNTER_VALUE,
            max_rides_allowed: MAX_RIDES_ALLOWED,
            min_rides_allowed: MIN_RIDES_ALLOWED,
        }
    }
}

/// Engine configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Schema tag written to, and expected on, every card.
    pub app_tag: [u8; APP_TAG_LEN],
    /// Safe counter bounds.
    pub limits: SafeLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_tag: CURRENT_APP_TAG,
            limits: SafeLimits::default(),
        }
    }
}

/// Issuer key material: the master secret cards keys derive from, and the MAC key.
#[derive(Clone)]
pub struct Secrets {
    master_secret: Zeroizing<Vec<u8>>,
    mac_key: Zeroizing<Vec<u8>>,
}

impl Secrets {
    /// Construct from raw bytes.
    #[must_use]
    pub fn new(master_secret: &[u8], mac_key: &[u8]) -> Self {
        Self {
            master_secret: Zeroizing::new(master_secret.to_vec()),
            mac_key: Zeroizing::new(mac_key.to_vec()),
        }
    }

    /// Construct from hex strings, as provisioned in reader configuration.
    pub fn from_hex(master_secret: &str, mac_key: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self {
            master_secret: Zeroizing::new(hex::decode(master_secret)?),
            mac_key: Zeroizing::new(hex::decode(mac_key)?),
        })
    }

    pub(crate) fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }

    pub(crate) fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("master_secret", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .finish()
    }
}
