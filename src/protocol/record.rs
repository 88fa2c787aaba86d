//! Canonical ticket metadata record
//!
//! The record is what the MAC covers. Its byte order is a fixed contract shared
//! by issuance and redemption:
//!
//! ```text
//! +-----------------+-------------+---------------+-------------+---------------+-------------+
//! | app tag (8)     | ride limit  | usage counter | issuing ts  | activation ts | validity    |
//! |                 | (4, LE)     | (4, LE)       | (4, LE)     | (4, LE)       | (4, LE)     |
//! +-----------------+-------------+---------------+-------------+---------------+-------------+
//! ```

use bytes::Bytes;

use super::{APP_TAG_LEN, ZERO_TS, concat, int_to_bytes};

/// Encoded record length in bytes
pub const RECORD_LEN: usize = APP_TAG_LEN + 5 * 4;

/// Ticket metadata as stored on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketRecord {
    /// Schema version tag
    pub app_tag: [u8; APP_TAG_LEN],
    /// Counter value at which the ticket is exhausted
    pub ride_limit: u32,
    /// Rides consumed so far
    pub usage_counter: u32,
    /// Epoch minutes of the last issuance
    pub issuing_ts: u32,
    /// Epoch minutes of the first ride, [`ZERO_TS`] until activated
    pub activation_ts: u32,
    /// Ticket lifetime in minutes from activation
    pub validity_minutes: u32,
}

impl TicketRecord {
    /// Rides left before the ticket is exhausted
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.ride_limit.saturating_sub(self.usage_counter)
    }

    /// Whether the activation latch is still open
    #[must_use]
    pub const fn is_activated(&self) -> bool {
        self.activation_ts != ZERO_TS
    }

    /// Expiry in epoch minutes, `None` before activation
    #[must_use]
    pub const fn expiry(&self) -> Option<u32> {
        if self.is_activated() {
            Some(self.activation_ts.saturating_add(self.validity_minutes))
        } else {
            None
        }
    }

    /// Encode in canonical order
    #[must_use]
    pub fn encode(&self) -> Bytes {
        concat(&[
            &self.app_tag,
            &int_to_bytes(self.ride_limit),
            &int_to_bytes(self.usage_counter),
            &int_to_bytes(self.issuing_ts),
            &int_to_bytes(self.activation_ts),
            &int_to_bytes(self.validity_minutes),
        ])
    }
}
