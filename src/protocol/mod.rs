//! Ticket protocol core
//!
//! This module provides the on-card memory map, the canonical metadata record,
//! the byte codec and the caller-visible result types.

mod codec;
mod error;
pub mod layout;
mod record;
mod ticket;

pub use codec::{bytes_to_int, concat, int_to_bytes};
pub use error::{LayoutError, Result, TicketError};
pub use record::{RECORD_LEN, TicketRecord};
pub use ticket::{Denial, Ticket};

/// Page size in bytes
pub const PAGE_SIZE: usize = 4;

/// Number of user-addressable pages on an Ultralight C card (192 bytes)
pub const CARD_PAGES: u8 = 48;

/// App tag written by this schema version: "NFC0.0.0" in ASCII
pub const CURRENT_APP_TAG: [u8; APP_TAG_LEN] = *b"NFC0.0.0";

/// App tag length in bytes
pub const APP_TAG_LEN: usize = 8;

/// Significant UID bytes (page 0 BCC excluded)
pub const UID_LEN: usize = 7;

/// Activation timestamp sentinel meaning "not yet activated"
pub const ZERO_TS: u32 = 0;

/// Upper bound of the usage counter's representable range (16-bit hardware counter)
pub const MAX_COUNTER_VALUE: u32 = 0xFFFF;

/// Maximum rides a single issuance may add
pub const MAX_RIDES_ALLOWED: u32 = 100;

/// Counter headroom below which a card is end-of-life
pub const MIN_RIDES_ALLOWED: u32 = 30;

/// Minutes per validity day
pub const MINUTES_PER_DAY: u32 = 24 * 60;
