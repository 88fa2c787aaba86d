//! Ticket protocol error types

use thiserror::Error;

use crate::card::StorageError;

/// Errors that halt an issuance or redemption
///
/// Running out of rides or time is not an error; those outcomes come back as a
/// [`Ticket`](super::Ticket) carrying a [`Denial`](super::Denial).
#[derive(Error, Debug)]
pub enum TicketError {
    /// Card carries an app tag from another issuer or schema version
    #[error("foreign card: unrecognized app tag {tag:?}")]
    ForeignCard {
        /// Tag as read from the card (lossy ASCII)
        tag: String,
    },

    /// Card was never issued a ticket
    #[error("blank card: no ticket issued")]
    BlankCard,

    /// Card rejected the derived key
    #[error("authentication failed")]
    Authentication,

    /// Stored MAC does not match the ticket data
    #[error("integrity check failed: ticket data does not match its MAC")]
    Integrity,

    /// Top-up would breach the card's safe counter bounds
    #[error("safe limits exceeded: counter {counter}, limit {limit}, requested {uses}")]
    LimitExceeded {
        /// Current usage counter
        counter: u32,
        /// Current ride limit
        limit: u32,
        /// Rides requested
        uses: u32,
    },

    /// Caller asked for something the protocol cannot encode
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Card I/O failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Memory map is inconsistent
    #[error("memory layout error: {0}")]
    Layout(#[from] LayoutError),
}

impl TicketError {
    /// Whether the failure may indicate fraud and must be logged as a security event
    #[must_use]
    pub const fn is_security_event(&self) -> bool {
        matches!(
            self,
            Self::ForeignCard { .. }
                | Self::Authentication
                | Self::Integrity
                | Self::LimitExceeded { .. }
        )
    }
}

/// Memory map validation errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// Two fields claim the same page
    #[error("fields {first} and {second} overlap")]
    Overlap {
        /// First field
        first: &'static str,
        /// Second field
        second: &'static str,
    },

    /// Field is empty or extends past the end of the card
    #[error("field {field} (page {start_page}, {page_count} pages) is out of range")]
    OutOfRange {
        /// Offending field
        field: &'static str,
        /// First page
        start_page: u8,
        /// Page count
        page_count: u8,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TicketError>;
