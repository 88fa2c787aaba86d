//! Ultraticket - transit tickets on MIFARE Ultralight C memory cards
//!
//! The card has no processor: it is a page store with a key challenge. All
//! protocol logic lives here, in the reader. Each card authenticates with a key
//! derived from its UID and the issuer's master secret, and the ride counters
//! are bound together by a MAC under a separate issuer key.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ultraticket::{MemoryCard, Secrets, TicketEngine};
//!
//! let card = MemoryCard::blank([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
//! let secrets = Secrets::new(b"master secret", b"mac key");
//! let mut engine = TicketEngine::new(card, secrets)?;
//!
//! // Ten rides, valid for 30 days after the first one
//! engine.issue(30, 10)?;
//!
//! let ticket = engine.use_ticket()?;
//! assert!(ticket.is_valid());
//! assert_eq!(ticket.remaining_uses(), 9);
//! # Ok::<(), ultraticket::TicketError>(())
//! ```
//!
//! # Features
//!
//! - **Per-card keys** - SHA-256 of UID and master secret, never stored off-card
//! - **Tamper evidence** - truncated HMAC-SHA256 over counters and timestamps
//! - **Fail-closed writes** - the MAC is always written last
//! - **Activation latch** - validity counts from the first ride after issuance

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod card;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod protocol;

pub use card::{CardStorage, MemoryCard, StorageError};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, SafeLimits, Secrets};
pub use engine::TicketEngine;
pub use protocol::{
    CURRENT_APP_TAG, Denial, MAX_COUNTER_VALUE, MAX_RIDES_ALLOWED, MIN_RIDES_ALLOWED, Result,
    Ticket, TicketError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
