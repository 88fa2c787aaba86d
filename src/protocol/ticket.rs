//! Result of a single redemption attempt

use core::fmt;

/// Why a genuine card was refused a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Usage counter reached the ride limit
    Exhausted,
    /// Validity window elapsed
    Expired,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("no rides left"),
            Self::Expired => f.write_str("ticket expired"),
        }
    }
}

/// Outcome of `use_ticket`, created fresh per tap and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    valid: bool,
    remaining_uses: u32,
    expiry_time: u32,
    denial: Option<Denial>,
}

impl Ticket {
    /// A ride was granted
    #[must_use]
    pub const fn accepted(remaining_uses: u32, expiry_time: u32) -> Self {
        Self {
            valid: true,
            remaining_uses,
            expiry_time,
            denial: None,
        }
    }

    /// A ride was refused; remaining uses always read as zero
    #[must_use]
    pub const fn denied(denial: Denial, expiry_time: u32) -> Self {
        Self {
            valid: false,
            remaining_uses: 0,
            expiry_time,
            denial: Some(denial),
        }
    }

    /// Whether the ride was granted
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Rides left after this one
    #[must_use]
    pub const fn remaining_uses(&self) -> u32 {
        self.remaining_uses
    }

    /// Expiry in epoch minutes (0 if the ticket was never activated)
    #[must_use]
    pub const fn expiry_time(&self) -> u32 {
        self.expiry_time
    }

    /// Reason for refusal
    #[must_use]
    pub const fn denial(&self) -> Option<Denial> {
        self.denial
    }
}
