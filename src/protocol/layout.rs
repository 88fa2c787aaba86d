//! Card memory map
//!
//! Every logical field lives in a contiguous page range. This table is the only
//! place page offsets are defined; the engine addresses fields through it.
//!
//! ```text
//! page  0-1   UID (7 bytes + BCC0)         page  9   activation timestamp
//! page  4-5   app tag                      page 10   validity period (minutes)
//! page  6     ride limit counter           page 39   MAC
//! page  7     counter last value (legacy)  page 41   usage counter
//! page  8     issuing timestamp            page 42-43 AUTH0 / AUTH1
//!                                          page 44-47 authentication key
//! ```

use super::{CARD_PAGES, LayoutError, PAGE_SIZE};

/// A named page range on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Human-readable field name (used in logs and errors)
    pub name: &'static str,
    /// First page of the field
    pub start_page: u8,
    /// Number of pages the field spans
    pub page_count: u8,
}

impl Field {
    const fn new(name: &'static str, start_page: u8, page_count: u8) -> Self {
        Self {
            name,
            start_page,
            page_count,
        }
    }

    /// Field size in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.page_count as usize * PAGE_SIZE
    }

    /// Whether the field spans zero pages
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.page_count == 0
    }

    /// One past the last page of the field
    #[must_use]
    pub const fn end_page(&self) -> u16 {
        self.start_page as u16 + self.page_count as u16
    }

    const fn overlaps(&self, other: &Self) -> bool {
        (self.start_page as u16) < other.end_page() && (other.start_page as u16) < self.end_page()
    }
}

/// UID bytes plus BCC0; the significant bytes are extracted by the engine
pub const UID: Field = Field::new("uid", 0, 2);
/// Schema version tag
pub const APP_TAG: Field = Field::new("app_tag", 4, 2);
/// Counter value at which the ticket is exhausted
pub const RIDE_LIMIT: Field = Field::new("ride_limit", 6, 1);
/// Reserved; kept in the table so nothing else claims the page
pub const COUNTER_LAST_VALUE: Field = Field::new("counter_last_value", 7, 1);
/// Epoch minutes of the last issuance
pub const ISSUING_TS: Field = Field::new("issuing_ts", 8, 1);
/// Epoch minutes of the first ride after issuance, `ZERO_TS` until then
pub const ACTIVATION_TS: Field = Field::new("activation_ts", 9, 1);
/// Ticket lifetime in minutes, counted from activation
pub const VALIDITY: Field = Field::new("validity", 10, 1);
/// Truncated MAC over the canonical record
pub const MAC: Field = Field::new("mac", 39, 1);
/// Rides consumed so far
pub const USAGE_COUNTER: Field = Field::new("usage_counter", 41, 1);
/// First page that requires authentication
pub const AUTH0: Field = Field::new("auth0", 42, 1);
/// Protection mode for pages at or above AUTH0
pub const AUTH1: Field = Field::new("auth1", 43, 1);
/// 3DES authentication key (write-only)
pub const AUTH_KEY: Field = Field::new("auth_key", 44, 4);

/// Pages from here on require authentication; app tag and UID stay readable
pub const AUTH0_START_PAGE: u8 = 6;

/// AUTH1 mode: 0 restricts reads and writes, 1 restricts writes only
pub const AUTH1_MODE: u8 = 0;

/// All fields, in page order
pub const FIELDS: [Field; 12] = [
    UID,
    APP_TAG,
    RIDE_LIMIT,
    COUNTER_LAST_VALUE,
    ISSUING_TS,
    ACTIVATION_TS,
    VALIDITY,
    MAC,
    USAGE_COUNTER,
    AUTH0,
    AUTH1,
    AUTH_KEY,
];

/// Check the table for overlapping or out-of-range fields
pub fn validate() -> Result<(), LayoutError> {
    validate_fields(&FIELDS)
}

fn validate_fields(fields: &[Field]) -> Result<(), LayoutError> {
    for (idx, field) in fields.iter().enumerate() {
        if field.is_empty() || field.end_page() > u16::from(CARD_PAGES) {
            return Err(LayoutError::OutOfRange {
                field: field.name,
                start_page: field.start_page,
                page_count: field.page_count,
            });
        }
        if let Some(other) = fields[idx + 1..].iter().find(|other| field.overlaps(other)) {
            return Err(LayoutError::Overlap {
                first: field.name,
                second: other.name,
            });
        }
    }
    Ok(())
}
