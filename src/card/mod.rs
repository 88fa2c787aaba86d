//! Card storage port
//!
//! The engine talks to the card through [`CardStorage`]: raw page reads and
//! writes plus the card's native key challenge. Radio transport and APDU framing
//! live behind an implementation of this trait.

mod memory;

use thiserror::Error;

use crate::crypto::CARD_KEY_LEN;

pub use memory::{DEFAULT_CARD_KEY, MemoryCard};

/// Errors surfaced by card I/O
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Page range falls outside the card
    #[error("pages {start_page}..{end_page} out of range")]
    OutOfRange {
        /// First page requested
        start_page: u8,
        /// One past the last page requested
        end_page: u16,
    },

    /// Caller buffer cannot hold the requested pages
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes available
        got: usize,
    },

    /// Page is protected and the session is not authenticated
    #[error("access to page {page} denied without authentication")]
    AccessDenied {
        /// First protected page touched
        page: u8,
    },

    /// Page is read-only (UID) or one-way (counter)
    #[error("page {page} is write-protected")]
    WriteProtected {
        /// Page that refused the write
        page: u8,
    },

    /// The one-way counter refused a lower value
    #[error("counter rollback refused: {current} -> {requested}")]
    CounterRollback {
        /// Value stored on the card
        current: u32,
        /// Value the write attempted
        requested: u32,
    },

    /// Card left the field mid-transaction
    #[error("card removed during write")]
    Torn,

    /// Reader-level failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Synchronous page-level access to a presented card
///
/// Page numbers and counts are in 4-byte page units.
pub trait CardStorage {
    /// Read `page_count` pages starting at `start_page` into `out[offset..]`.
    fn read_pages(
        &mut self,
        start_page: u8,
        page_count: u8,
        out: &mut [u8],
        offset: usize,
    ) -> Result<(), StorageError>;

    /// Write `page_count` pages from `data[offset..]` starting at `start_page`.
    fn write_pages(
        &mut self,
        data: &[u8],
        offset: usize,
        start_page: u8,
        page_count: u8,
    ) -> Result<(), StorageError>;

    /// Run the card's key challenge. `Ok(false)` means the card rejected the key.
    fn authenticate(&mut self, key: &[u8; CARD_KEY_LEN]) -> Result<bool, StorageError>;
}

impl<T: CardStorage + ?Sized> CardStorage for &mut T {
    fn read_pages(
        &mut self,
        start_page: u8,
        page_count: u8,
        out: &mut [u8],
        offset: usize,
    ) -> Result<(), StorageError> {
        (**self).read_pages(start_page, page_count, out, offset)
    }

    fn write_pages(
        &mut self,
        data: &[u8],
        offset: usize,
        start_page: u8,
        page_count: u8,
    ) -> Result<(), StorageError> {
        (**self).write_pages(data, offset, start_page, page_count)
    }

    fn authenticate(&mut self, key: &[u8; CARD_KEY_LEN]) -> Result<bool, StorageError> {
        (**self).authenticate(key)
    }
}
