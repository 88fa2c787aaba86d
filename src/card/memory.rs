//! In-memory model of a MIFARE Ultralight C page store.
//!
//! Models the behaviour the ticket protocol depends on: read-only UID pages,
//! write-only key pages, AUTH0/AUTH1 access control, a one-way counter page and
//! card removal part-way through a multi-page write.

use tracing::{debug, trace};

use super::{CardStorage, StorageError};
use crate::crypto::CARD_KEY_LEN;
use crate::protocol::layout::{AUTH_KEY, AUTH0, AUTH1, USAGE_COUNTER};
use crate::protocol::{CARD_PAGES, PAGE_SIZE, UID_LEN, bytes_to_int};

/// Factory transport key of a fresh Ultralight C
pub const DEFAULT_CARD_KEY: [u8; CARD_KEY_LEN] = *b"BREAKMEIFYOUCAN!";

/// Cascade tag byte folded into BCC0
const CASCADE_TAG: u8 = 0x88;

/// Pages 0..3 hold UID, check bytes and lock bits
const READ_ONLY_PAGES: u8 = 3;

type Page = [u8; PAGE_SIZE];

/// Software card used by tests, benches and the demo reader.
#[derive(Debug, Clone)]
pub struct MemoryCard {
    pages: [Page; CARD_PAGES as usize],
    key: [u8; CARD_KEY_LEN],
    authenticated: bool,
    writes: usize,
    tear_after: Option<usize>,
    torn: bool,
}

impl MemoryCard {
    /// A factory-fresh card: no protection, default key, zeroed user memory.
    #[must_use]
    pub fn blank(uid: [u8; UID_LEN]) -> Self {
        let mut pages = [[0u8; PAGE_SIZE]; CARD_PAGES as usize];
        let bcc0 = CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2];
        let bcc1 = uid[3] ^ uid[4] ^ uid[5] ^ uid[6];
        pages[0] = [uid[0], uid[1], uid[2], bcc0];
        pages[1] = [uid[3], uid[4], uid[5], uid[6]];
        pages[2][0] = bcc1;
        // AUTH0 past the last page disables protection
        pages[usize::from(AUTH0.start_page)][0] = CARD_PAGES;

        Self {
            pages,
            key: DEFAULT_CARD_KEY,
            authenticated: false,
            writes: 0,
            tear_after: None,
            torn: false,
        }
    }

    /// The card's 7-byte UID.
    #[must_use]
    pub fn uid(&self) -> [u8; UID_LEN] {
        let (p0, p1) = (self.pages[0], self.pages[1]);
        [p0[0], p0[1], p0[2], p1[0], p1[1], p1[2], p1[3]]
    }

    /// Raw page contents, ignoring access control.
    #[must_use]
    pub fn raw_page(&self, page: u8) -> [u8; PAGE_SIZE] {
        self.pages[usize::from(page)]
    }

    /// Overwrite a page directly, ignoring access control (models a lab attacker).
    pub fn overwrite_page(&mut self, page: u8, bytes: [u8; PAGE_SIZE]) {
        self.pages[usize::from(page)] = bytes;
    }

    /// Number of pages successfully written through [`CardStorage`].
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.writes
    }

    /// Whether the current session passed the key challenge.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Pull the card out of the field after `pages` more page writes.
    pub fn tear_after(&mut self, pages: usize) {
        self.tear_after = Some(pages);
    }

    /// Present the card again: clears the session and any pending tear.
    pub fn reinsert(&mut self) {
        self.authenticated = false;
        self.tear_after = None;
        self.torn = false;
    }

    /// Hex dump of every page, one page per line.
    #[cfg(feature = "debug-tools")]
    #[must_use]
    pub fn dump(&self) -> String {
        self.pages
            .iter()
            .enumerate()
            .map(|(idx, page)| format!("{idx:02}: {}\n", hex::encode(page)))
            .collect()
    }

    fn auth0(&self) -> u8 {
        self.pages[usize::from(AUTH0.start_page)][0]
    }

    fn read_protected(&self) -> bool {
        self.pages[usize::from(AUTH1.start_page)][0] & 0x01 == 0
    }

    fn check_range(start_page: u8, page_count: u8) -> Result<(), StorageError> {
        let end_page = u16::from(start_page) + u16::from(page_count);
        if page_count == 0 || end_page > u16::from(CARD_PAGES) {
            return Err(StorageError::OutOfRange {
                start_page,
                end_page,
            });
        }
        Ok(())
    }

    fn check_buffer(len: usize, offset: usize, page_count: u8) -> Result<(), StorageError> {
        let needed = offset
            .checked_add(usize::from(page_count) * PAGE_SIZE)
            .ok_or(StorageError::BufferTooSmall {
                needed: usize::MAX,
                got: len,
            })?;
        if len < needed {
            return Err(StorageError::BufferTooSmall { needed, got: len });
        }
        Ok(())
    }

    fn write_page(&mut self, page: u8, bytes: Page) -> Result<(), StorageError> {
        if page < READ_ONLY_PAGES {
            return Err(StorageError::WriteProtected { page });
        }

        if page == USAGE_COUNTER.start_page {
            let current = bytes_to_int(&self.pages[usize::from(page)]);
            let requested = bytes_to_int(&bytes);
            if requested < current {
                return Err(StorageError::CounterRollback { current, requested });
            }
        }

        if let Some(budget) = self.tear_after.as_mut() {
            if *budget == 0 {
                self.torn = true;
                debug!(page, "card torn mid-write");
                return Err(StorageError::Torn);
            }
            *budget -= 1;
        }

        if (AUTH_KEY.start_page..AUTH_KEY.start_page + AUTH_KEY.page_count).contains(&page) {
            let at = usize::from(page - AUTH_KEY.start_page) * PAGE_SIZE;
            self.key[at..at + PAGE_SIZE].copy_from_slice(&bytes);
        } else {
            self.pages[usize::from(page)] = bytes;
        }
        self.writes += 1;
        Ok(())
    }
}

impl CardStorage for MemoryCard {
    fn read_pages(
        &mut self,
        start_page: u8,
        page_count: u8,
        out: &mut [u8],
        offset: usize,
    ) -> Result<(), StorageError> {
        if self.torn {
            return Err(StorageError::Torn);
        }
        Self::check_range(start_page, page_count)?;
        Self::check_buffer(out.len(), offset, page_count)?;

        let end_page = start_page + page_count;
        if end_page > AUTH_KEY.start_page {
            return Err(StorageError::AccessDenied {
                page: start_page.max(AUTH_KEY.start_page),
            });
        }
        if !self.authenticated && self.read_protected() && end_page > self.auth0() {
            return Err(StorageError::AccessDenied {
                page: start_page.max(self.auth0()),
            });
        }

        for (idx, page) in (start_page..end_page).enumerate() {
            let at = offset + idx * PAGE_SIZE;
            out[at..at + PAGE_SIZE].copy_from_slice(&self.pages[usize::from(page)]);
        }
        trace!(start_page, page_count, "read pages");
        Ok(())
    }

    fn write_pages(
        &mut self,
        data: &[u8],
        offset: usize,
        start_page: u8,
        page_count: u8,
    ) -> Result<(), StorageError> {
        if self.torn {
            return Err(StorageError::Torn);
        }
        Self::check_range(start_page, page_count)?;
        Self::check_buffer(data.len(), offset, page_count)?;

        let end_page = start_page + page_count;
        if !self.authenticated && end_page > self.auth0() {
            return Err(StorageError::AccessDenied {
                page: start_page.max(self.auth0()),
            });
        }

        for (idx, page) in (start_page..end_page).enumerate() {
            let at = offset + idx * PAGE_SIZE;
            let mut bytes = [0u8; PAGE_SIZE];
            bytes.copy_from_slice(&data[at..at + PAGE_SIZE]);
            self.write_page(page, bytes)?;
        }
        trace!(start_page, page_count, "wrote pages");
        Ok(())
    }

    fn authenticate(&mut self, key: &[u8; CARD_KEY_LEN]) -> Result<bool, StorageError> {
        if self.torn {
            return Err(StorageError::Torn);
        }
        self.authenticated = *key == self.key;
        trace!(accepted = self.authenticated, "key challenge");
        Ok(self.authenticated)
    }
}
