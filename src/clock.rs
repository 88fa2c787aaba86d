//! Wall-clock source in the card's time unit (epoch minutes).

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies "now" to the engine.
pub trait Clock {
    /// Minutes since the Unix epoch.
    fn now_minutes(&self) -> u32;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_minutes(&self) -> u32 {
        let minutes = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() / 60);
        u32::try_from(minutes).unwrap_or(u32::MAX)
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    now: Cell<u32>,
}

impl FixedClock {
    /// Start at `minutes`.
    #[must_use]
    pub fn new(minutes: u32) -> Self {
        Self {
            now: Cell::new(minutes),
        }
    }

    /// Jump to `minutes`.
    pub fn set(&self, minutes: u32) {
        self.now.set(minutes);
    }

    /// Move forward by `minutes`.
    pub fn advance(&self, minutes: u32) {
        self.now.set(self.now.get().saturating_add(minutes));
    }
}

impl Clock for FixedClock {
    fn now_minutes(&self) -> u32 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_minutes(&self) -> u32 {
        (**self).now_minutes()
    }
}
