//! Ticket issuance and redemption against a presented card.
//!
//! An engine lives for one reader session. It owns the card handle, the issuer
//! secrets and the clock; both operations take `&mut self`, so transactions on a
//! card never interleave.
//!
//! Every transaction writes the MAC last. A card pulled from the field part-way
//! through is left with a MAC that no longer matches its data, which redemption
//! rejects.

use tracing::{debug, info, instrument, warn};

use crate::card::CardStorage;
use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, Secrets};
use crate::crypto::{DerivedKey, MAC_TAG_LEN, MacEngine, MacTag, derive_auth_key};
use crate::protocol::layout::{
    self, ACTIVATION_TS, APP_TAG, AUTH_KEY, AUTH0, AUTH0_START_PAGE, AUTH1, AUTH1_MODE, Field,
    ISSUING_TS, MAC, RIDE_LIMIT, UID, USAGE_COUNTER, VALIDITY,
};
use crate::protocol::{
    APP_TAG_LEN, Denial, MINUTES_PER_DAY, Result, Ticket, TicketError, TicketRecord, UID_LEN,
    ZERO_TS, bytes_to_int, int_to_bytes,
};

/// Issues and redeems tickets on one card.
#[derive(Debug)]
pub struct TicketEngine<S, C = SystemClock> {
    storage: S,
    clock: C,
    config: EngineConfig,
    secrets: Secrets,
    mac: MacEngine,
    status: String,
}

impl<S: CardStorage> TicketEngine<S> {
    /// Engine with the default configuration and the system clock.
    pub fn new(storage: S, secrets: Secrets) -> Result<Self> {
        Self::with_config(storage, SystemClock, secrets, EngineConfig::default())
    }
}

impl<S: CardStorage, C: Clock> TicketEngine<S, C> {
    /// Engine with the default configuration and a custom clock.
    pub fn with_clock(storage: S, clock: C, secrets: Secrets) -> Result<Self> {
        Self::with_config(storage, clock, secrets, EngineConfig::default())
    }

    /// Fully specified engine. Fails if the memory map is inconsistent.
    pub fn with_config(
        storage: S,
        clock: C,
        secrets: Secrets,
        config: EngineConfig,
    ) -> Result<Self> {
        layout::validate()?;
        let mac = MacEngine::new(secrets.mac_key());
        Ok(Self {
            storage,
            clock,
            config,
            secrets,
            mac,
            status: String::from("-"),
        })
    }

    /// Human-readable outcome of the last operation, for the operator display.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Borrow the card handle.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutably borrow the card handle.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// End the session and hand back the card handle.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Issue `uses` rides valid for `days_valid` days after first use.
    ///
    /// A blank card is personalized first; a returning card is topped up and its
    /// activation latch reset.
    #[instrument(level = "info", skip(self))]
    pub fn issue(&mut self, days_valid: u32, uses: u32) -> Result<()> {
        let outcome = self.try_issue(days_valid, uses);
        match &outcome {
            Ok(()) => {
                self.status = format!("Ticket issued: {uses} rides, valid {days_valid} days.");
            }
            Err(err) => self.report_failure("Issuing failed", err),
        }
        outcome
    }

    /// Redeem one ride.
    ///
    /// Security failures come back as `Err`; an exhausted or expired ticket is an
    /// `Ok` ticket that is not valid.
    #[instrument(level = "info", skip(self))]
    pub fn use_ticket(&mut self) -> Result<Ticket> {
        let outcome = self.try_use();
        match &outcome {
            Ok(ticket) => match ticket.denial() {
                None => {
                    self.status = format!(
                        "Ride accepted. {} rides left.",
                        ticket.remaining_uses()
                    );
                }
                Some(denial) => {
                    info!(%denial, "ride refused");
                    self.status = format!("Ride refused: {denial}.");
                }
            },
            Err(err) => self.report_failure("Validation failed", err),
        }
        outcome
    }

    fn try_issue(&mut self, days_valid: u32, uses: u32) -> Result<()> {
        if uses == 0 {
            return Err(TicketError::InvalidRequest("at least one ride must be issued"));
        }
        let validity_minutes = days_valid
            .checked_mul(MINUTES_PER_DAY)
            .filter(|minutes| *minutes > 0)
            .ok_or(TicketError::InvalidRequest("validity period out of range"))?;
        let limits = self.config.limits;
        if uses > limits.max_rides_allowed {
            return Err(TicketError::LimitExceeded {
                counter: 0,
                limit: 0,
                uses,
            });
        }

        let app_tag = self.read_app_tag()?;
        let blank = is_blank(&app_tag);
        if !blank && app_tag != self.config.app_tag {
            return Err(foreign_card(&app_tag));
        }

        let (uid, key) = self.derive_card_key()?;
        let returning = if blank {
            // A card that already takes our key was personalized before
            let personalized = self.storage.authenticate(&key.card_key())?;
            if personalized {
                warn!(uid = %hex::encode(uid), "blank app tag on a personalized card");
            }
            personalized
        } else {
            self.authenticate(&key)?;
            true
        };

        let (counter, limit) = if returning {
            drop(key);
            self.rearm_access_control()?;
            self.sealed_balance(blank)?
        } else {
            self.personalize(&key)?;
            drop(key);
            (0, 0)
        };

        let ride_limit = self.check_limits(counter, limit, uses)?;
        let record = TicketRecord {
            app_tag: self.config.app_tag,
            ride_limit,
            usage_counter: counter,
            issuing_ts: self.clock.now_minutes(),
            activation_ts: ZERO_TS,
            validity_minutes,
        };
        let tag = self.mac.generate_mac(&record.encode());

        self.write_int(RIDE_LIMIT, record.ride_limit)?;
        self.write_int(ISSUING_TS, record.issuing_ts)?;
        self.write_int(ACTIVATION_TS, record.activation_ts)?;
        self.write_int(VALIDITY, record.validity_minutes)?;
        if blank {
            self.write_field(APP_TAG, &record.app_tag)?;
        }
        self.write_field(MAC, tag.as_bytes())?;

        info!(
            uid = %hex::encode(uid),
            counter,
            ride_limit,
            remaining = record.remaining(),
            "ticket issued"
        );
        Ok(())
    }

    fn try_use(&mut self) -> Result<Ticket> {
        let app_tag = self.read_app_tag()?;
        if is_blank(&app_tag) {
            return Err(TicketError::BlankCard);
        }
        if app_tag != self.config.app_tag {
            return Err(foreign_card(&app_tag));
        }

        let (uid, key) = self.derive_card_key()?;
        self.authenticate(&key)?;
        drop(key);

        let mut record = self.read_record(app_tag)?;
        let mut stored = [0u8; MAC_TAG_LEN];
        self.read_field(MAC, &mut stored)?;
        if !self.mac.verify_mac(&record.encode(), &MacTag::from_array(stored)) {
            return Err(TicketError::Integrity);
        }

        let remaining = record.remaining();
        if remaining == 0 {
            return Ok(Ticket::denied(
                Denial::Exhausted,
                record.expiry().unwrap_or(ZERO_TS),
            ));
        }

        let now = self.clock.now_minutes();
        let activating = !record.is_activated();
        if activating {
            record.activation_ts = now;
        }
        let expiry = record.activation_ts.saturating_add(record.validity_minutes);
        if now >= expiry {
            return Ok(Ticket::denied(Denial::Expired, expiry));
        }

        record.usage_counter += 1;
        let tag = self.mac.generate_mac(&record.encode());
        if activating {
            debug!(activation_ts = now, expiry, "activating ticket");
            self.write_int(ACTIVATION_TS, record.activation_ts)?;
        }
        self.write_int(USAGE_COUNTER, record.usage_counter)?;
        self.write_field(MAC, tag.as_bytes())?;

        info!(
            uid = %hex::encode(uid),
            counter = record.usage_counter,
            remaining = remaining - 1,
            "ride accepted"
        );
        Ok(Ticket::accepted(remaining - 1, expiry))
    }

    /// One-time setup of a blank card: zero counter, derived key, access control.
    fn personalize(&mut self, key: &DerivedKey) -> Result<()> {
        debug!("personalizing blank card");
        self.write_int(USAGE_COUNTER, 0)?;
        self.write_field(AUTH_KEY, key.card_key().as_slice())?;
        self.authenticate(key)?;
        self.write_field(AUTH1, &[AUTH1_MODE, 0, 0, 0])?;
        self.write_field(AUTH0, &[AUTH0_START_PAGE, 0, 0, 0])?;
        Ok(())
    }

    /// Restore AUTH1/AUTH0 on a card whose personalization was cut short.
    fn rearm_access_control(&mut self) -> Result<()> {
        let mut page = [0u8; 4];
        self.read_field(AUTH1, &mut page)?;
        if page[0] != AUTH1_MODE {
            warn!(auth1 = page[0], "read protection missing, re-arming");
            self.write_field(AUTH1, &[AUTH1_MODE, 0, 0, 0])?;
        }
        self.read_field(AUTH0, &mut page)?;
        if page[0] != AUTH0_START_PAGE {
            warn!(auth0 = page[0], "access control missing, re-arming");
            self.write_field(AUTH0, &[AUTH0_START_PAGE, 0, 0, 0])?;
        }
        Ok(())
    }

    /// Counter and ride limit of a personalized card, as far as its MAC vouches
    /// for them.
    ///
    /// The stored counter is always carried over: the card only lets it grow.
    /// The limit is taken only from a sealed record. A card with a wiped tag and
    /// no valid seal keeps its counter and gets no rides carried over; any other
    /// mismatch is an integrity failure.
    fn sealed_balance(&mut self, wiped: bool) -> Result<(u32, u32)> {
        let record = self.read_record(self.config.app_tag)?;
        let mut stored = [0u8; MAC_TAG_LEN];
        self.read_field(MAC, &mut stored)?;
        let counter = record.usage_counter;

        if self.matches_seal(&record, &MacTag::from_array(stored)) {
            return Ok((counter, record.ride_limit));
        }
        if wiped {
            warn!(counter, "unsealed card with a wiped tag, no rides carried over");
            return Ok((counter, counter));
        }
        Err(TicketError::Integrity)
    }

    /// Whether `tag` seals `record`, or the record as it stood before a
    /// redemption that was torn ahead of its MAC write.
    fn matches_seal(&self, record: &TicketRecord, tag: &MacTag) -> bool {
        let counters = [record.usage_counter, record.usage_counter.saturating_sub(1)];
        let activations = [record.activation_ts, ZERO_TS];
        counters.iter().any(|&usage_counter| {
            activations.iter().any(|&activation_ts| {
                let candidate = TicketRecord {
                    usage_counter,
                    activation_ts,
                    ..*record
                };
                self.mac.verify_mac(&candidate.encode(), tag)
            })
        })
    }

    fn check_limits(&self, counter: u32, limit: u32, uses: u32) -> Result<u32> {
        let limits = self.config.limits;
        let exceeded = || TicketError::LimitExceeded {
            counter,
            limit,
            uses,
        };

        let max_counter = u64::from(limits.max_counter_value);
        if u64::from(counter) + u64::from(limits.min_rides_allowed) > max_counter {
            warn!(counter, "card reached end of life");
            return Err(exceeded());
        }
        let margin = u64::from(limit.saturating_sub(counter));
        if u64::from(counter) + u64::from(uses) > max_counter
            && margin + u64::from(uses) < u64::from(limits.max_rides_allowed)
        {
            return Err(exceeded());
        }
        limit.checked_add(uses).ok_or_else(exceeded)
    }

    fn report_failure(&mut self, operation: &str, err: &TicketError) {
        if err.is_security_event() {
            warn!(security_event = true, error = %err, "{operation}");
        } else {
            info!(security_event = false, error = %err, "{operation}");
        }
        self.status = format!("{operation}: {err}.");
    }

    fn derive_card_key(&mut self) -> Result<([u8; UID_LEN], DerivedKey)> {
        let mut raw = [0u8; 8];
        self.read_field(UID, &mut raw)?;
        // raw[3] is the BCC0 check byte
        let uid = [raw[0], raw[1], raw[2], raw[4], raw[5], raw[6], raw[7]];
        let key = derive_auth_key(&uid, self.secrets.master_secret());
        Ok((uid, key))
    }

    fn authenticate(&mut self, key: &DerivedKey) -> Result<()> {
        if self.storage.authenticate(&key.card_key())? {
            Ok(())
        } else {
            Err(TicketError::Authentication)
        }
    }

    fn read_app_tag(&mut self) -> Result<[u8; APP_TAG_LEN]> {
        let mut tag = [0u8; APP_TAG_LEN];
        self.read_field(APP_TAG, &mut tag)?;
        Ok(tag)
    }

    fn read_record(&mut self, app_tag: [u8; APP_TAG_LEN]) -> Result<TicketRecord> {
        Ok(TicketRecord {
            app_tag,
            ride_limit: self.read_int(RIDE_LIMIT)?,
            usage_counter: self.read_int(USAGE_COUNTER)?,
            issuing_ts: self.read_int(ISSUING_TS)?,
            activation_ts: self.read_int(ACTIVATION_TS)?,
            validity_minutes: self.read_int(VALIDITY)?,
        })
    }

    fn read_field(&mut self, field: Field, out: &mut [u8]) -> Result<()> {
        debug_assert_eq!(out.len(), field.len(), "buffer for {}", field.name);
        self.storage
            .read_pages(field.start_page, field.page_count, out, 0)?;
        Ok(())
    }

    fn read_int(&mut self, field: Field) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_field(field, &mut bytes)?;
        Ok(bytes_to_int(&bytes))
    }

    fn write_field(&mut self, field: Field, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), field.len(), "data for {}", field.name);
        self.storage
            .write_pages(data, 0, field.start_page, field.page_count)?;
        Ok(())
    }

    fn write_int(&mut self, field: Field, value: u32) -> Result<()> {
        self.write_field(field, &int_to_bytes(value))
    }
}

/// A tag of NULs or spaces counts as empty.
fn is_blank(tag: &[u8]) -> bool {
    tag.iter().all(|byte| *byte <= b' ')
}

fn foreign_card(tag: &[u8]) -> TicketError {
    TicketError::ForeignCard {
        tag: String::from_utf8_lossy(tag).into_owned(),
    }
}
