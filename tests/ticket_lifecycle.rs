use ultraticket::crypto::{MacEngine, MacTag, derive_auth_key};
use ultraticket::protocol::TicketRecord;
use ultraticket::protocol::layout::{
    ACTIVATION_TS, APP_TAG, ISSUING_TS, MAC, RIDE_LIMIT, USAGE_COUNTER, VALIDITY,
};
use ultraticket::{
    CURRENT_APP_TAG, CardStorage, Denial, FixedClock, MemoryCard, Secrets, TicketEngine,
    TicketError,
};

const UID: [u8; 7] = [0x04, 0x5A, 0x6B, 0x7C, 0x8D, 0x9E, 0xAF];
const MASTER: &[u8] = b"issuer master secret";
const MAC_KEY: &[u8] = b"issuer mac key";
// 2026-03-01T08:00Z in epoch minutes
const NOW: u32 = 29_529_600;
const DAY: u32 = 24 * 60;

fn secrets() -> Secrets {
    Secrets::new(MASTER, MAC_KEY)
}

fn engine<'a>(
    card: &'a mut MemoryCard,
    clock: &'a FixedClock,
) -> TicketEngine<&'a mut MemoryCard, &'a FixedClock> {
    card.reinsert();
    TicketEngine::with_clock(card, clock, secrets()).unwrap()
}

fn page_u32(card: &MemoryCard, page: u8) -> u32 {
    u32::from_le_bytes(card.raw_page(page))
}

fn stored_record(card: &MemoryCard) -> TicketRecord {
    let mut app_tag = [0u8; 8];
    app_tag[..4].copy_from_slice(&card.raw_page(APP_TAG.start_page));
    app_tag[4..].copy_from_slice(&card.raw_page(APP_TAG.start_page + 1));
    TicketRecord {
        app_tag,
        ride_limit: page_u32(card, RIDE_LIMIT.start_page),
        usage_counter: page_u32(card, USAGE_COUNTER.start_page),
        issuing_ts: page_u32(card, ISSUING_TS.start_page),
        activation_ts: page_u32(card, ACTIVATION_TS.start_page),
        validity_minutes: page_u32(card, VALIDITY.start_page),
    }
}

fn mac_is_valid(card: &MemoryCard) -> bool {
    let tag = MacTag::from_array(card.raw_page(MAC.start_page));
    MacEngine::new(MAC_KEY).verify_mac(&stored_record(card).encode(), &tag)
}

/// Seal whatever the card holds, as an issuer with the MAC key could.
fn reseal(card: &mut MemoryCard) {
    let tag = MacEngine::new(MAC_KEY).generate_mac(&stored_record(card).encode());
    card.overwrite_page(MAC.start_page, *tag.as_bytes());
}

#[test]
fn blank_card_issue_then_ride() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);

    engine(&mut card, &clock).issue(30, 20).unwrap();

    let record = stored_record(&card);
    assert_eq!(record.app_tag, CURRENT_APP_TAG);
    assert_eq!(record.usage_counter, 0);
    assert_eq!(record.ride_limit, 20);
    assert_eq!(record.issuing_ts, NOW);
    assert_eq!(record.activation_ts, 0);
    assert_eq!(record.validity_minutes, 30 * DAY);
    assert!(mac_is_valid(&card));

    card.reinsert();
    let key = derive_auth_key(&UID, MASTER);
    assert!(card.authenticate(&key.card_key()).unwrap());

    let ticket = engine(&mut card, &clock).use_ticket().unwrap();
    assert!(ticket.is_valid());
    assert_eq!(ticket.remaining_uses(), 19);
    assert_eq!(ticket.expiry_time(), NOW + 30 * DAY);
    assert_eq!(page_u32(&card, USAGE_COUNTER.start_page), 1);
    assert!(mac_is_valid(&card));
}

#[test]
fn activation_latch_set_on_first_ride_and_reset_on_top_up() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(7, 10).unwrap();

    clock.advance(90);
    engine(&mut card, &clock).use_ticket().unwrap();
    assert_eq!(page_u32(&card, ACTIVATION_TS.start_page), NOW + 90);

    // Later rides keep the original activation
    clock.advance(60);
    let ticket = engine(&mut card, &clock).use_ticket().unwrap();
    assert_eq!(ticket.expiry_time(), NOW + 90 + 7 * DAY);
    assert_eq!(page_u32(&card, ACTIVATION_TS.start_page), NOW + 90);

    engine(&mut card, &clock).issue(7, 5).unwrap();
    assert_eq!(page_u32(&card, ACTIVATION_TS.start_page), 0);
    assert_eq!(page_u32(&card, ISSUING_TS.start_page), NOW + 150);
    assert!(mac_is_valid(&card));
}

#[test]
fn top_up_keeps_unused_rides() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(30, 5).unwrap();
    engine(&mut card, &clock).use_ticket().unwrap();
    engine(&mut card, &clock).use_ticket().unwrap();

    engine(&mut card, &clock).issue(30, 10).unwrap();
    assert_eq!(page_u32(&card, USAGE_COUNTER.start_page), 2);
    assert_eq!(page_u32(&card, RIDE_LIMIT.start_page), 15);

    let ticket = engine(&mut card, &clock).use_ticket().unwrap();
    assert_eq!(ticket.remaining_uses(), 12);
}

#[test]
fn exhausted_ticket_is_refused_without_writes() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(30, 2).unwrap();
    engine(&mut card, &clock).use_ticket().unwrap();
    let last = engine(&mut card, &clock).use_ticket().unwrap();
    assert_eq!(last.remaining_uses(), 0);
    assert!(last.is_valid());

    let writes = card.write_count();
    let mut session = engine(&mut card, &clock);
    let ticket = session.use_ticket().unwrap();
    assert!(!ticket.is_valid());
    assert_eq!(ticket.remaining_uses(), 0);
    assert_eq!(ticket.denial(), Some(Denial::Exhausted));
    assert_eq!(session.status(), "Ride refused: no rides left.");
    drop(session);

    assert_eq!(card.write_count(), writes);
    assert_eq!(page_u32(&card, USAGE_COUNTER.start_page), 2);
}

#[test]
fn expired_ticket_is_refused_despite_rides_left() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(1, 10).unwrap();
    engine(&mut card, &clock).use_ticket().unwrap();

    clock.advance(DAY - 1);
    assert!(engine(&mut card, &clock).use_ticket().unwrap().is_valid());

    clock.advance(1);
    let writes = card.write_count();
    let ticket = engine(&mut card, &clock).use_ticket().unwrap();
    assert!(!ticket.is_valid());
    assert_eq!(ticket.remaining_uses(), 0);
    assert_eq!(ticket.denial(), Some(Denial::Expired));
    assert_eq!(ticket.expiry_time(), NOW + DAY);
    assert_eq!(card.write_count(), writes);
    assert_eq!(page_u32(&card, USAGE_COUNTER.start_page), 2);

    // A top-up restarts the clock from the next first ride
    engine(&mut card, &clock).issue(1, 1).unwrap();
    let ticket = engine(&mut card, &clock).use_ticket().unwrap();
    assert!(ticket.is_valid());
    assert_eq!(ticket.remaining_uses(), 8);
}

#[test]
fn unused_ticket_does_not_expire_before_activation() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(1, 3).unwrap();

    clock.advance(10 * DAY);
    let ticket = engine(&mut card, &clock).use_ticket().unwrap();
    assert!(ticket.is_valid());
    assert_eq!(ticket.expiry_time(), NOW + 11 * DAY);
}

#[test]
fn foreign_card_rejected_without_writes() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    card.overwrite_page(APP_TAG.start_page, *b"OTHE");
    card.overwrite_page(APP_TAG.start_page + 1, *b"RAPP");

    let mut session = engine(&mut card, &clock);
    let err = session.issue(30, 20).unwrap_err();
    assert!(matches!(&err, TicketError::ForeignCard { tag } if tag == "OTHERAPP"));
    assert!(err.is_security_event());
    assert!(session.status().starts_with("Issuing failed: foreign card"));

    assert!(matches!(
        session.use_ticket(),
        Err(TicketError::ForeignCard { .. })
    ));
    drop(session);
    assert_eq!(card.write_count(), 0);
}

#[test]
fn wrong_master_secret_fails_authentication() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(30, 20).unwrap();
    card.reinsert();
    let writes = card.write_count();

    let rogue = Secrets::new(b"guessed master secret", MAC_KEY);
    let mut session = TicketEngine::with_clock(&mut card, &clock, rogue).unwrap();
    assert!(matches!(session.use_ticket(), Err(TicketError::Authentication)));
    assert!(matches!(session.issue(30, 5), Err(TicketError::Authentication)));
    assert_eq!(session.status(), "Issuing failed: authentication failed.");
    drop(session);
    assert_eq!(card.write_count(), writes);
}

#[test]
fn top_up_near_counter_ceiling_rejected() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(30, 10).unwrap();
    card.overwrite_page(USAGE_COUNTER.start_page, 65_500u32.to_le_bytes());
    card.overwrite_page(RIDE_LIMIT.start_page, 65_500u32.to_le_bytes());
    reseal(&mut card);
    let writes = card.write_count();

    let err = engine(&mut card, &clock).issue(30, 50).unwrap_err();
    assert!(matches!(
        err,
        TicketError::LimitExceeded {
            counter: 65_500,
            limit: 65_500,
            uses: 50
        }
    ));
    assert_eq!(card.write_count(), writes);
    assert_eq!(page_u32(&card, RIDE_LIMIT.start_page), 65_500);
}

#[test]
fn top_up_past_ceiling_allowed_with_wide_margin() {
    let clock = FixedClock::new(NOW);
    let mut card = MemoryCard::blank(UID);
    engine(&mut card, &clock).issue(30, 10).unwrap();
    card.overwrite_page(USAGE_COUNTER.start_page, 65_500u32.to_le_bytes());
    card.overwrite_page(RIDE_LIMIT.start_page, 65_600u32.to_le_bytes());
    reseal(&mut card);

    engine(&mut card, &clock).issue(30, 50).unwrap();
    assert_eq!(page_u32(&card, RIDE_LIMIT.start_page), 65_650);
    assert!(mac_is_valid(&card));
}
