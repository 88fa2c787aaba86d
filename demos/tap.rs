//! Issue a ticket at the counter, then ride until it runs out.
//!
//! Secrets come from `ULTRATICKET_MASTER_SECRET` / `ULTRATICKET_MAC_KEY` (hex);
//! log verbosity from `RUST_LOG`.

use tracing_subscriber::EnvFilter;
use ultraticket::protocol::layout::USAGE_COUNTER;
use ultraticket::{Clock, FixedClock, MemoryCard, Secrets, SystemClock, TicketEngine};

const DEMO_MASTER_SECRET: &str = "6d617374657220736563726574";
const DEMO_MAC_KEY: &str = "6d6163206b6579";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let master = std::env::var("ULTRATICKET_MASTER_SECRET")
        .unwrap_or_else(|_| DEMO_MASTER_SECRET.to_owned());
    let mac_key =
        std::env::var("ULTRATICKET_MAC_KEY").unwrap_or_else(|_| DEMO_MAC_KEY.to_owned());
    let secrets = Secrets::from_hex(&master, &mac_key)?;

    println!("Ultraticket Tap Demo");
    println!("====================\n");

    let clock = FixedClock::new(SystemClock.now_minutes());
    let mut card = MemoryCard::blank([0x04, 0x6F, 0x1C, 0x42, 0x9A, 0x33, 0x80]);

    // Ticket office
    let mut office = TicketEngine::with_clock(&mut card, &clock, secrets.clone())?;
    office.issue(1, 3)?;
    println!("office:    {}", office.status());
    drop(office);

    // Turnstile, one tap every ten minutes
    for _ in 0..4 {
        card.reinsert();
        let mut gate = TicketEngine::with_clock(&mut card, &clock, secrets.clone())?;
        let ticket = gate.use_ticket()?;
        println!(
            "turnstile: {} (valid={}, expires at minute {})",
            gate.status(),
            ticket.is_valid(),
            ticket.expiry_time()
        );
        drop(gate);
        clock.advance(10);
    }

    // Someone rewinds the counter with a lab reader
    card.overwrite_page(USAGE_COUNTER.start_page, 0u32.to_le_bytes());
    card.reinsert();
    let mut gate = TicketEngine::with_clock(&mut card, &clock, secrets)?;
    if let Err(err) = gate.use_ticket() {
        println!("turnstile: {} (security event: {})", gate.status(), err.is_security_event());
    }

    Ok(())
}
