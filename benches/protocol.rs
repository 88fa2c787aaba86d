use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ultraticket::crypto::{MacEngine, derive_auth_key};
use ultraticket::protocol::{CURRENT_APP_TAG, RECORD_LEN, TicketRecord};
use ultraticket::{FixedClock, MemoryCard, Secrets, TicketEngine};

const UID: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

fn record() -> TicketRecord {
    TicketRecord {
        app_tag: CURRENT_APP_TAG,
        ride_limit: 20,
        usage_counter: 3,
        issuing_ts: 29_529_600,
        activation_ts: 29_529_660,
        validity_minutes: 30 * 24 * 60,
    }
}

fn bench_crypto(c: &mut Criterion) {
    let mut group = c.benchmark_group("crypto");

    group.bench_function("derive_auth_key", |b| {
        b.iter(|| {
            black_box(derive_auth_key(black_box(&UID), b"bench master secret"));
        });
    });

    let engine = MacEngine::new(b"bench mac key");
    let encoded = record().encode();
    let tag = engine.generate_mac(&encoded);
    group.throughput(Throughput::Bytes(RECORD_LEN as u64));
    group.bench_function("generate_mac", |b| {
        b.iter(|| {
            black_box(engine.generate_mac(black_box(&encoded)));
        });
    });
    group.bench_function("verify_mac", |b| {
        b.iter(|| {
            black_box(engine.verify_mac(black_box(&encoded), &tag));
        });
    });

    group.finish();
}

fn bench_transactions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transactions");
    let clock = FixedClock::new(29_529_600);
    let secrets = Secrets::new(b"bench master secret", b"bench mac key");

    group.bench_function("issue_blank_card", |b| {
        b.iter(|| {
            let card = MemoryCard::blank(UID);
            let mut engine = TicketEngine::with_clock(card, &clock, secrets.clone()).unwrap();
            engine.issue(30, 20).unwrap();
            black_box(engine.into_storage());
        });
    });

    let mut issued = MemoryCard::blank(UID);
    TicketEngine::with_clock(&mut issued, &clock, secrets.clone())
        .unwrap()
        .issue(30, 100)
        .unwrap();
    group.bench_function("use_ticket", |b| {
        b.iter(|| {
            let mut card = issued.clone();
            card.reinsert();
            let mut engine = TicketEngine::with_clock(card, &clock, secrets.clone()).unwrap();
            black_box(engine.use_ticket().unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_crypto, bench_transactions);
criterion_main!(benches);
