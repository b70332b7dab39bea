//! Matcher + Settlement throughput for a single symbol under a
//! synthetic order book, the one hot-path bench carried over in spirit
//! from the teacher's `engine_bench`/`fill_processing_bench` pair
//! (spec §8's "Test tooling").

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use trading_core::alerts::TracingAlertSink;
use trading_core::matcher;
use trading_core::model::{Account, AccountId, AccountKind, Order, OrderId, OrderKind, OrderStatus, Quote, Side};
use trading_core::order_book::OrderBook;
use trading_core::publish::InMemoryPublisher;
use trading_core::settlement::{PositionIndex, Settlement};
use trading_core::store::InMemoryStore;

fn pending_order(n: usize) -> Order {
    let now = std::time::SystemTime::now();
    Order {
        id: OrderId::generate(),
        owner_id: "owner-1".into(),
        account_id: "acc-1".into(),
        symbol: "EURUSD".into(),
        kind: OrderKind::Market,
        side: if n % 2 == 0 { Side::Buy } else { Side::Sell },
        qty: dec!(10),
        limit_price: None,
        stop_price: None,
        status: OrderStatus::Open,
        filled_qty: Decimal::ZERO,
        avg_price: None,
        commission: Decimal::ZERO,
        reservation_price: None,
        triggered: false,
        created_at: now,
        updated_at: now,
        executed_at: None,
    }
}

fn quote() -> Quote {
    Quote::new("EURUSD", dec!(1.1000), dec!(1.1002), dec!(1.1001), dec!(1000), dec!(1.1010), dec!(1.0990), dec!(0), dec!(0), 1).unwrap()
}

fn populated_book(depth: usize) -> OrderBook {
    let mut book = OrderBook::new();
    for n in 0..depth {
        book.insert(pending_order(n));
    }
    book
}

/// Matcher::evaluate in isolation, the per-tick scan over the Book.
fn bench_matcher_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher_evaluate");
    group.significance_level(0.01).sample_size(1000);

    for depth in [10usize, 100, 1000] {
        let book = populated_book(depth);
        let quote = quote();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                black_box(matcher::evaluate(black_box(&book), black_box(&quote)));
            });
        });
    }
    group.finish();
}

/// One full tick: Matcher::evaluate followed by Settlement::apply for
/// every resulting intent, against a single pre-funded account.
fn bench_tick_to_settlement(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_to_settlement");
    group.significance_level(0.01).sample_size(1000);

    group.bench_function("100_orders_one_tick", |b| {
        b.iter(|| {
            let mut accounts = HashMap::new();
            accounts.insert(AccountId::from("acc-1"), Account::new("acc-1", "owner-1", AccountKind::Live, dec!(1_000_000)));
            let mut positions = PositionIndex::new();
            let mut book = populated_book(100);
            let mut store = InMemoryStore::new();
            let mut publisher = InMemoryPublisher::new();
            let alerts = TracingAlertSink;
            let quote = quote();

            let intents = matcher::evaluate(&book, &quote);
            let mut settlement = Settlement {
                accounts: &mut accounts,
                positions: &mut positions,
                book: &mut book,
                store: &mut store,
                publisher: &mut publisher,
                alerts: &alerts,
                commission_rate: dec!(0.001),
                retry_attempts: 3,
            };
            for intent in &intents {
                black_box(settlement.apply(intent, 0).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_matcher_evaluate, bench_tick_to_settlement);
criterion_main!(benches);
