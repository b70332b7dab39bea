//! Property-based tests for the six universal invariants (spec §8),
//! grounded in the teacher's `core::fixed_point_proptest` module:
//! arbitrary sequences of values are replayed against the in-process
//! core (`Settlement`, `Position`, the order FSM, `TickCache`) and the
//! invariants are asserted after every step. Properties 7-8 and the
//! literal scenarios live in `scenarios.rs` and in each module's own
//! `#[cfg(test)]` block, per the teacher's convention of hand-computed
//! exact-value tests sitting alongside the property suite rather than
//! inside it.

use std::collections::HashMap;
use std::time::Duration;

use proptest::prelude::*;
use rust_decimal::Decimal;

use trading_core::alerts::TracingAlertSink;
use trading_core::matcher::ExecuteIntent;
use trading_core::model::{Account, AccountId, AccountKind, Order, OrderId, OrderKind, OrderStatus, Quote, Side};
use trading_core::order_book::OrderBook;
use trading_core::order_fsm::{FillResult, OrderPending};
use trading_core::publish::InMemoryPublisher;
use trading_core::settlement::{PositionIndex, Settlement};
use trading_core::store::InMemoryStore;
use trading_core::tick_cache::TickCache;

fn balance_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_00i64).prop_map(|v| Decimal::new(v, 2))
}

fn qty_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_00i64).prop_map(|v| Decimal::new(v, 0))
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_00i64).prop_map(|v| Decimal::new(v, 2))
}

fn commission_rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1000i64).prop_map(|v| Decimal::new(v, 5))
}

fn order_with_status(account_id: &str, symbol: &str, side: Side, qty: Decimal, status: OrderStatus) -> Order {
    let now = std::time::SystemTime::now();
    Order {
        id: OrderId::generate(),
        owner_id: "owner-1".into(),
        account_id: account_id.into(),
        symbol: symbol.into(),
        kind: OrderKind::Market,
        side,
        qty,
        limit_price: None,
        stop_price: None,
        status,
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

/// An order already sitting `open` in the Book, ready for
/// `Settlement::apply` to resolve against an `ExecuteIntent`.
fn open_order(account_id: &str, symbol: &str, side: Side, qty: Decimal) -> Order {
    order_with_status(account_id, symbol, side, qty, OrderStatus::Open)
}

/// A fresh `pending` order, for driving the FSM's own `acknowledge`/`fill`
/// transitions directly.
fn pending_order(account_id: &str, symbol: &str, side: Side, qty: Decimal) -> Order {
    order_with_status(account_id, symbol, side, qty, OrderStatus::Pending)
}

struct Harness {
    accounts: HashMap<AccountId, Account>,
    positions: PositionIndex,
    book: OrderBook,
    store: InMemoryStore,
    publisher: InMemoryPublisher,
    alerts: TracingAlertSink,
    commission_rate: Decimal,
}

impl Harness {
    fn new(balance: Decimal, commission_rate: Decimal) -> Self {
        let mut accounts = HashMap::new();
        let account = Account::new("acc-1", "owner-1", AccountKind::Live, balance);
        accounts.insert(account.id.clone(), account);
        Self {
            accounts,
            positions: PositionIndex::new(),
            book: OrderBook::new(),
            store: InMemoryStore::new(),
            publisher: InMemoryPublisher::new(),
            alerts: TracingAlertSink,
            commission_rate,
        }
    }

    fn settlement(&mut self) -> Settlement<'_> {
        Settlement {
            accounts: &mut self.accounts,
            positions: &mut self.positions,
            book: &mut self.book,
            store: &mut self.store,
            publisher: &mut self.publisher,
            alerts: &self.alerts,
            commission_rate: self.commission_rate,
            retry_attempts: 3,
        }
    }

    fn account(&self) -> &Account {
        self.accounts.get(&AccountId::from("acc-1")).unwrap()
    }
}

proptest! {
    /// Property 1: after any applied execution, `balance` and
    /// `availableBalance` remain >= 0 and `availableBalance <= balance`.
    /// A rejected execution (insufficient funds) must leave the account
    /// byte-for-byte unchanged.
    #[test]
    fn property_1_balance_stays_consistent_across_a_fill(
        balance in balance_strategy(),
        qty in qty_strategy(),
        price in price_strategy(),
        commission_rate in commission_rate_strategy(),
    ) {
        let mut h = Harness::new(balance, commission_rate);
        let order = open_order("acc-1", "EURUSD", Side::Buy, qty);
        let order_id = order.id;
        h.book.insert(order);

        let before = h.account().clone();
        let intent = ExecuteIntent { order_id, price, qty };
        let result = h.settlement().apply(&intent, 0);

        match result {
            Ok(_) => prop_assert!(h.account().is_consistent()),
            Err(_) => prop_assert_eq!(h.account(), &before, "rejected fill must not mutate the account"),
        }
    }

    /// Property 2: conservation of money for a buy fill — the balance
    /// debited is exactly `tradeValue + commission`, no more, no less
    /// (ignoring the separate `availableBalance` reservation ledger,
    /// which Property 7 covers in `scenarios.rs`).
    #[test]
    fn property_2_buy_fill_debits_exactly_trade_value_plus_commission(
        balance in balance_strategy(),
        qty in qty_strategy(),
        price in price_strategy(),
        commission_rate in commission_rate_strategy(),
    ) {
        let mut h = Harness::new(balance, commission_rate);
        let order = open_order("acc-1", "EURUSD", Side::Buy, qty);
        let order_id = order.id;
        h.book.insert(order);

        let before_balance = h.account().balance;
        let intent = ExecuteIntent { order_id, price, qty };
        if h.settlement().apply(&intent, 0).is_ok() {
            let trade_value = qty * price;
            let commission = trade_value * commission_rate;
            prop_assert_eq!(before_balance - h.account().balance, trade_value + commission);
        }
    }

    /// Property 3: for any order, `filledQty <= qty` holds through every
    /// fill step, and a fully-filled order leaves the Book while a
    /// partially-filled one is present exactly once.
    #[test]
    fn property_3_filled_qty_never_exceeds_qty(
        total_qty in qty_strategy(),
        first_fill_fraction in 1u32..100u32,
        price in price_strategy(),
    ) {
        let order = OrderPending::new(pending_order("acc-1", "EURUSD", Side::Buy, total_qty)).acknowledge();
        let first_fill = (total_qty * Decimal::new(first_fill_fraction as i64, 2)).round_dp(0).max(Decimal::ONE).min(total_qty);

        match order.fill(first_fill, price) {
            Ok(FillResult::Filled(o)) => {
                prop_assert!(o.filled_qty <= o.qty);
                prop_assert_eq!(o.filled_qty, o.qty);
            }
            Ok(FillResult::PartiallyFilled(p)) => {
                let data = p.data();
                prop_assert!(data.filled_qty <= data.qty);
                prop_assert_eq!(data.status, OrderStatus::PartiallyFilled);

                let remaining = data.qty - data.filled_qty;
                match p.fill(remaining, price) {
                    Ok(FillResult::Filled(o)) => {
                        prop_assert_eq!(o.filled_qty, o.qty);
                        prop_assert!(o.is_fully_filled());
                    }
                    other => prop_assert!(false, "completing the remainder must fully fill: {:?}", other.map(|_| ()).err()),
                }
            }
            Err((e, _)) => prop_assert!(false, "a within-bounds fill must validate: {e}"),
        }
    }

    /// Property 4: for any (accountId, symbol), at most one Position row
    /// exists at any time, across merges, partial closes, and flips —
    /// driven through the public `Settlement::apply` entry point across a
    /// sequence of alternating-side fills on one symbol.
    #[test]
    fn property_4_at_most_one_position_per_account_symbol(
        fills in prop::collection::vec((any::<bool>(), qty_strategy(), price_strategy()), 1..8),
    ) {
        let mut h = Harness::new(Decimal::new(100_000_000, 2), Decimal::ZERO);
        let account_id = AccountId::from("acc-1");

        for (sell, qty, price) in fills {
            let side = if sell { Side::Sell } else { Side::Buy };
            let order = open_order("acc-1", "EURUSD", side, qty);
            let order_id = order.id;
            h.book.insert(order);
            let intent = ExecuteIntent { order_id, price, qty };
            let _ = h.settlement().apply(&intent, 0);

            let count = h.positions.for_account(&account_id).count();
            prop_assert!(count <= 1, "expected at most one position, found {}", count);
        }
    }

    /// Property 5: tick monotonicity — the Tick Cache always reflects
    /// whichever quote was written most recently; feeding a
    /// monotonically increasing sequence of timestamps means `get`
    /// never regresses to an earlier one.
    #[test]
    fn property_5_tick_cache_reflects_the_latest_timestamp(
        deltas in prop::collection::vec(1i64..1_000_000i64, 1..20),
    ) {
        let cache = TickCache::new(Duration::from_secs(60));
        let mut timestamp = 0i64;
        let mut last_seen = 0i64;
        for delta in deltas {
            timestamp += delta;
            let quote = Quote::new("EURUSD", Decimal::new(11000, 4), Decimal::new(11002, 4), Decimal::new(11001, 4), Decimal::ZERO, Decimal::new(11002, 4), Decimal::new(11000, 4), Decimal::ZERO, Decimal::ZERO, timestamp).unwrap();
            cache.put(quote);
            let stored = cache.get("EURUSD").unwrap();
            prop_assert!(stored.timestamp >= last_seen);
            last_seen = stored.timestamp;
        }
    }

    /// Property 6: measured `processingLatencyNs` is non-negative and
    /// bounded by the handler's own wall time, measured against a real
    /// `Settlement::apply` call rather than synthetic timestamps.
    #[test]
    fn property_6_processing_latency_is_non_negative_and_bounded(
        balance in balance_strategy(),
        qty in qty_strategy(),
        price in price_strategy(),
    ) {
        let mut h = Harness::new(balance.max(Decimal::new(100_000_00, 2)), Decimal::new(1, 3));
        let order = open_order("acc-1", "EURUSD", Side::Buy, qty);
        let order_id = order.id;
        h.book.insert(order);

        let submitted_at_ns = now_ns();
        let started = std::time::Instant::now();
        let intent = ExecuteIntent { order_id, price, qty };
        let outcome = h.settlement().apply(&intent, submitted_at_ns);
        let wall_ns = started.elapsed().as_nanos() as i64;

        if let Ok(outcome) = outcome {
            if let Some(record) = outcome.record {
                prop_assert!(record.processing_latency_ns >= 0);
                prop_assert!(record.processing_latency_ns <= wall_ns);
            }
        }
    }
}

fn now_ns() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64
}
