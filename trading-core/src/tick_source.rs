//! Produces Quotes for a fixed set of symbols (spec §4.1). Production
//! deployments inject a real feed adapter behind [`TickSource`]; this
//! module also ships the deterministic random-walk simulator used in
//! the reference implementation and in tests, grounded in the original
//! service's `market_data_simulator`.

use rand::Rng;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::{Quote, Symbol};

/// A source of per-symbol quotes. Implementors must emit a
/// monotonically non-decreasing `timestamp` per symbol (spec §4.1).
pub trait TickSource {
    /// Produce the next quote, or `None` if no symbol has a fresh tick
    /// right now (a real feed adapter may be rate-limited; the
    /// simulator never returns `None`).
    fn next_quote(&mut self) -> Option<Quote>;
}

/// Volatility used for a symbol's random walk, matching spec §4.1's
/// "0.0001 for FX, 0.01 for crypto" split.
#[derive(Debug, Clone, Copy)]
pub enum Volatility {
    Fx,
    Crypto,
}

impl Volatility {
    fn magnitude(self) -> f64 {
        match self {
            Volatility::Fx => 0.0001,
            Volatility::Crypto => 0.01,
        }
    }
}

struct SymbolState {
    symbol: Symbol,
    volatility: Volatility,
    last: Decimal,
    last_timestamp_ns: i64,
}

/// Deterministic per-symbol random-walk simulator. Cycles through its
/// configured symbols round-robin on each [`SimulatedTickSource::next_quote`] call;
/// callers drive the ≥100 Hz cadence externally (e.g. a sleep loop in
/// the binary entrypoint), since the simulator itself has no clock of
/// its own beyond stamping the current wall time.
pub struct SimulatedTickSource {
    symbols: Vec<SymbolState>,
    cursor: usize,
}

impl SimulatedTickSource {
    pub fn new(symbols: impl IntoIterator<Item = (Symbol, Volatility, Decimal)>) -> Self {
        let now_ns = now_ns();
        let symbols = symbols
            .into_iter()
            .map(|(symbol, volatility, seed)| SymbolState {
                symbol,
                volatility,
                last: seed,
                last_timestamp_ns: now_ns,
            })
            .collect();
        Self { symbols, cursor: 0 }
    }

    /// The standard FX-major + two-crypto-pair universe from spec §4.1.
    pub fn standard_universe() -> Self {
        use Volatility::*;
        Self::new([
            (Symbol::from("EURUSD"), Fx, Decimal::new(11000, 4)),
            (Symbol::from("GBPUSD"), Fx, Decimal::new(12700, 4)),
            (Symbol::from("USDJPY"), Fx, Decimal::new(14950, 2)),
            (Symbol::from("AUDUSD"), Fx, Decimal::new(6600, 4)),
            (Symbol::from("BTCUSD"), Crypto, Decimal::new(30000, 0)),
            (Symbol::from("ETHUSD"), Crypto, Decimal::new(2000, 0)),
        ])
    }
}

impl TickSource for SimulatedTickSource {
    fn next_quote(&mut self) -> Option<Quote> {
        if self.symbols.is_empty() {
            return None;
        }
        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % self.symbols.len();

        let mut rng = rand::thread_rng();
        let now = now_ns();
        let state = &mut self.symbols[idx];
        // Timestamps must be non-decreasing per symbol even if the
        // wall clock hasn't advanced between calls.
        let timestamp = now.max(state.last_timestamp_ns + 1);

        let vol = state.volatility.magnitude();
        let change_frac = rng.gen_range(-vol..vol);
        let change = state.last * Decimal::from_f64(change_frac).unwrap_or(Decimal::ZERO);
        let new_last = (state.last + change).max(Decimal::new(1, 4));

        let spread = new_last * Decimal::new(2, 4); // ~2 pips relative spread
        let bid = new_last - spread / Decimal::TWO;
        let ask = new_last + spread / Decimal::TWO;
        let high = new_last + (new_last * Decimal::from_f64(rng.gen_range(0.0..vol)).unwrap_or(Decimal::ZERO));
        let low = new_last - (new_last * Decimal::from_f64(rng.gen_range(0.0..vol)).unwrap_or(Decimal::ZERO));
        let change_percent = if state.last.is_zero() {
            Decimal::ZERO
        } else {
            (change / state.last) * Decimal::ONE_HUNDRED
        };

        let quote = Quote::new(
            state.symbol.clone(),
            bid,
            ask,
            new_last,
            Decimal::from(rng.gen_range(1_000u32..50_000u32)),
            high,
            low,
            change,
            change_percent,
            timestamp,
        )
        .expect("simulator always produces bid <= last <= ask by construction");

        state.last = new_last;
        state.last_timestamp_ns = timestamp;
        Some(quote)
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
