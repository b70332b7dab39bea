use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Symbol;

/// A snapshot of a symbol's current best bid/ask/last, as produced by
/// the Tick Source and consumed by the Matcher and Tick Cache.
///
/// Invariant: `bid <= last <= ask`. Construction is only possible
/// through [`Quote::new`], which enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    /// Nanoseconds since the Unix epoch. Must be non-decreasing per
    /// symbol across successive quotes.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error("bid {bid} must be <= last {last}")]
    BidAboveLast { bid: Decimal, last: Decimal },
    #[error("last {last} must be <= ask {ask}")]
    LastAboveAsk { last: Decimal, ask: Decimal },
}

impl Quote {
    pub fn new(
        symbol: impl Into<Symbol>,
        bid: Decimal,
        ask: Decimal,
        last: Decimal,
        volume: Decimal,
        high: Decimal,
        low: Decimal,
        change: Decimal,
        change_percent: Decimal,
        timestamp: i64,
    ) -> Result<Self, QuoteError> {
        if bid > last {
            return Err(QuoteError::BidAboveLast { bid, last });
        }
        if last > ask {
            return Err(QuoteError::LastAboveAsk { last, ask });
        }
        Ok(Self {
            symbol: symbol.into(),
            bid,
            ask,
            last,
            volume,
            high,
            low,
            change,
            change_percent,
            timestamp,
        })
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}
