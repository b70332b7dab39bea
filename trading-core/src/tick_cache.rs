//! Short-TTL key/value exposing the latest quote per symbol to readers
//! outside the Event Loop (spec §4.6). Written only by the loop after
//! handling a tick; readers never see a half-updated quote because
//! `DashMap::insert` replaces the stored tuple atomically.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::model::{Quote, Symbol};

pub struct TickCache {
    ttl: Duration,
    entries: DashMap<Symbol, (Quote, Instant)>,
}

impl TickCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Whole-record replacement; called only from the Event Loop.
    pub fn put(&self, quote: Quote) {
        self.entries.insert(quote.symbol.clone(), (quote, Instant::now()));
    }

    /// Returns the latest quote for `symbol` if it is still within TTL.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let entry = self.entries.get(symbol)?;
        let (quote, stored_at) = entry.value();
        if stored_at.elapsed() <= self.ttl {
            Some(quote.clone())
        } else {
            None
        }
    }
}
