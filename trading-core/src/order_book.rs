//! In-memory index of live orders, updated only from the Event Loop
//! (spec §4.3). `byId` and `bySymbol` are maintained in lockstep; only
//! non-terminal orders ever appear here.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::model::{Order, OrderId, OrderStatus, Symbol};

#[derive(Debug, Default)]
pub struct OrderBook {
    by_id: HashMap<OrderId, Order>,
    by_symbol: HashMap<Symbol, IndexSet<OrderId>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a live order. Panics in debug builds if
    /// asked to insert a terminal order — terminal orders must go
    /// through [`OrderBook::remove`] instead.
    pub fn insert(&mut self, order: Order) {
        debug_assert!(!order.status.is_terminal(), "terminal orders do not belong in the Book");
        self.by_symbol
            .entry(order.symbol.clone())
            .or_default()
            .insert(order.id);
        self.by_id.insert(order.id, order);
    }

    /// Removes an order regardless of status; called when an order
    /// reaches a terminal state. Returns the removed order, if present.
    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        let order = self.by_id.remove(&id)?;
        if let Some(set) = self.by_symbol.get_mut(&order.symbol) {
            set.shift_remove(&id);
            if set.is_empty() {
                self.by_symbol.remove(&order.symbol);
            }
        }
        Some(order)
    }

    pub fn get_by_id(&self, id: OrderId) -> Option<&Order> {
        self.by_id.get(&id)
    }

    pub fn get_by_id_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.by_id.get_mut(&id)
    }

    /// Open orders for `symbol` in insertion order — the order Matcher
    /// tie-breaks follow (spec §4.4).
    pub fn get_by_symbol(&self, symbol: &str) -> impl Iterator<Item = &Order> + '_ {
        self.by_symbol
            .get(symbol)
            .into_iter()
            .flat_map(move |ids| ids.iter().filter_map(move |id| self.by_id.get(id)))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Replaces an order in place, moving it out of the Book entirely
    /// if its new status is terminal.
    pub fn upsert(&mut self, order: Order) {
        if order.status.is_terminal() {
            self.remove(order.id);
        } else {
            self.insert(order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderKind, Side};
    use rust_decimal::Decimal;
    use std::time::SystemTime;

    fn order(id: OrderId, symbol: &str, status: OrderStatus) -> Order {
        let now = SystemTime::now();
        Order {
            id,
            owner_id: "u".into(),
            account_id: "a".into(),
            symbol: symbol.into(),
            kind: OrderKind::Limit,
            side: Side::Buy,
            qty: Decimal::ONE,
            limit_price: Some(Decimal::ONE),
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

    #[test]
    fn insertion_order_is_preserved_for_tie_breaks() {
        let mut book = OrderBook::new();
        let ids: Vec<OrderId> = (0..3).map(|_| OrderId::generate()).collect();
        for id in &ids {
            book.insert(order(*id, "EURUSD", OrderStatus::Open));
        }
        let seen: Vec<OrderId> = book.get_by_symbol("EURUSD").map(|o| o.id).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn terminal_orders_are_absent_after_upsert() {
        let mut book = OrderBook::new();
        let id = OrderId::generate();
        book.insert(order(id, "EURUSD", OrderStatus::Open));
        let mut filled = order(id, "EURUSD", OrderStatus::Filled);
        filled.status = OrderStatus::Filled;
        book.upsert(filled);
        assert!(book.get_by_id(id).is_none());
        assert_eq!(book.get_by_symbol("EURUSD").count(), 0);
    }

    #[test]
    fn non_terminal_orders_present_exactly_once() {
        let mut book = OrderBook::new();
        let id = OrderId::generate();
        book.insert(order(id, "EURUSD", OrderStatus::Open));
        assert_eq!(book.get_by_symbol("EURUSD").count(), 1);
        assert_eq!(book.len(), 1);
    }
}
