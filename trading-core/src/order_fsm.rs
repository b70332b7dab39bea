//! Order lifecycle state machine (spec §4.3).
//!
//! Follows the typestate pattern: each non-terminal status gets a
//! zero-sized wrapper around [`Order`] whose methods are exactly the
//! transitions valid from that state, so an attempt to fill a
//! cancelled order is a compile error rather than a runtime check.
//! Terminal states carry no further transition methods at all.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FillError {
    #[error("fill quantity must be positive")]
    ZeroQuantity,
    #[error("fill price must be positive")]
    ZeroPrice,
    #[error("fill qty {fill_qty} exceeds remaining qty {remaining_qty} (total {total_qty})")]
    ExceedsRemaining {
        fill_qty: Decimal,
        remaining_qty: Decimal,
        total_qty: Decimal,
    },
}

pub struct OrderPending(Order);
pub struct OrderOpen(Order);
pub struct OrderPartiallyFilled(Order);

/// Outcome of a valid fill: either the order reaches `filled` or it
/// remains `partiallyFilled` and re-enters the Book.
pub enum FillResult {
    Filled(Order),
    PartiallyFilled(OrderPartiallyFilled),
}

impl OrderPending {
    pub fn new(order: Order) -> Self {
        debug_assert_eq!(order.status, OrderStatus::Pending);
        Self(order)
    }

    pub fn data(&self) -> &Order {
        &self.0
    }

    /// `pending -> open`. Conceptually this fires on first tick
    /// evaluation; the Event Loop currently calls it synchronously at
    /// submit time (see `event_loop::handle_submit`) since the Book only
    /// holds orders the Matcher is willing to scan.
    pub fn acknowledge(mut self) -> OrderOpen {
        self.0.status = OrderStatus::Open;
        self.0.updated_at = std::time::SystemTime::now();
        OrderOpen(self.0)
    }

    /// `pending -> rejected` on post-submit validation failure.
    pub fn reject(mut self) -> Order {
        self.0.status = OrderStatus::Rejected;
        self.0.updated_at = std::time::SystemTime::now();
        self.0
    }
}

impl OrderOpen {
    pub fn new(order: Order) -> Self {
        debug_assert_eq!(order.status, OrderStatus::Open);
        Self(order)
    }

    pub fn data(&self) -> &Order {
        &self.0
    }

    pub fn into_inner(self) -> Order {
        self.0
    }

    pub fn fill(mut self, fill_qty: Decimal, fill_price: Decimal) -> Result<FillResult, (FillError, Order)> {
        if let Err(e) = validate_fill(&self.0, fill_qty, fill_price) {
            return Err((e, self.0));
        }
        apply_fill(&mut self.0, fill_qty, fill_price);
        Ok(finish_fill(self.0))
    }

    /// `open -> cancelled` on user cancel.
    pub fn cancel(mut self) -> Order {
        self.0.status = OrderStatus::Cancelled;
        self.0.updated_at = std::time::SystemTime::now();
        self.0
    }
}

impl OrderPartiallyFilled {
    pub fn new(order: Order) -> Self {
        debug_assert_eq!(order.status, OrderStatus::PartiallyFilled);
        Self(order)
    }

    pub fn data(&self) -> &Order {
        &self.0
    }

    pub fn into_inner(self) -> Order {
        self.0
    }

    pub fn fill(mut self, fill_qty: Decimal, fill_price: Decimal) -> Result<FillResult, (FillError, Order)> {
        if let Err(e) = validate_fill(&self.0, fill_qty, fill_price) {
            return Err((e, self.0));
        }
        apply_fill(&mut self.0, fill_qty, fill_price);
        Ok(finish_fill(self.0))
    }

    /// `partiallyFilled -> cancelled` on user cancel.
    pub fn cancel(mut self) -> Order {
        self.0.status = OrderStatus::Cancelled;
        self.0.updated_at = std::time::SystemTime::now();
        self.0
    }
}

fn validate_fill(order: &Order, fill_qty: Decimal, fill_price: Decimal) -> Result<(), FillError> {
    if fill_qty <= Decimal::ZERO {
        return Err(FillError::ZeroQuantity);
    }
    if fill_price <= Decimal::ZERO {
        return Err(FillError::ZeroPrice);
    }
    let remaining = order.remaining_qty();
    if fill_qty > remaining {
        return Err(FillError::ExceedsRemaining {
            fill_qty,
            remaining_qty: remaining,
            total_qty: order.qty,
        });
    }
    Ok(())
}

fn apply_fill(order: &mut Order, fill_qty: Decimal, fill_price: Decimal) {
    let prior_filled = order.filled_qty;
    let prior_notional = order.avg_price.unwrap_or(Decimal::ZERO) * prior_filled;
    let new_filled = prior_filled + fill_qty;
    order.avg_price = Some((prior_notional + fill_qty * fill_price) / new_filled);
    order.filled_qty = new_filled;
    order.executed_at = Some(std::time::SystemTime::now());
    order.updated_at = order.executed_at.unwrap();
}

fn finish_fill(mut order: Order) -> FillResult {
    if order.is_fully_filled() {
        order.status = OrderStatus::Filled;
        FillResult::Filled(order)
    } else {
        order.status = OrderStatus::PartiallyFilled;
        FillResult::PartiallyFilled(OrderPartiallyFilled(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderKind, Side};
    use rust_decimal_macros::dec;
    use std::time::SystemTime;

    fn new_order(qty: Decimal) -> Order {
        let now = SystemTime::now();
        Order {
            id: crate::model::OrderId::generate(),
            owner_id: "user-1".into(),
            account_id: "acc-1".into(),
            symbol: "EURUSD".into(),
            kind: OrderKind::Market,
            side: Side::Buy,
            qty,
            limit_price: None,
            stop_price: None,
            status: OrderStatus::Pending,
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
    fn pending_to_open_to_filled() {
        let order = OrderPending::new(new_order(dec!(1000)));
        let open = order.acknowledge();
        match open.fill(dec!(1000), dec!(1.1002)).unwrap() {
            FillResult::Filled(o) => {
                assert_eq!(o.status, OrderStatus::Filled);
                assert_eq!(o.filled_qty, dec!(1000));
                assert_eq!(o.avg_price, Some(dec!(1.1002)));
            }
            _ => panic!("expected filled"),
        }
    }

    #[test]
    fn partial_then_complete_fill_weights_avg_price() {
        let order = OrderPending::new(new_order(dec!(1000)));
        let open = order.acknowledge();
        let partial = match open.fill(dec!(400), dec!(1.1000)).unwrap() {
            FillResult::PartiallyFilled(p) => p,
            _ => panic!("expected partial"),
        };
        assert_eq!(partial.data().status, OrderStatus::PartiallyFilled);
        match partial.fill(dec!(600), dec!(1.1010)).unwrap() {
            FillResult::Filled(o) => {
                assert_eq!(o.filled_qty, dec!(1000));
                let expected = (dec!(400) * dec!(1.1000) + dec!(600) * dec!(1.1010)) / dec!(1000);
                assert_eq!(o.avg_price, Some(expected));
            }
            _ => panic!("expected filled"),
        }
    }

    #[test]
    fn overfill_is_rejected_without_mutating_order() {
        let order = OrderPending::new(new_order(dec!(1000)));
        let open = order.acknowledge();
        let (err, order) = open.fill(dec!(1500), dec!(1.1000)).unwrap_err();
        assert_eq!(
            err,
            FillError::ExceedsRemaining {
                fill_qty: dec!(1500),
                remaining_qty: dec!(1000),
                total_qty: dec!(1000)
            }
        );
        assert_eq!(order.filled_qty, Decimal::ZERO);
    }

    #[test]
    fn cancel_from_open_transitions_to_cancelled() {
        let order = OrderPending::new(new_order(dec!(1000)));
        let open = order.acknowledge();
        let cancelled = open.cancel();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }
}
