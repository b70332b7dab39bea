//! Decides which open orders become executable on a tick (spec §4.4).
//! Grounded in the original service's `check_order_execution`, which
//! implements the same market/limit executability predicates this
//! module generalizes to also cover stop and stopLimit orders.

use rust_decimal::Decimal;

use crate::model::{Order, OrderKind, Quote, Side};
use crate::order_book::OrderBook;

/// An order the Matcher has decided is executable on this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteIntent {
    pub order_id: crate::model::OrderId,
    pub price: Decimal,
    pub qty: Decimal,
}

/// Scans the open orders on `quote.symbol` and returns one
/// [`ExecuteIntent`] per executable order, in the insertion-order the
/// Book maintains (the tie-break rule in spec §4.4).
///
/// Stop and stopLimit orders that trigger on this tick have their
/// `triggered` flag set by the caller via [`trigger_stops`] before this
/// function is called — `evaluate` itself only ever looks at already
/// (or newly) triggered orders plus true limit/market rules.
pub fn evaluate(book: &OrderBook, quote: &Quote) -> Vec<ExecuteIntent> {
    book.get_by_symbol(&quote.symbol)
        .filter_map(|order| executable_price(order, quote).map(|price| ExecuteIntent {
            order_id: order.id,
            price,
            qty: order.remaining_qty(),
        }))
        .collect()
}

/// Marks stop/stopLimit orders whose trigger condition has fired on
/// this tick. Must run before [`evaluate`] so a stop that crosses and
/// immediately satisfies its (or its stopLimit's) execution rule fires
/// within the same tick.
pub fn trigger_stops(book: &mut OrderBook, quote: &Quote) {
    let ids: Vec<_> = book.get_by_symbol(&quote.symbol).map(|o| o.id).collect();
    for id in ids {
        if let Some(order) = book.get_by_id_mut(id) {
            if order.triggered {
                continue;
            }
            let crossed = match (order.kind, order.side) {
                (OrderKind::Stop, Side::Buy) | (OrderKind::StopLimit, Side::Buy) => {
                    order.stop_price.is_some_and(|sp| quote.last >= sp)
                }
                (OrderKind::Stop, Side::Sell) | (OrderKind::StopLimit, Side::Sell) => {
                    order.stop_price.is_some_and(|sp| quote.last <= sp)
                }
                _ => false,
            };
            if crossed {
                order.triggered = true;
            }
        }
    }
}

fn executable_price(order: &Order, quote: &Quote) -> Option<Decimal> {
    match order.kind {
        OrderKind::Market => Some(match order.side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        }),
        OrderKind::Limit => {
            let limit_price = order.limit_price?;
            match order.side {
                Side::Buy if quote.ask <= limit_price => Some(limit_price),
                Side::Sell if quote.bid >= limit_price => Some(limit_price),
                _ => None,
            }
        }
        OrderKind::Stop => {
            if order.triggered {
                Some(match order.side {
                    Side::Buy => quote.ask,
                    Side::Sell => quote.bid,
                })
            } else {
                None
            }
        }
        OrderKind::StopLimit => {
            if !order.triggered {
                return None;
            }
            let limit_price = order.limit_price?;
            match order.side {
                Side::Buy if quote.ask <= limit_price => Some(limit_price),
                Side::Sell if quote.bid >= limit_price => Some(limit_price),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderId, OrderStatus};
    use rust_decimal_macros::dec;
    use std::time::SystemTime;

    fn order(kind: OrderKind, side: Side, limit_price: Option<Decimal>, stop_price: Option<Decimal>, triggered: bool) -> Order {
        let now = SystemTime::now();
        Order {
            id: OrderId::generate(),
            owner_id: "u".into(),
            account_id: "a".into(),
            symbol: "EURUSD".into(),
            kind,
            side,
            qty: dec!(1000),
            limit_price,
            stop_price,
            status: OrderStatus::Open,
            filled_qty: Decimal::ZERO,
            avg_price: None,
            commission: Decimal::ZERO,
            reservation_price: None,
            triggered,
            created_at: now,
            updated_at: now,
            executed_at: None,
        }
    }

    fn quote(bid: Decimal, ask: Decimal, last: Decimal) -> Quote {
        Quote::new("EURUSD", bid, ask, last, dec!(100), ask, bid, dec!(0), dec!(0), 1).unwrap()
    }

    #[test]
    fn market_order_always_executes_at_opposite_best() {
        let mut book = OrderBook::new();
        book.insert(order(OrderKind::Market, Side::Buy, None, None, false));
        let q = quote(dec!(1.1000), dec!(1.1002), dec!(1.1001));
        let intents = evaluate(&book, &q);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].price, dec!(1.1002));
    }

    #[test]
    fn limit_buy_executes_only_when_ask_at_or_below_limit() {
        let mut book = OrderBook::new();
        book.insert(order(OrderKind::Limit, Side::Buy, Some(dec!(1.1000)), None, false));
        let not_yet = quote(dec!(1.1003), dec!(1.1005), dec!(1.1004));
        assert!(evaluate(&book, &not_yet).is_empty());

        let triggers = quote(dec!(1.0996), dec!(1.0998), dec!(1.0997));
        let intents = evaluate(&book, &triggers);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].price, dec!(1.1000));
    }

    #[test]
    fn stop_buy_is_inert_until_triggered() {
        let mut book = OrderBook::new();
        let mut o = order(OrderKind::Stop, Side::Buy, None, Some(dec!(30000)), false);
        o.symbol = "BTCUSD".into();
        book.insert(o);

        let below = quote(dec!(29998), dec!(30000), dec!(29999));
        let below = Quote { symbol: "BTCUSD".into(), ..below };
        trigger_stops(&mut book, &below);
        assert!(evaluate(&book, &below).is_empty());

        let above = quote(dec!(30002), dec!(30004), dec!(30001));
        let above = Quote { symbol: "BTCUSD".into(), ..above };
        trigger_stops(&mut book, &above);
        let intents = evaluate(&book, &above);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].price, dec!(30004));
    }

    #[test]
    fn tie_breaks_follow_insertion_order() {
        let mut book = OrderBook::new();
        let first = order(OrderKind::Market, Side::Buy, None, None, false);
        let second = order(OrderKind::Market, Side::Buy, None, None, false);
        let first_id = first.id;
        let second_id = second.id;
        book.insert(first);
        book.insert(second);
        let q = quote(dec!(1.1000), dec!(1.1002), dec!(1.1001));
        let intents = evaluate(&book, &q);
        assert_eq!(intents[0].order_id, first_id);
        assert_eq!(intents[1].order_id, second_id);
    }
}
