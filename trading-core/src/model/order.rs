use std::cell::Cell;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, Symbol};

thread_local! {
    static ORDER_SEQ: Cell<u32> = const { Cell::new(0) };
}

/// A 128-bit order identifier: `[48 bits: ms since epoch][48 bits: random][32 bits: per-thread counter]`.
///
/// Collision-resistant without a central allocator, following the same
/// timestamp/random/counter composition the rest of this codebase uses
/// for its order ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u128);

impl OrderId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
            & 0xFFFF_FFFF_FFFF;

        let random: u64 = rand::thread_rng().gen::<u64>() & 0xFFFF_FFFF_FFFF;

        let seq = ORDER_SEQ.with(|c| {
            let next = c.get().wrapping_add(1);
            c.set(next);
            next
        });

        let value = ((millis as u128) << 80) | ((random as u128) << 32) | seq as u128;
        Self(value)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// The request payload for submitting a new order (§6 `CreateOrder`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub kind: OrderKind,
    pub side: Side,
    pub qty: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

/// A live or terminal order. While open it is owned exclusively by the
/// Order Book; once terminal it belongs to the durable store only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: String,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub kind: OrderKind,
    pub side: Side,
    pub qty: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_qty: Decimal,
    pub avg_price: Option<Decimal>,
    pub commission: Decimal,
    /// The reference price used to reserve buy-side funds from
    /// `availableBalance` at submit time (spec §6's Reservation);
    /// `None` for sell orders, which reserve nothing. The currently
    /// held reservation is always `remaining_qty() * reservation_price`,
    /// so partial fills release proportionally without separate
    /// bookkeeping.
    pub reservation_price: Option<Decimal>,
    /// Set once a stop/stopLimit order's trigger condition has fired.
    /// Internal Matcher bookkeeping, not an observable status (§4.4).
    pub triggered: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub executed_at: Option<SystemTime>,
}

impl Order {
    pub fn remaining_qty(&self) -> Decimal {
        self.qty - self.filled_qty
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_qty >= self.qty
    }
}
