use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::{AccountId, Side, Symbol};

/// An account's net exposure to one symbol. At most one per
/// `(accountId, symbol)` pair (§3 uniqueness invariant); Settlement
/// deletes the row when `qty` returns to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: Decimal,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub realized_pnl: Decimal,
    pub commission: Decimal,
    pub opened_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Position {
    pub fn new(account_id: AccountId, symbol: Symbol, side: Side, qty: Decimal, avg_price: Decimal, commission: Decimal) -> Self {
        let now = SystemTime::now();
        Self {
            account_id,
            symbol,
            side,
            qty,
            avg_price,
            current_price: avg_price,
            realized_pnl: Decimal::ZERO,
            commission,
            opened_at: now,
            updated_at: now,
        }
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        let diff = self.current_price - self.avg_price;
        match self.side {
            Side::Buy => diff * self.qty,
            Side::Sell => -diff * self.qty,
        }
    }

    pub fn mark(&mut self, current_price: Decimal) {
        self.current_price = current_price;
    }
}

/// Result of applying a fill to an existing position, per spec §4.5
/// step 4. Mirrors the same same-side-merge / opposite-side
/// partial-close / full-close / flip-and-reopen branches the teacher's
/// `Position::process_fill_fixed_with_fee` implements for its
/// lock-free atomic position, adapted here to plain `Decimal` fields
/// mutated single-writer on the Event Loop thread.
pub enum FillOutcome {
    /// The position survives the fill, merged or partially closed.
    Updated,
    /// The position's quantity reached zero and it must be removed
    /// from the index.
    Closed { realized_pnl: Decimal },
    /// The fill exceeded the existing opposite-side quantity: the old
    /// position closes and a new one opens on the other side.
    Flipped {
        realized_pnl: Decimal,
        new_position: Position,
    },
}

impl Position {
    /// Apply an execution of `exec_qty` at `exec_price` with `fee` commission
    /// to this position, following the exact branches of spec §4.5 step 4.
    pub fn apply_fill(&mut self, side: Side, exec_qty: Decimal, exec_price: Decimal, fee: Decimal) -> FillOutcome {
        self.updated_at = SystemTime::now();

        if side == self.side {
            let new_qty = self.qty + exec_qty;
            self.avg_price = (self.qty * self.avg_price + exec_qty * exec_price) / new_qty;
            self.qty = new_qty;
            self.commission += fee;
            return FillOutcome::Updated;
        }

        // Opposite side: partial close, full close, or flip.
        if exec_qty < self.qty {
            let realized = (exec_price - self.avg_price) * exec_qty * self.pnl_sign();
            self.qty -= exec_qty;
            self.realized_pnl += realized;
            self.commission += fee;
            FillOutcome::Updated
        } else if exec_qty == self.qty {
            let realized = (exec_price - self.avg_price) * exec_qty * self.pnl_sign();
            self.realized_pnl += realized;
            self.commission += fee;
            FillOutcome::Closed {
                realized_pnl: self.realized_pnl,
            }
        } else {
            let realized = (exec_price - self.avg_price) * self.qty * self.pnl_sign();
            self.realized_pnl += realized;
            let remaining = exec_qty - self.qty;
            let new_position = Position::new(
                self.account_id.clone(),
                self.symbol.clone(),
                side,
                remaining,
                exec_price,
                fee,
            );
            FillOutcome::Flipped {
                realized_pnl: self.realized_pnl,
                new_position,
            }
        }
    }

    fn pnl_sign(&self) -> Decimal {
        match self.side {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}
