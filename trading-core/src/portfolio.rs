//! Read-only portfolio aggregation (spec §6, "API surface and
//! portfolio query (ADDED)"). Mirrors the original service's
//! `get_portfolio` endpoint: entirely derived from the Position index
//! and Tick Cache the Event Loop already maintains, without mutating
//! anything.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{AccountId, Symbol};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    pub qty: Decimal,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub account_id: AccountId,
    pub available_balance: Decimal,
    pub positions: Vec<PositionSnapshot>,
    pub positions_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub total_value: Decimal,
}
