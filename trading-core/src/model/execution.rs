use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, OrderId, Side, Symbol};

/// Immutable audit row appended by Settlement for every fill. The
/// single source of truth for execution auditing (§3); never mutated
/// once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub submitted_at_ns: i64,
    pub executed_at_ns: i64,
    pub processing_latency_ns: i64,
}
