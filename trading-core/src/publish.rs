//! Outbound execution events (spec §6, `trading.order.executed`).
//! At-most-once publish is explicitly a non-goal (§9); consumers must
//! be idempotent on `orderId`.

use anyhow::Result;
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{AccountId, ExecutionRecord, OrderId, Side, Symbol};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderExecutedEvent {
    pub order_id: OrderId,
    pub owner_id: String,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: Decimal,
    pub execution_price: Decimal,
    pub commission: Decimal,
    /// RFC 3339 / ISO-8601.
    pub executed_at: String,
    pub execution_timestamp_ns: i64,
    pub processing_latency_ns: i64,
}

impl OrderExecutedEvent {
    pub fn from_record(owner_id: String, record: &ExecutionRecord) -> Self {
        Self {
            order_id: record.order_id,
            owner_id,
            account_id: record.account_id.clone(),
            symbol: record.symbol.clone(),
            side: record.side,
            qty: record.qty,
            execution_price: record.price,
            commission: record.commission,
            executed_at: iso8601_from_ns(record.executed_at_ns),
            execution_timestamp_ns: record.executed_at_ns,
            processing_latency_ns: record.processing_latency_ns,
        }
    }
}

fn iso8601_from_ns(ns: i64) -> String {
    let secs = ns / 1_000_000_000;
    let nanos = (ns % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .unwrap_or_default()
        .to_rfc3339()
}

/// Abstracts the outbound channel (`trading.order.executed`). A real
/// deployment wires this to the surrounding service's message broker;
/// that wiring is peripheral glue and out of scope here (§1).
pub trait Publisher: Send {
    fn publish(&mut self, event: &OrderExecutedEvent) -> Result<()>;
}

/// Collects published events in memory — used by the in-process core
/// when no external broker is configured, and by tests.
#[derive(Default)]
pub struct InMemoryPublisher {
    published: Vec<OrderExecutedEvent>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> &[OrderExecutedEvent] {
        &self.published
    }
}

impl Publisher for InMemoryPublisher {
    fn publish(&mut self, event: &OrderExecutedEvent) -> Result<()> {
        self.published.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_formats_as_rfc3339() {
        let formatted = iso8601_from_ns(1_700_000_000_000_000_000);
        assert!(formatted.starts_with("2023-11-14T"));
    }
}
