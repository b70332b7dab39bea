//! Domain error taxonomy for the matching/settlement core.
//!
//! Mirrors the split the rest of this codebase uses elsewhere: precise
//! `thiserror` enums for errors callers branch on, `anyhow` at the outer
//! API edges where a caller only needs to propagate and log.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{OrderId, Symbol};

/// Validation failures discovered at submit time. Non-retryable; the
/// order never enters the Book.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("order quantity must be positive, got {0}")]
    NonPositiveQty(Decimal),

    #[error("limitPrice is required for order kind {0:?}")]
    MissingLimitPrice(crate::model::OrderKind),

    #[error("stopPrice is required for order kind {0:?}")]
    MissingStopPrice(crate::model::OrderKind),

    #[error("account {0} not found")]
    UnknownAccount(String),

    #[error("account {account} is not owned by {owner}")]
    NotOwner { account: String, owner: String },

    #[error("insufficient available balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("no reservation reference price available for symbol {0}")]
    NoReferencePrice(Symbol),

    #[error("fill rejected by order {0}: {1}")]
    InvalidFill(OrderId, String),
}

/// Failures that are safe to retry: I/O to the durable store or the
/// outbound publish channel.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("durable store write failed: {0}")]
    Store(#[source] anyhow::Error),

    #[error("outbound publish failed: {0}")]
    Publish(#[source] anyhow::Error),
}

/// Arithmetic overflow in a monetary computation. `Decimal` never wraps
/// silently, so this only fires on the handful of checked operations
/// guarding against astronomically large inputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverflowError {
    #[error("balance update overflowed: {old} + {delta}")]
    Balance { old: Decimal, delta: Decimal },

    #[error("position quantity update overflowed: {old} + {delta}")]
    PositionQty { old: Decimal, delta: Decimal },

    #[error("realized pnl update overflowed: {old} + {delta}")]
    RealizedPnl { old: Decimal, delta: Decimal },
}

/// The top-level error taxonomy from spec §7: Validation, Transient,
/// Conflict, Backpressure, Shutdown.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transient(#[from] TransientError),

    #[error("order {0} is not found or already terminal")]
    Conflict(OrderId),

    #[error("event channel is saturated")]
    Busy,

    #[error("core is shutting down")]
    Shutdown,

    #[error(transparent)]
    Overflow(#[from] OverflowError),
}
