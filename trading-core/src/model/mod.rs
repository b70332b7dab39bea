//! Domain types shared across the matching/settlement core.

mod account;
mod execution;
mod order;
mod position;
mod quote;

pub use account::{Account, AccountId, AccountKind};
pub use execution::ExecutionRecord;
pub use order::{CreateOrder, Order, OrderId, OrderKind, OrderStatus, Side};
pub use position::{FillOutcome, Position};
pub use quote::Quote;

/// A trading symbol, e.g. `EURUSD` or `BTCUSD`. Interned as a small
/// string rather than an enum since the set of tradeable symbols is a
/// runtime configuration concern, not a compile-time one.
pub type Symbol = smol_str::SmolStr;
