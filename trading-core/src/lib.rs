//! Trading core — a single-process order matching and settlement
//! engine for one trading account domain.
//!
//! ## Architecture
//! - Single-writer Event Loop serializes every state mutation
//!   (ticks, order submit/cancel, executions) through one bounded
//!   channel and a dedicated worker thread.
//! - Order Book, Account balances, and Position index are mutated only
//!   from that worker; everything else (durable store I/O, outbound
//!   publish, the tick feed) runs on its own thread and communicates
//!   with the loop through channels.
//! - Monetary values are `rust_decimal::Decimal` throughout; nothing
//!   here uses floating point for a price, quantity, or balance.
//!
//! ## Modules
//! - [`model`]: domain types (Account, Order, Position, Quote, ExecutionRecord)
//! - [`order_fsm`]: the Order lifecycle typestate machine
//! - [`order_book`]: the dual-index live-order book
//! - [`tick_source`] / [`tick_cache`]: quote generation and the short-TTL read cache
//! - [`matcher`]: executability rules and stop triggering
//! - [`settlement`]: balance/position/order mutation for one execution
//! - [`event_loop`]: the single-writer serializer tying the above together
//! - [`store`]: the durable persistence adapter
//! - [`publish`]: the outbound execution-event channel
//! - [`alerts`]: operator alerting
//! - [`config`]: runtime configuration
//! - [`errors`]: the domain error taxonomy

pub mod alerts;
pub mod config;
pub mod errors;
pub mod event_loop;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod order_book;
pub mod order_fsm;
pub mod portfolio;
pub mod publish;
pub mod settlement;
pub mod store;
pub mod tick_cache;
pub mod tick_source;

pub use config::Config;
pub use errors::{CoreError, OverflowError, TransientError, ValidationError};
pub use event_loop::{EventLoop, EventLoopHandle};

/// Convenient imports for a binary embedding this core.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::errors::{CoreError, OverflowError, TransientError, ValidationError};
    pub use crate::event_loop::{spawn_tick_feed, EventLoop, EventLoopHandle};
    pub use crate::model::{
        Account, AccountId, AccountKind, CreateOrder, ExecutionRecord, Order, OrderId, OrderKind,
        OrderStatus, Position, Quote, Side, Symbol,
    };
    pub use crate::portfolio::{PortfolioSnapshot, PositionSnapshot};
    pub use crate::store::{DurableStore, InMemoryStore, SqliteStore};
    pub use crate::tick_source::{SimulatedTickSource, TickSource};
}
