//! Durable persistence for orders, positions, accounts, and executions
//! (spec §6). `bog-core` itself has no durable store — it is a
//! stateless-restart bot — so this trait and its `rusqlite` backing are
//! enriched from `cooprefr-bettersys`, the one example in the pack that
//! carries a real embedded-SQL dependency, translated from the
//! original service's `postgresql_manager` connection-per-call style
//! into synchronous `rusqlite` calls run on a dedicated store worker.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;

use crate::model::{Account, AccountId, ExecutionRecord, Order, OrderStatus, Position};

pub trait DurableStore: Send {
    fn upsert_order(&mut self, order: &Order) -> Result<()>;
    fn upsert_position(&mut self, position: &Position) -> Result<()>;
    fn delete_position(&mut self, account_id: &AccountId, symbol: &str) -> Result<()>;
    fn upsert_account(&mut self, account: &Account) -> Result<()>;
    fn append_execution(&mut self, record: &ExecutionRecord) -> Result<()>;

    /// Cold-boot reload: every order whose status is not terminal.
    /// Driven once by the Event Loop at startup before it begins
    /// accepting ticks (§9 "Open Questions resolved").
    fn load_open_orders(&self) -> Result<Vec<Order>>;

    fn load_account(&self, id: &AccountId) -> Result<Option<Account>>;
    fn load_position(&self, account_id: &AccountId, symbol: &str) -> Result<Option<Position>>;
}

pub(crate) fn is_open(status: OrderStatus) -> bool {
    !status.is_terminal()
}
