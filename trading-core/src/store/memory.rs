use std::collections::HashMap;

use anyhow::Result;

use crate::model::{Account, AccountId, ExecutionRecord, Order, OrderId, Position};

use super::DurableStore;

/// An in-memory `DurableStore`, used in tests and as a drop-in
/// replacement when no SQL backing is configured.
#[derive(Default)]
pub struct InMemoryStore {
    orders: HashMap<OrderId, Order>,
    positions: HashMap<(AccountId, String), Position>,
    accounts: HashMap<AccountId, Account>,
    executions: Vec<ExecutionRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.executions
    }
}

impl DurableStore for InMemoryStore {
    fn upsert_order(&mut self, order: &Order) -> Result<()> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn upsert_position(&mut self, position: &Position) -> Result<()> {
        self.positions
            .insert((position.account_id.clone(), position.symbol.to_string()), position.clone());
        Ok(())
    }

    fn delete_position(&mut self, account_id: &AccountId, symbol: &str) -> Result<()> {
        self.positions.remove(&(account_id.clone(), symbol.to_string()));
        Ok(())
    }

    fn upsert_account(&mut self, account: &Account) -> Result<()> {
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn append_execution(&mut self, record: &ExecutionRecord) -> Result<()> {
        self.executions.push(record.clone());
        Ok(())
    }

    fn load_open_orders(&self) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .values()
            .filter(|o| super::is_open(o.status))
            .cloned()
            .collect())
    }

    fn load_account(&self, id: &AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.get(id).cloned())
    }

    fn load_position(&self, account_id: &AccountId, symbol: &str) -> Result<Option<Position>> {
        Ok(self.positions.get(&(account_id.clone(), symbol.to_string())).cloned())
    }
}
