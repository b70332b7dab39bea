use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

pub type AccountId = smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Demo,
    Live,
    Paper,
}

/// A trading account. `balance` and `availableBalance` are mutated only
/// by Settlement, and only from the Event Loop thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: String,
    pub kind: AccountKind,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
    pub margin_level: Decimal,
    pub leverage: u32,
    pub currency: String,
    pub active: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, owner_id: impl Into<String>, kind: AccountKind, initial_balance: Decimal) -> Self {
        let now = SystemTime::now();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            kind,
            balance: initial_balance,
            available_balance: initial_balance,
            equity: initial_balance,
            margin: Decimal::ZERO,
            free_margin: initial_balance,
            margin_level: Decimal::ZERO,
            leverage: 1,
            currency: "USD".to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// True iff the §3 invariant `availableBalance <= balance` and both
    /// are non-negative holds.
    pub fn is_consistent(&self) -> bool {
        self.available_balance >= Decimal::ZERO
            && self.balance >= Decimal::ZERO
            && self.available_balance <= self.balance
    }
}
