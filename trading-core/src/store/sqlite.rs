use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::model::{
    Account, AccountId, AccountKind, ExecutionRecord, Order, OrderId, OrderKind, OrderStatus, Position, Side,
};

use super::DurableStore;

/// `rusqlite`-backed durable store implementing the `orders`,
/// `positions`, `accounts`, and `executions` tables named in spec §6.
/// Monetary fields are stored as `TEXT` (decimal string) to avoid any
/// float round-trip through SQLite's native numeric types.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path).context("opening sqlite durable store")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite durable store")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                account_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                kind TEXT NOT NULL,
                side TEXT NOT NULL,
                qty TEXT NOT NULL,
                limit_price TEXT,
                stop_price TEXT,
                status TEXT NOT NULL,
                filled_qty TEXT NOT NULL,
                avg_price TEXT,
                commission TEXT NOT NULL,
                reservation_price TEXT,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                executed_at_ms INTEGER
            );

            CREATE TABLE IF NOT EXISTS positions (
                account_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                qty TEXT NOT NULL,
                avg_price TEXT NOT NULL,
                current_price TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                commission TEXT NOT NULL,
                opened_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                PRIMARY KEY (account_id, symbol)
            );

            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                balance TEXT NOT NULL,
                available_balance TEXT NOT NULL,
                equity TEXT NOT NULL,
                margin TEXT NOT NULL,
                free_margin TEXT NOT NULL,
                margin_level TEXT NOT NULL,
                leverage INTEGER NOT NULL,
                currency TEXT NOT NULL,
                active INTEGER NOT NULL,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS executions (
                order_id TEXT NOT NULL,
                account_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                qty TEXT NOT NULL,
                price TEXT NOT NULL,
                commission TEXT NOT NULL,
                submitted_at_ns INTEGER NOT NULL,
                executed_at_ns INTEGER NOT NULL,
                processing_latency_ns INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}

fn to_millis(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

fn from_millis(ms: i64) -> SystemTime {
    UNIX_EPOCH + std::time::Duration::from_millis(ms.max(0) as u64)
}

fn dec(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid decimal in store: {s}"))
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

fn side_from(s: &str) -> Result<Side> {
    match s {
        "buy" => Ok(Side::Buy),
        "sell" => Ok(Side::Sell),
        other => anyhow::bail!("unknown side {other}"),
    }
}

fn kind_str(kind: OrderKind) -> &'static str {
    match kind {
        OrderKind::Market => "market",
        OrderKind::Limit => "limit",
        OrderKind::Stop => "stop",
        OrderKind::StopLimit => "stopLimit",
    }
}

fn kind_from(s: &str) -> Result<OrderKind> {
    match s {
        "market" => Ok(OrderKind::Market),
        "limit" => Ok(OrderKind::Limit),
        "stop" => Ok(OrderKind::Stop),
        "stopLimit" => Ok(OrderKind::StopLimit),
        other => anyhow::bail!("unknown order kind {other}"),
    }
}

fn status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Open => "open",
        OrderStatus::PartiallyFilled => "partiallyFilled",
        OrderStatus::Filled => "filled",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Rejected => "rejected",
    }
}

fn status_from(s: &str) -> Result<OrderStatus> {
    match s {
        "pending" => Ok(OrderStatus::Pending),
        "open" => Ok(OrderStatus::Open),
        "partiallyFilled" => Ok(OrderStatus::PartiallyFilled),
        "filled" => Ok(OrderStatus::Filled),
        "cancelled" => Ok(OrderStatus::Cancelled),
        "rejected" => Ok(OrderStatus::Rejected),
        other => anyhow::bail!("unknown order status {other}"),
    }
}

fn kind_acct_str(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Demo => "demo",
        AccountKind::Live => "live",
        AccountKind::Paper => "paper",
    }
}

fn kind_acct_from(s: &str) -> Result<AccountKind> {
    match s {
        "demo" => Ok(AccountKind::Demo),
        "live" => Ok(AccountKind::Live),
        "paper" => Ok(AccountKind::Paper),
        other => anyhow::bail!("unknown account kind {other}"),
    }
}

impl DurableStore for SqliteStore {
    fn upsert_order(&mut self, order: &Order) -> Result<()> {
        self.conn.execute(
            "INSERT INTO orders (id, owner_id, account_id, symbol, kind, side, qty, limit_price, stop_price,
                status, filled_qty, avg_price, commission, reservation_price, created_at_ms, updated_at_ms, executed_at_ms)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
             ON CONFLICT(id) DO UPDATE SET
                status=excluded.status, filled_qty=excluded.filled_qty, avg_price=excluded.avg_price,
                commission=excluded.commission, reservation_price=excluded.reservation_price,
                updated_at_ms=excluded.updated_at_ms, executed_at_ms=excluded.executed_at_ms",
            params![
                order.id.to_string(),
                order.owner_id,
                order.account_id.as_str(),
                order.symbol.as_str(),
                kind_str(order.kind),
                side_str(order.side),
                order.qty.to_string(),
                order.limit_price.map(|d| d.to_string()),
                order.stop_price.map(|d| d.to_string()),
                status_str(order.status),
                order.filled_qty.to_string(),
                order.avg_price.map(|d| d.to_string()),
                order.commission.to_string(),
                order.reservation_price.map(|d| d.to_string()),
                to_millis(order.created_at),
                to_millis(order.updated_at),
                order.executed_at.map(to_millis),
            ],
        )?;
        Ok(())
    }

    fn upsert_position(&mut self, position: &Position) -> Result<()> {
        self.conn.execute(
            "INSERT INTO positions (account_id, symbol, side, qty, avg_price, current_price, realized_pnl,
                commission, opened_at_ms, updated_at_ms)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)
             ON CONFLICT(account_id, symbol) DO UPDATE SET
                side=excluded.side, qty=excluded.qty, avg_price=excluded.avg_price,
                current_price=excluded.current_price, realized_pnl=excluded.realized_pnl,
                commission=excluded.commission, updated_at_ms=excluded.updated_at_ms",
            params![
                position.account_id.as_str(),
                position.symbol.as_str(),
                side_str(position.side),
                position.qty.to_string(),
                position.avg_price.to_string(),
                position.current_price.to_string(),
                position.realized_pnl.to_string(),
                position.commission.to_string(),
                to_millis(position.opened_at),
                to_millis(position.updated_at),
            ],
        )?;
        Ok(())
    }

    fn delete_position(&mut self, account_id: &AccountId, symbol: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM positions WHERE account_id = ?1 AND symbol = ?2",
            params![account_id.as_str(), symbol],
        )?;
        Ok(())
    }

    fn upsert_account(&mut self, account: &Account) -> Result<()> {
        self.conn.execute(
            "INSERT INTO accounts (id, owner_id, kind, balance, available_balance, equity, margin,
                free_margin, margin_level, leverage, currency, active, created_at_ms, updated_at_ms)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
             ON CONFLICT(id) DO UPDATE SET
                balance=excluded.balance, available_balance=excluded.available_balance,
                equity=excluded.equity, margin=excluded.margin, free_margin=excluded.free_margin,
                margin_level=excluded.margin_level, updated_at_ms=excluded.updated_at_ms",
            params![
                account.id.as_str(),
                account.owner_id,
                kind_acct_str(account.kind),
                account.balance.to_string(),
                account.available_balance.to_string(),
                account.equity.to_string(),
                account.margin.to_string(),
                account.free_margin.to_string(),
                account.margin_level.to_string(),
                account.leverage,
                account.currency,
                account.active as i64,
                to_millis(account.created_at),
                to_millis(account.updated_at),
            ],
        )?;
        Ok(())
    }

    fn append_execution(&mut self, record: &ExecutionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO executions (order_id, account_id, symbol, side, qty, price, commission,
                submitted_at_ns, executed_at_ns, processing_latency_ns)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                record.order_id.to_string(),
                record.account_id.as_str(),
                record.symbol.as_str(),
                side_str(record.side),
                record.qty.to_string(),
                record.price.to_string(),
                record.commission.to_string(),
                record.submitted_at_ns,
                record.executed_at_ns,
                record.processing_latency_ns,
            ],
        )?;
        Ok(())
    }

    fn load_open_orders(&self) -> Result<Vec<Order>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, account_id, symbol, kind, side, qty, limit_price, stop_price, status,
                filled_qty, avg_price, commission, reservation_price, created_at_ms, updated_at_ms, executed_at_ms
             FROM orders WHERE status IN ('pending','open','partiallyFilled')",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, Option<String>>(11)?,
                row.get::<_, String>(12)?,
                row.get::<_, Option<String>>(13)?,
                row.get::<_, i64>(14)?,
                row.get::<_, i64>(15)?,
                row.get::<_, Option<i64>>(16)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, owner_id, account_id, symbol, kind, side, qty, limit_price, stop_price, status, filled_qty, avg_price, commission, reservation_price, created_at_ms, updated_at_ms, executed_at_ms) = row?;
            out.push(Order {
                id: OrderId(u128::from_str_radix(&id, 16).with_context(|| format!("invalid order id {id}"))?),
                owner_id,
                account_id: account_id.into(),
                symbol: symbol.into(),
                kind: kind_from(&kind)?,
                side: side_from(&side)?,
                qty: dec(&qty)?,
                limit_price: limit_price.map(|s| dec(&s)).transpose()?,
                stop_price: stop_price.map(|s| dec(&s)).transpose()?,
                status: status_from(&status)?,
                filled_qty: dec(&filled_qty)?,
                avg_price: avg_price.map(|s| dec(&s)).transpose()?,
                commission: dec(&commission)?,
                reservation_price: reservation_price.map(|s| dec(&s)).transpose()?,
                triggered: false,
                created_at: from_millis(created_at_ms),
                updated_at: from_millis(updated_at_ms),
                executed_at: executed_at_ms.map(from_millis),
            });
        }
        Ok(out)
    }

    fn load_account(&self, id: &AccountId) -> Result<Option<Account>> {
        let mut stmt = self.conn.prepare(
            "SELECT owner_id, kind, balance, available_balance, equity, margin, free_margin, margin_level,
                leverage, currency, active, created_at_ms, updated_at_ms FROM accounts WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id.as_str()])?;
        let Some(row) = rows.next()? else { return Ok(None) };
        Ok(Some(Account {
            id: id.clone(),
            owner_id: row.get(0)?,
            kind: kind_acct_from(&row.get::<_, String>(1)?)?,
            balance: dec(&row.get::<_, String>(2)?)?,
            available_balance: dec(&row.get::<_, String>(3)?)?,
            equity: dec(&row.get::<_, String>(4)?)?,
            margin: dec(&row.get::<_, String>(5)?)?,
            free_margin: dec(&row.get::<_, String>(6)?)?,
            margin_level: dec(&row.get::<_, String>(7)?)?,
            leverage: row.get::<_, i64>(8)? as u32,
            currency: row.get(9)?,
            active: row.get::<_, i64>(10)? != 0,
            created_at: from_millis(row.get(11)?),
            updated_at: from_millis(row.get(12)?),
        }))
    }

    fn load_position(&self, account_id: &AccountId, symbol: &str) -> Result<Option<Position>> {
        let mut stmt = self.conn.prepare(
            "SELECT side, qty, avg_price, current_price, realized_pnl, commission, opened_at_ms, updated_at_ms
             FROM positions WHERE account_id = ?1 AND symbol = ?2",
        )?;
        let mut rows = stmt.query(params![account_id.as_str(), symbol])?;
        let Some(row) = rows.next()? else { return Ok(None) };
        Ok(Some(Position {
            account_id: account_id.clone(),
            symbol: symbol.into(),
            side: side_from(&row.get::<_, String>(0)?)?,
            qty: dec(&row.get::<_, String>(1)?)?,
            avg_price: dec(&row.get::<_, String>(2)?)?,
            current_price: dec(&row.get::<_, String>(3)?)?,
            realized_pnl: dec(&row.get::<_, String>(4)?)?,
            commission: dec(&row.get::<_, String>(5)?)?,
            opened_at: from_millis(row.get(6)?),
            updated_at: from_millis(row.get(7)?),
        }))
    }
}
