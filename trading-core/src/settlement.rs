//! Applies an `executeOrder` event to the owning account, the symbol
//! position, the durable store, and the outbound publish channel
//! (spec §4.5). Position merge/flip logic is grounded in the teacher's
//! `Position::process_fill_fixed_with_fee`; the retry-then-rollback
//! policy for steps 5/6 reuses the teacher's `resilience::backoff`
//! bounded-exponential-backoff shape.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;

use crate::alerts::{Alert, AlertSeverity, AlertSink};
use crate::errors::{CoreError, TransientError, ValidationError};
use crate::matcher::ExecuteIntent;
use crate::model::{Account, AccountId, ExecutionRecord, FillOutcome, Order, OrderStatus, Position, Side};
use crate::order_book::OrderBook;
use crate::order_fsm::{FillResult, OrderOpen, OrderPartiallyFilled};
use crate::publish::{OrderExecutedEvent, Publisher};
use crate::store::DurableStore;

/// The book of (accountId, symbol) positions Settlement owns
/// exclusively (spec §3 ownership).
#[derive(Default)]
pub struct PositionIndex {
    positions: HashMap<(AccountId, String), Position>,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account_id: &AccountId, symbol: &str) -> Option<&Position> {
        self.positions.get(&(account_id.clone(), symbol.to_string()))
    }

    /// All open positions belonging to one account, for portfolio
    /// aggregation (spec §6).
    pub fn for_account(&self, account_id: &AccountId) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(move |((acc, _), _)| acc == account_id).map(|(_, pos)| pos)
    }
}

pub struct Settlement<'a> {
    pub accounts: &'a mut HashMap<AccountId, Account>,
    pub positions: &'a mut PositionIndex,
    pub book: &'a mut OrderBook,
    pub store: &'a mut dyn DurableStore,
    pub publisher: &'a mut dyn Publisher,
    pub alerts: &'a dyn AlertSink,
    pub commission_rate: Decimal,
    pub retry_attempts: u32,
}

/// Outcome of applying one `executeOrder` event, for latency
/// measurement and logging by the Event Loop.
pub struct SettlementOutcome {
    pub record: Option<ExecutionRecord>,
}

impl Settlement<'_> {
    /// Step 1-6 of spec §4.5. On any validation or balance error the
    /// order is rejected in place and no balance/position mutation is
    /// observable. On transient store/publish failure the in-memory
    /// state is rolled back to its pre-event snapshot.
    pub fn apply(&mut self, intent: &ExecuteIntent, submitted_at_ns: i64) -> Result<SettlementOutcome, CoreError> {
        // Step 1: resolve and verify still open; drop idempotently otherwise.
        let Some(order) = self.book.get_by_id(intent.order_id) else {
            return Ok(SettlementOutcome { record: None });
        };
        if order.status.is_terminal() {
            return Ok(SettlementOutcome { record: None });
        }
        let order = order.clone();

        let account = self
            .accounts
            .get(&order.account_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownAccount(order.account_id.to_string()))?;
        let existing_position = self.positions.get(&order.account_id, &order.symbol).cloned();

        // Step 2.
        let trade_value = intent.qty * intent.price;
        let commission = trade_value * self.commission_rate;

        // Step 5 first: validate the fill against the order's own FSM
        // before computing or committing any balance/position mutation.
        // A rejected fill bails out here with nothing yet touched.
        let updated_order = apply_order_fill(order.clone(), intent.qty, intent.price)?;

        // Step 3: balance adjustment (computed, not yet committed).
        let mut new_account = account.clone();
        match order.side {
            Side::Buy => {
                let total = trade_value + commission;
                if account.balance < total {
                    return Err(ValidationError::InsufficientBalance {
                        required: total,
                        available: account.balance,
                    }
                    .into());
                }
                new_account.balance -= total;
                // Releases the slice of the submit-time reservation this
                // fill consumes, then charges the actual trade cost.
                let reserved = intent.qty * order.reservation_price.unwrap_or(Decimal::ZERO);
                new_account.available_balance += reserved - total;
            }
            Side::Sell => {
                new_account.balance += trade_value - commission;
                new_account.available_balance += trade_value - commission;
            }
        }

        // Step 4: position adjustment.
        let (new_position, delete_position) = match existing_position.clone() {
            None => (
                Position::new(order.account_id.clone(), order.symbol.clone(), order.side, intent.qty, intent.price, commission),
                false,
            ),
            Some(mut pos) => match pos.apply_fill(order.side, intent.qty, intent.price, commission) {
                FillOutcome::Updated => (pos, false),
                FillOutcome::Closed { .. } => (pos, true),
                FillOutcome::Flipped { new_position, .. } => (new_position, false),
            },
        };

        let now = SystemTime::now();
        let executed_at_ns = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64;

        // Step 6: durable store append + outbound publish, with
        // bounded retry and rollback on exhaustion.
        let record = ExecutionRecord {
            order_id: order.id,
            account_id: order.account_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            qty: intent.qty,
            price: intent.price,
            commission,
            submitted_at_ns,
            executed_at_ns,
            processing_latency_ns: executed_at_ns - submitted_at_ns,
        };

        if let Err(e) = self.commit_durably(&updated_order, &new_account, &new_position, delete_position, &record) {
            self.alerts.raise(Alert {
                severity: AlertSeverity::Critical,
                message: format!("settlement rollback for order {}: {e}", order.id),
            });
            // In-memory state has not been touched yet, so there is
            // nothing to roll back; only the durable commit failed.
            return Err(TransientError::Store(e).into());
        }

        // Publish before the in-memory commit, not after: on exhausted
        // retry the handler must return with in-memory state still at
        // its pre-event snapshot, and accounts/positions/book are the
        // only state left to roll back at that point.
        let event = OrderExecutedEvent::from_record(order.owner_id.clone(), &record);
        if let Err(e) = retry_with_backoff(self.retry_attempts, || self.publisher.publish(&event)) {
            self.alerts.raise(Alert {
                severity: AlertSeverity::Critical,
                message: format!("publish failed for order {}: {e}", order.id),
            });
            return Err(TransientError::Publish(e).into());
        }

        // Commit in-memory state only after both the durable write and
        // the publish succeed, so an exhausted retry on either leaves
        // no observable change.
        self.accounts.insert(new_account.id.clone(), new_account);
        if delete_position {
            self.positions.positions.remove(&(order.account_id.clone(), order.symbol.to_string()));
        } else {
            self.positions
                .positions
                .insert((new_position.account_id.clone(), new_position.symbol.to_string()), new_position);
        }
        self.book.upsert(updated_order);

        Ok(SettlementOutcome { record: Some(record) })
    }

    fn commit_durably(
        &mut self,
        order: &Order,
        account: &Account,
        position: &Position,
        delete_position: bool,
        record: &ExecutionRecord,
    ) -> anyhow::Result<()> {
        retry_with_backoff(self.retry_attempts, || {
            self.store.upsert_order(order)?;
            self.store.upsert_account(account)?;
            if delete_position {
                self.store.delete_position(&account.id, &position.symbol)?;
            } else {
                self.store.upsert_position(position)?;
            }
            self.store.append_execution(record)?;
            Ok(())
        })
    }
}

/// A `FillError` here means the exec intent is inconsistent with the
/// order's own bookkeeping (e.g. it overfills it) — that is a
/// validation failure, not a terminal order state, so it propagates as
/// an error and the caller commits nothing rather than rejecting the
/// order in place.
fn apply_order_fill(order: Order, exec_qty: Decimal, exec_price: Decimal) -> Result<Order, CoreError> {
    let order_id = order.id;
    let result = match order.status {
        OrderStatus::Open => OrderOpen::new(order).fill(exec_qty, exec_price),
        OrderStatus::PartiallyFilled => OrderPartiallyFilled::new(order).fill(exec_qty, exec_price),
        _ => unreachable!("apply_order_fill only called for still-open orders"),
    };
    match result {
        Ok(FillResult::Filled(o)) => Ok(o),
        Ok(FillResult::PartiallyFilled(p)) => Ok(p.into_inner()),
        Err((err, _rejected)) => Err(ValidationError::InvalidFill(order_id, err.to_string()).into()),
    }
}

/// Bounded exponential backoff retry, grounded in the teacher's
/// `resilience::backoff::ExponentialBackoff` shape (initial delay,
/// multiplier, max retries) collapsed to a plain retry loop since
/// Settlement runs synchronously on the Event Loop thread.
fn retry_with_backoff<T>(max_attempts: u32, mut op: impl FnMut() -> anyhow::Result<T>) -> anyhow::Result<T> {
    let mut delay = std::time::Duration::from_millis(10);
    let mut last_err = None;
    for attempt in 0..max_attempts.max(1) {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
                if attempt + 1 < max_attempts {
                    std::thread::sleep(delay);
                    delay = (delay * 2).min(std::time::Duration::from_secs(1));
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}
