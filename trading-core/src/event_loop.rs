//! Single-writer event serializer (spec §4.2). No direct analogue in
//! the teacher's pull-loop `Engine<S, E>`; grounded instead in the
//! teacher's `execution::journal::AsyncJournal` (`crossbeam::channel::bounded`
//! plus a dedicated consumer thread draining a `for event in receiver`
//! loop) and the original service's `asyncio.Queue`-based
//! `process_events`/`handle_event` dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::alerts::AlertSink;
use crate::config::{Config, ReservationReferencePricePolicy};
use crate::errors::{CoreError, TransientError, ValidationError};
use crate::matcher;
use crate::model::{Account, AccountId, CreateOrder, Order, OrderId, OrderKind, OrderStatus, Quote, Side};
use crate::order_book::OrderBook;
use crate::order_fsm::{OrderOpen, OrderPartiallyFilled, OrderPending};
use crate::portfolio::{PortfolioSnapshot, PositionSnapshot};
use crate::publish::Publisher;
use crate::settlement::{PositionIndex, Settlement};
use crate::store::DurableStore;
use crate::tick_cache::TickCache;
use crate::tick_source::TickSource;

/// The typed events the loop serializes (spec §4.2). `executeOrder`
/// has no public variant: it is generated and consumed internally
/// while handling a `tick`, never submitted from outside. `PortfolioQuery`
/// is a read event (§6 "API surface and portfolio query"): handled like
/// a tick, never mutates state.
enum Event {
    Tick(Quote),
    SubmitOrder(CreateOrder, Sender<Result<Order, CoreError>>),
    CancelOrder(OrderId, AccountId, Sender<Result<Order, CoreError>>),
    PortfolioQuery(AccountId, Sender<Result<PortfolioSnapshot, CoreError>>),
}

/// A cheaply-cloneable front door to a running loop. Submit/cancel
/// calls are synchronous from the caller's perspective: they enqueue a
/// oneshot reply channel and block on its result.
#[derive(Clone)]
pub struct EventLoopHandle {
    sender: Sender<Event>,
    shutdown: Arc<AtomicBool>,
}

impl EventLoopHandle {
    pub fn submit_order(&self, order: CreateOrder) -> Result<Order, CoreError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Event::SubmitOrder(order, reply_tx))?;
        reply_rx.recv().map_err(|_| CoreError::Shutdown)?
    }

    pub fn cancel_order(&self, order_id: OrderId, account_id: AccountId) -> Result<Order, CoreError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Event::CancelOrder(order_id, account_id, reply_tx))?;
        reply_rx.recv().map_err(|_| CoreError::Shutdown)?
    }

    /// Enqueues a tick directly, failing with `ErrBusy`/`ErrShutdown`
    /// rather than coalescing. Intended for deterministic test harnesses
    /// and any tick adapter that prefers backpressure to the coalescing
    /// behavior of [`spawn_tick_feed`]. Because the loop is strictly FIFO,
    /// a subsequent blocking call (`submit_order`/`cancel_order`/
    /// `query_portfolio`) is guaranteed to observe this tick's effects.
    pub fn submit_tick(&self, quote: Quote) -> Result<(), CoreError> {
        self.send(Event::Tick(quote))
    }

    pub fn query_portfolio(&self, account_id: AccountId) -> Result<PortfolioSnapshot, CoreError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Event::PortfolioQuery(account_id, reply_tx))?;
        reply_rx.recv().map_err(|_| CoreError::Shutdown)?
    }

    /// Called by the tick feed driver. Ticks never error with `ErrBusy`
    /// per §4.2 — coalescing on backpressure is the caller's job, via
    /// [`spawn_tick_feed`].
    fn try_submit_tick(&self, quote: Quote) -> Result<(), Quote> {
        match self.sender.try_send(Event::Tick(quote)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(Event::Tick(q))) => Err(q),
            Err(TrySendError::Disconnected(Event::Tick(q))) => Err(q),
            _ => unreachable!("try_submit_tick only ever sends Event::Tick"),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn send(&self, event: Event) -> Result<(), CoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(CoreError::Shutdown);
        }
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => CoreError::Busy,
            TrySendError::Disconnected(_) => CoreError::Shutdown,
        })
    }
}

pub struct EventLoop {
    book: OrderBook,
    accounts: HashMap<AccountId, Account>,
    positions: PositionIndex,
    tick_cache: Arc<TickCache>,
    store: Box<dyn DurableStore>,
    publisher: Box<dyn Publisher>,
    alerts: Box<dyn AlertSink>,
    config: Config,
}

impl EventLoop {
    /// Cold-boot: reloads every non-terminal order from the durable
    /// store into the Book before the loop begins accepting ticks
    /// (spec §9, grounded in the original service's `load_active_orders`).
    pub fn new(
        store: Box<dyn DurableStore>,
        publisher: Box<dyn Publisher>,
        alerts: Box<dyn AlertSink>,
        config: Config,
    ) -> anyhow::Result<Self> {
        let mut book = OrderBook::new();
        for order in store.load_open_orders()? {
            book.insert(order);
        }
        Ok(Self {
            book,
            accounts: HashMap::new(),
            positions: PositionIndex::new(),
            tick_cache: Arc::new(TickCache::new(config.tick_cache_ttl())),
            store,
            publisher,
            alerts,
            config,
        })
    }

    pub fn tick_cache(&self) -> Arc<TickCache> {
        self.tick_cache.clone()
    }

    pub fn register_account(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Spawns the worker thread and returns a handle. The worker drains
    /// in-flight events on shutdown up to `shutdownDrainTimeout` before
    /// failing anything still queued with `ErrShutdown` (spec §4.2, §5).
    pub fn spawn(mut self) -> (EventLoopHandle, std::thread::JoinHandle<()>) {
        let (sender, receiver) = bounded(self.config.event_channel_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = shutdown.clone();
        let drain_timeout = self.config.shutdown_drain_timeout();
        let join = std::thread::spawn(move || self.run(receiver, worker_shutdown, drain_timeout));
        (EventLoopHandle { sender, shutdown }, join)
    }

    fn run(mut self, receiver: Receiver<Event>, shutdown: Arc<AtomicBool>, drain_timeout: Duration) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        self.drain(&receiver, drain_timeout);
        info!("event loop shut down");
    }

    fn drain(&mut self, receiver: &Receiver<Event>, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match receiver.recv_timeout(remaining) {
                Ok(Event::Tick(quote)) => self.handle_tick(quote),
                Ok(Event::SubmitOrder(_, reply)) => {
                    let _ = reply.send(Err(CoreError::Shutdown));
                }
                Ok(Event::CancelOrder(_, _, reply)) => {
                    let _ = reply.send(Err(CoreError::Shutdown));
                }
                Ok(Event::PortfolioQuery(_, reply)) => {
                    let _ = reply.send(Err(CoreError::Shutdown));
                }
                Err(_) => break,
            }
        }
        while let Ok(event) = receiver.try_recv() {
            match event {
                Event::SubmitOrder(_, reply) => {
                    let _ = reply.send(Err(CoreError::Shutdown));
                }
                Event::CancelOrder(_, _, reply) => {
                    let _ = reply.send(Err(CoreError::Shutdown));
                }
                Event::PortfolioQuery(_, reply) => {
                    let _ = reply.send(Err(CoreError::Shutdown));
                }
                Event::Tick(_) => {}
            }
        }
    }

    fn handle(&mut self, event: Event) {
        let started = Instant::now();
        match event {
            Event::Tick(quote) => self.handle_tick(quote),
            Event::SubmitOrder(create, reply) => {
                let result = self.handle_submit(create);
                let _ = reply.send(result);
            }
            Event::CancelOrder(id, account_id, reply) => {
                let result = self.handle_cancel(id, account_id);
                let _ = reply.send(result);
            }
            Event::PortfolioQuery(account_id, reply) => {
                let result = self.handle_query(account_id);
                let _ = reply.send(result);
            }
        }
        let elapsed_ns = started.elapsed().as_nanos() as u64;
        if elapsed_ns > self.config.slow_event_threshold_ns {
            warn!(elapsed_ns, "slow event");
        }
    }

    fn handle_tick(&mut self, quote: Quote) {
        self.tick_cache.put(quote.clone());
        matcher::trigger_stops(&mut self.book, &quote);
        let intents = matcher::evaluate(&self.book, &quote);
        let submitted_at_ns = now_ns();
        for intent in intents {
            let mut settlement = Settlement {
                accounts: &mut self.accounts,
                positions: &mut self.positions,
                book: &mut self.book,
                store: self.store.as_mut(),
                publisher: self.publisher.as_mut(),
                alerts: self.alerts.as_ref(),
                commission_rate: self.config.commission_rate,
                retry_attempts: 3,
            };
            if let Err(e) = settlement.apply(&intent, submitted_at_ns) {
                error!(order_id = %intent.order_id, error = %e, "settlement failed");
            }
        }
    }

    fn handle_submit(&mut self, create: CreateOrder) -> Result<Order, CoreError> {
        validate_create(&create)?;
        let account = self
            .accounts
            .get(&create.account_id)
            .ok_or_else(|| ValidationError::UnknownAccount(create.account_id.to_string()))?
            .clone();

        let reservation_price = match create.side {
            Side::Sell => None,
            Side::Buy => Some(self.reservation_reference_price(&create)?),
        };

        if let Some(price) = reservation_price {
            let reserved = create.qty * price;
            if account.available_balance < reserved {
                return Err(ValidationError::InsufficientBalance {
                    required: reserved,
                    available: account.available_balance,
                }
                .into());
            }
        }

        let now = SystemTime::now();
        let pending = Order {
            id: OrderId::generate(),
            owner_id: account.owner_id.clone(),
            account_id: create.account_id.clone(),
            symbol: create.symbol,
            kind: create.kind,
            side: create.side,
            qty: create.qty,
            limit_price: create.limit_price,
            stop_price: create.stop_price,
            status: OrderStatus::Pending,
            filled_qty: Decimal::ZERO,
            avg_price: None,
            commission: Decimal::ZERO,
            reservation_price,
            triggered: false,
            created_at: now,
            updated_at: now,
            executed_at: None,
        };
        // Deliberate deviation from a literal "pending -> open on first
        // tick evaluation": the Matcher only ever scans the Book for
        // `Open`/`PartiallyFilled` orders, so a `Pending` order sitting
        // in the Book would just wait inertly for a tick that never
        // touches it. Acknowledging synchronously at submit time means
        // `Pending` is the order's state for the single in-process
        // instant between FSM construction and Book insertion, never an
        // externally observable one (`query_portfolio`/the Book always
        // see `Open` or later). If the Matcher grows a pass that no
        // longer assumes `Open`, move this `acknowledge()` there instead.
        let order = OrderPending::new(pending).acknowledge().into_inner();

        if let Some(price) = reservation_price {
            let mut reserved_account = account;
            reserved_account.available_balance -= order.qty * price;
            self.store.upsert_account(&reserved_account).map_err(TransientError::Store)?;
            self.store.upsert_order(&order).map_err(TransientError::Store)?;
            self.accounts.insert(reserved_account.id.clone(), reserved_account);
        } else {
            self.store.upsert_order(&order).map_err(TransientError::Store)?;
        }
        self.book.insert(order.clone());
        Ok(order)
    }

    /// Resolves the reference price used to reserve buy-side funds at
    /// submit time, per the configured policy (spec §6, §9).
    fn reservation_reference_price(&self, create: &CreateOrder) -> Result<Decimal, ValidationError> {
        match self.config.reservation_reference_price_policy {
            ReservationReferencePricePolicy::LimitPrice => match create.kind {
                OrderKind::Limit | OrderKind::StopLimit => create
                    .limit_price
                    .ok_or_else(|| ValidationError::NoReferencePrice(create.symbol.clone())),
                OrderKind::Stop => create
                    .stop_price
                    .ok_or_else(|| ValidationError::NoReferencePrice(create.symbol.clone())),
                OrderKind::Market => self
                    .tick_cache
                    .get(&create.symbol)
                    .map(|q| q.ask)
                    .ok_or_else(|| ValidationError::NoReferencePrice(create.symbol.clone())),
            },
            ReservationReferencePricePolicy::LastKnownTick => self
                .tick_cache
                .get(&create.symbol)
                .map(|q| q.ask)
                .ok_or_else(|| ValidationError::NoReferencePrice(create.symbol.clone())),
            ReservationReferencePricePolicy::Explicit => match create.kind {
                OrderKind::Stop => create
                    .stop_price
                    .ok_or_else(|| ValidationError::NoReferencePrice(create.symbol.clone())),
                _ => create
                    .limit_price
                    .ok_or_else(|| ValidationError::NoReferencePrice(create.symbol.clone())),
            },
        }
    }

    /// Honored iff the order is still in the Book; otherwise dropped
    /// idempotently with `ErrConflict` (spec §4.2's cancellation rule).
    /// Releases any unfilled reservation back to `availableBalance`
    /// (Property 7, Scenario S4).
    fn handle_cancel(&mut self, id: OrderId, account_id: AccountId) -> Result<Order, CoreError> {
        let existing = self.book.get_by_id(id).ok_or(CoreError::Conflict(id))?;
        if existing.account_id != account_id {
            return Err(ValidationError::NotOwner {
                account: existing.account_id.to_string(),
                owner: account_id.to_string(),
            }
            .into());
        }
        let status = existing.status;
        let order = self.book.remove(id).expect("presence just checked above");
        let cancelled = match status {
            OrderStatus::Open => OrderOpen::new(order).cancel(),
            OrderStatus::PartiallyFilled => OrderPartiallyFilled::new(order).cancel(),
            _ => return Err(CoreError::Conflict(id)),
        };

        if let Some(price) = cancelled.reservation_price {
            if let Some(account) = self.accounts.get(&cancelled.account_id).cloned() {
                let mut released_account = account;
                released_account.available_balance += cancelled.remaining_qty() * price;
                self.store.upsert_account(&released_account).map_err(TransientError::Store)?;
                self.accounts.insert(released_account.id.clone(), released_account);
            }
        }
        self.store.upsert_order(&cancelled).map_err(TransientError::Store)?;
        Ok(cancelled)
    }

    /// A read-only aggregation over the Position index and Tick Cache;
    /// never mutates account, position, or order state (spec §6's
    /// `PortfolioQuery`).
    fn handle_query(&mut self, account_id: AccountId) -> Result<PortfolioSnapshot, CoreError> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or_else(|| ValidationError::UnknownAccount(account_id.to_string()))?;
        let available_balance = account.available_balance;

        let mut positions = Vec::new();
        let mut positions_value = Decimal::ZERO;
        let mut unrealized_pnl = Decimal::ZERO;
        let mut realized_pnl = Decimal::ZERO;

        for position in self.positions.for_account(&account_id) {
            let current_price = self.tick_cache.get(&position.symbol).map(|q| q.last).unwrap_or(position.avg_price);
            let mut snapshot_position = position.clone();
            snapshot_position.mark(current_price);
            let position_unrealized = snapshot_position.unrealized_pnl();

            positions_value += snapshot_position.qty * current_price;
            unrealized_pnl += position_unrealized;
            realized_pnl += snapshot_position.realized_pnl;

            positions.push(PositionSnapshot {
                symbol: snapshot_position.symbol.clone(),
                qty: snapshot_position.qty,
                avg_price: snapshot_position.avg_price,
                current_price,
                unrealized_pnl: position_unrealized,
                realized_pnl: snapshot_position.realized_pnl,
            });
        }

        Ok(PortfolioSnapshot {
            account_id,
            available_balance,
            positions,
            positions_value,
            unrealized_pnl,
            realized_pnl,
            total_value: available_balance + positions_value,
        })
    }
}

fn validate_create(create: &CreateOrder) -> Result<(), ValidationError> {
    if create.qty <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQty(create.qty));
    }
    match create.kind {
        OrderKind::Market => {}
        OrderKind::Limit => {
            if create.limit_price.is_none() {
                return Err(ValidationError::MissingLimitPrice(create.kind));
            }
        }
        OrderKind::Stop => {
            if create.stop_price.is_none() {
                return Err(ValidationError::MissingStopPrice(create.kind));
            }
        }
        OrderKind::StopLimit => {
            if create.limit_price.is_none() {
                return Err(ValidationError::MissingLimitPrice(create.kind));
            }
            if create.stop_price.is_none() {
                return Err(ValidationError::MissingStopPrice(create.kind));
            }
        }
    }
    Ok(())
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

/// Drives a [`TickSource`] on its own thread and feeds the loop,
/// coalescing to the latest quote per symbol when the event channel is
/// saturated rather than blocking or erroring (spec §4.2's backpressure
/// rule for ticks).
pub fn spawn_tick_feed<S: TickSource + Send + 'static>(
    handle: EventLoopHandle,
    mut source: S,
    cadence: Duration,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut pending: HashMap<crate::model::Symbol, Quote> = HashMap::new();
        loop {
            if handle.shutdown.load(Ordering::Acquire) {
                return;
            }
            let stale: Vec<Quote> = pending.drain().map(|(_, q)| q).collect();
            for quote in stale {
                if let Err(q) = handle.try_submit_tick(quote) {
                    pending.insert(q.symbol.clone(), q);
                }
            }
            if let Some(quote) = source.next_quote() {
                if let Err(q) = handle.try_submit_tick(quote) {
                    pending.insert(q.symbol.clone(), q);
                }
            }
            std::thread::sleep(cadence);
        }
    })
}
