//! Entrypoint wiring the Event Loop to a simulated tick feed, an
//! operator-supplied config file, and graceful shutdown on Ctrl-C.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use trading_core::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a TOML config file. Defaults are used if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Starting balance for the demo account seeded at startup.
    #[arg(long, default_value = "10000")]
    demo_balance: Decimal,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    trading_core::logging::init_logger(&config.logging.level, config.logging.json);

    tracing::info!("=== trading-core ===");

    let store: Box<dyn DurableStore> = match &config.store.sqlite_path {
        Some(path) => Box::new(SqliteStore::open(path)?),
        None => Box::new(InMemoryStore::new()),
    };

    let mut event_loop = EventLoop::new(
        store,
        Box::new(trading_core::publish::InMemoryPublisher::new()),
        Box::new(trading_core::alerts::TracingAlertSink),
        config,
    )?;
    event_loop.register_account(Account::new("demo", "operator", AccountKind::Demo, args.demo_balance));

    let (handle, worker) = event_loop.spawn();

    let shutdown_handle = handle.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received, draining event loop");
        shutdown_handle.request_shutdown();
    })?;

    let source = SimulatedTickSource::standard_universe();
    let feed = spawn_tick_feed(handle, source, Duration::from_millis(10));

    worker.join().expect("event loop worker panicked");
    feed.join().expect("tick feed panicked");

    tracing::info!("shut down cleanly");
    Ok(())
}
