//! Structured logging setup, following the teacher's `utils::logger`
//! convention: an `EnvFilter` seeded from the configured level, with a
//! JSON layer for production and a pretty layer for local runs.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_logger(log_level: &str, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}
