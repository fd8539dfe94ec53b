use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    errors::Error,
    pipeline::{RecordBuffer, TelegramLayer},
    Result,
};

fn default_filter(service_name: &str) -> EnvFilter {
    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,tglog=info,tglog_core=info,tglog_telegram=info,{service_name}=info"
        ))
    })
}

/// Initialize console logging for a service.
pub fn init(service_name: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(default_filter(service_name))
        .with(fmt::layer().with_target(false).with_ansi(true))
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}

/// Console logging plus forwarding of every event the filter lets through
/// into `buffer`, for a `LogTarget` to flush.
pub fn init_with_forwarding(service_name: &str, buffer: RecordBuffer) -> Result<()> {
    tracing_subscriber::registry()
        .with(default_filter(service_name))
        .with(fmt::layer().with_target(false).with_ansi(true))
        .with(TelegramLayer::new(buffer))
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}
